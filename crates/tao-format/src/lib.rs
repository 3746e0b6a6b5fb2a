//! # tao-format
//!
//! Ogg 容器解复用库.
//!
//! 只依赖顺序分块读取的字节源 (`ByteSource`), 页面同步、逻辑流重组与
//! Theora / Vorbis 流识别都在推模式下完成, 不需要 seek.

pub mod demuxers;
pub mod io;

// 重导出常用类型
pub use demuxers::ogg::{
    OggDemuxer, OggPage, OggStreamState, OggSync, PageFlags, ScanStatus, StreamSlot,
};
pub use io::{ByteSource, FileSource, MemorySource};
