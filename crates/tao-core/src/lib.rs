//! # tao-core
//!
//! 核心库, 提供基础类型定义、错误处理和位流工具.
//!
//! 供容器解复用 (tao-format)、编解码 (tao-codec) 与播放 (tao-playback) 共用.

pub mod bitreader;
pub mod bitwriter;
pub mod crc;
pub mod error;
pub mod pixel_format;
pub mod rational;

// 重导出常用类型
pub use error::{TaoError, TaoResult};
pub use pixel_format::PixelFormat;
pub use rational::Rational;
