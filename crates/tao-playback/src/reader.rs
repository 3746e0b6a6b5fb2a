//! 按固定块大小从字节源读取并送入解复用器.

use log::trace;
use tao_core::TaoResult;
use tao_format::{ByteSource, OggDemuxer};

/// 一次读取的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadStatus {
    /// 读到了数据
    Data(usize),
    /// 暂时没有数据 (饥饿)
    Starved,
    /// 字节源已耗尽或已关闭
    Exhausted,
}

#[derive(Debug)]
pub(crate) struct ChunkReader {
    buf: Vec<u8>,
    total: u64,
}

impl ChunkReader {
    pub(crate) fn new(chunk_size: usize) -> Self {
        Self {
            buf: vec![0u8; chunk_size.max(1)],
            total: 0,
        }
    }

    /// 读取一块并提交给解复用器
    pub(crate) fn read_chunk(
        &mut self,
        source: &mut dyn ByteSource,
        demuxer: &mut OggDemuxer,
    ) -> TaoResult<ReadStatus> {
        if !source.is_open() {
            return Ok(ReadStatus::Exhausted);
        }
        let n = source.read(&mut self.buf)?;
        if n > 0 {
            self.total += n as u64;
            trace!("读取 {} 字节 (累计 {})", n, self.total);
            demuxer.submit(&self.buf[..n]);
            return Ok(ReadStatus::Data(n));
        }
        if source.is_at_end() {
            Ok(ReadStatus::Exhausted)
        } else {
            Ok(ReadStatus::Starved)
        }
    }

    /// 累计读取的字节数
    pub(crate) fn total_bytes(&self) -> u64 {
        self.total
    }
}
