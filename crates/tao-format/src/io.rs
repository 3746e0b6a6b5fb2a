//! I/O 抽象层.
//!
//! 解复用器只依赖顺序分块读取契约 `ByteSource`, 不需要 seek.
//! 提供文件与内存两种实现, 其他来源 (资源包、网络) 由调用方实现该 trait.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::Bytes;
use tao_core::TaoResult;

/// 顺序字节源
///
/// `read` 返回 0 且 `is_at_end()` 为 false 表示暂时没有数据 (饥饿), 不是错误.
pub trait ByteSource: Send {
    /// 字节源是否处于打开状态
    fn is_open(&self) -> bool;

    /// 是否已到达逻辑末尾
    fn is_at_end(&self) -> bool;

    /// 读取最多 `buf.len()` 字节, 返回实际读取的字节数
    fn read(&mut self, buf: &mut [u8]) -> TaoResult<usize>;
}

/// 文件字节源
pub struct FileSource {
    file: File,
    size: Option<u64>,
    pos: u64,
    hit_eof: bool,
}

impl FileSource {
    /// 以只读方式打开文件
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata().ok().map(|m| m.len());
        log::debug!(
            "打开文件字节源: {}, 大小={:?}",
            path.as_ref().display(),
            size
        );
        Ok(Self {
            file,
            size,
            pos: 0,
            hit_eof: false,
        })
    }

    /// 文件总大小 (如果可知)
    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

impl ByteSource for FileSource {
    fn is_open(&self) -> bool {
        true
    }

    fn is_at_end(&self) -> bool {
        match self.size {
            Some(size) => self.pos >= size || self.hit_eof,
            None => self.hit_eof,
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> TaoResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.file.read(buf)?;
        if n == 0 {
            self.hit_eof = true;
        }
        self.pos += n as u64;
        Ok(n)
    }
}

/// 内存字节源
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    pos: usize,
}

impl MemorySource {
    /// 从已有数据创建
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// 剩余未读字节数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ByteSource for MemorySource {
    fn is_open(&self) -> bool {
        true
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> TaoResult<usize> {
        let to_read = buf.len().min(self.remaining());
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }
}
