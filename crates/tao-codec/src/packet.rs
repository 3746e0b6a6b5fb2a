//! 压缩数据包 (Packet).
//!
//! 由 Ogg 逻辑流重组得到的一个编解码器级数据单元.

use bytes::Bytes;

/// 压缩数据包
#[derive(Debug, Clone, Default)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 粒度位置 (granule position), 仅页内最后一个完整包携带
    pub granule: Option<i64>,
    /// 所属逻辑流序列号
    pub serial: u32,
    /// 流内包序号 (从 0 开始)
    pub packet_no: u64,
    /// 是否为逻辑流的第一个包
    pub bos: bool,
    /// 是否为逻辑流的最后一个包
    pub eos: bool,
}

impl Packet {
    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// 设置粒度位置
    pub fn with_granule(mut self, granule: i64) -> Self {
        self.granule = Some(granule);
        self
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
