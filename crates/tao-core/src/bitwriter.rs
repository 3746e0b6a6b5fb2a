//! 比特流写入器.
//!
//! 用于构造合成码流 (测试与基准), 提供两种位序:
//! - `BitWriter`: 大端位序 (MSB first), 与 `BitReader` 对应, Theora 使用.
//! - `LsbBitWriter`: 小端位序 (LSB first), Vorbis 使用.

/// 大端位序写入器
///
/// # 示例
/// ```
/// use tao_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0001, 4);
/// bw.write_bits(0b01010101, 8);
/// assert_eq!(bw.finish(), vec![0b10110001, 0b01010101]);
/// ```
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    current: u8,
    filled: u32,
}

impl BitWriter {
    /// 创建写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.filled as usize
    }

    /// 写入值的低 N 位 (最多 32 位), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={n} 超过 32 位");
        for i in (0..n).rev() {
            self.push_bit((value >> i) & 1 != 0);
        }
    }

    /// 写入 1 个位
    pub fn write_flag(&mut self, flag: bool) {
        self.push_bit(flag);
    }

    /// 写入完整字节序列 (要求当前已对齐时效率最高, 未对齐时逐位写入)
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_bits(u32::from(b), 8);
        }
    }

    /// 以 0 补齐到字节边界并返回数据
    pub fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.data.push(self.current << (8 - self.filled));
        }
        self.data
    }

    fn push_bit(&mut self, bit: bool) {
        self.current = (self.current << 1) | u8::from(bit);
        self.filled += 1;
        if self.filled == 8 {
            self.data.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }
}

/// 小端位序写入器: 每个字节从最低位开始填充, 多位值低位先写
#[derive(Debug, Default)]
pub struct LsbBitWriter {
    data: Vec<u8>,
    bit_pos: u32,
}

impl LsbBitWriter {
    /// 创建写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入值的低 N 位 (最多 32 位)
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={n} 超过 32 位");
        for i in 0..n {
            if self.bit_pos == 0 {
                self.data.push(0);
            }
            if (value >> i) & 1 != 0 {
                if let Some(last) = self.data.last_mut() {
                    *last |= 1 << self.bit_pos;
                }
            }
            self.bit_pos = (self.bit_pos + 1) & 7;
        }
    }

    /// 写入 1 个位
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bits(u32::from(flag), 1);
    }

    /// 写入字节序列
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_bits(u32::from(b), 8);
        }
    }

    /// 返回数据, 未满字节的高位为 0
    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}
