//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从字节缓冲区读取数据, Theora 头包与帧数据都使用该位序.
//!
//! 提供两种越界语义:
//! - `read_bits`: 严格模式, 数据不足返回 `TaoError::Eof`, 用于头包解析.
//! - `read_bits_padded`: 填零模式, 越过末尾的位按 0 读取并记录溢出, 用于帧数据.

use crate::{TaoError, TaoResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use tao_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// assert_eq!(br.read_bits_padded(3), 0);
/// assert!(br.is_overrun());
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 已读取的总位数, 填零模式下可超过数据长度
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// 是否已越过数据末尾 (仅填零模式可能发生)
    pub fn is_overrun(&self) -> bool {
        self.pos > self.data.len() * 8
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> TaoResult<u32> {
        self.read_bits(1)
    }

    /// 读取 1 个位并转为布尔值
    pub fn read_flag(&mut self) -> TaoResult<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// 严格读取 N 个位 (最多 32 位)
    pub fn read_bits(&mut self, n: u32) -> TaoResult<u32> {
        if n > 32 {
            return Err(TaoError::InvalidArgument(format!(
                "read_bits: n={n} 超过 32 位"
            )));
        }
        if n as usize > self.bits_left() {
            return Err(TaoError::Eof);
        }
        Ok(self.read_bits_padded(n))
    }

    /// 读取 N 个位 (最多 32 位), 越过末尾的位按 0 处理
    pub fn read_bits_padded(&mut self, n: u32) -> u32 {
        debug_assert!(n <= 32, "read_bits_padded: n={n} 超过 32 位");
        let mut result: u64 = 0;
        let mut remaining = n;
        while remaining > 0 {
            let byte_idx = self.pos >> 3;
            let bit_off = (self.pos & 7) as u32;
            let available = 8 - bit_off;
            let take = remaining.min(available);
            let byte = self.data.get(byte_idx).copied().unwrap_or(0);
            let bits = (byte >> (available - take)) & (((1u16 << take) - 1) as u8);
            result = (result << take) | u64::from(bits);
            self.pos += take as usize;
            remaining -= take;
        }
        result as u32
    }

    /// 填零模式读取 1 个位
    pub fn read_bit_padded(&mut self) -> u32 {
        self.read_bits_padded(1)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: usize) -> TaoResult<()> {
        if n > self.bits_left() {
            return Err(TaoError::Eof);
        }
        self.pos += n;
        Ok(())
    }

    /// 当前是否字节对齐
    pub fn is_aligned(&self) -> bool {
        self.pos & 7 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_严格模式读取() {
        let data = [0xA5, 0x0F];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bit().unwrap(), 1);
        assert_eq!(br.read_bits(3).unwrap(), 0b010);
        assert_eq!(br.read_bits(8).unwrap(), 0x50);
        assert_eq!(br.bits_left(), 4);
        assert!(matches!(br.read_bits(5), Err(TaoError::Eof)));
        assert_eq!(br.read_bits(4).unwrap(), 0xF);
    }

    #[test]
    fn test_跨字节读取32位() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(4).unwrap(), 0x1);
        assert_eq!(br.read_bits(32).unwrap(), 0x2345_6789);
        assert_eq!(br.read_bits(4).unwrap(), 0xA);
    }

    #[test]
    fn test_填零模式越界() {
        let data = [0xFF];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits_padded(6), 0x3F);
        assert!(!br.is_overrun());
        assert_eq!(br.read_bits_padded(6), 0b110000);
        assert!(br.is_overrun());
        assert_eq!(br.bits_left(), 0);
        assert_eq!(br.read_bit_padded(), 0);
    }

    #[test]
    fn test_跳过与对齐() {
        let data = [0x00, 0x80];
        let mut br = BitReader::new(&data);
        br.skip_bits(8).unwrap();
        assert!(br.is_aligned());
        assert!(br.read_flag().unwrap());
        assert!(!br.is_aligned());
        assert!(br.skip_bits(8).is_err());
    }
}
