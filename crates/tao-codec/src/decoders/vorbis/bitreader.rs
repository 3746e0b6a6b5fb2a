//! Vorbis 小端位序读取器.
//!
//! Vorbis 的所有字段都是低位先读, 与 Theora 的大端位序相反.
//! 数据不足时返回 `TaoError::Eof`, 由调用方决定该情形按包尾处理还是报错.

use tao_core::{TaoError, TaoResult};

pub(crate) struct LsbBitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> LsbBitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    pub(crate) fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_pos)
    }

    pub(crate) fn read_flag(&mut self) -> TaoResult<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// 读取 n 位 (n <= 32), 先读到的位放在结果低位
    pub(crate) fn read_bits(&mut self, n: u32) -> TaoResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(TaoError::InvalidArgument(format!(
                "Vorbis read_bits 位数非法: {}",
                n,
            )));
        }
        if self.bits_left() < n as usize {
            self.bit_pos = self.data.len() * 8;
            return Err(TaoError::Eof);
        }

        let mut out = 0u64;
        let mut got = 0u32;
        while got < n {
            let byte_idx = self.bit_pos / 8;
            let shift = (self.bit_pos % 8) as u32;
            let avail = (8 - shift).min(n - got);
            let chunk = (u64::from(self.data[byte_idx]) >> shift) & ((1u64 << avail) - 1);
            out |= chunk << got;
            got += avail;
            self.bit_pos += avail as usize;
        }
        Ok(out as u32)
    }

    /// 读取 Vorbis 自定义格式的 32 位打包浮点数
    pub(crate) fn read_float32(&mut self) -> TaoResult<f32> {
        Ok(float32_unpack(self.read_bits(32)?))
    }
}

/// 整数的有效位数, ilog(0) = 0
pub(crate) fn ilog(v: u32) -> u32 {
    32 - v.leading_zeros()
}

/// 21 位尾数, 10 位指数 (偏移 788), 1 位符号
pub(crate) fn float32_unpack(x: u32) -> f32 {
    let mantissa = (x & 0x1F_FFFF) as f64;
    let sign = x & 0x8000_0000;
    let exponent = ((x & 0x7FE0_0000) >> 21) as i32;
    let value = if sign != 0 { -mantissa } else { mantissa };
    (value * 2f64.powi(exponent - 788)) as f32
}
