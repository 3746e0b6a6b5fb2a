//! 有理数帧率.
//!
//! Theora 以 32 位无符号分子/分母描述帧率, 会话信息要求分母非零.

use std::fmt;

use crate::{TaoError, TaoResult};

/// 有理数, 用于帧率 (帧/秒 = num / den)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: u32,
    /// 分母
    pub den: u32,
}

impl Rational {
    /// 创建有理数, 不做校验
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// 创建帧率, 分子或分母为 0 时返回错误
    pub fn try_frame_rate(num: u32, den: u32) -> TaoResult<Self> {
        if num == 0 || den == 0 {
            return Err(TaoError::InvalidArgument(format!(
                "帧率非法: {num}/{den}"
            )));
        }
        Ok(Self { num, den })
    }

    /// 判断是否可作为帧率使用
    pub const fn is_valid(&self) -> bool {
        self.num != 0 && self.den != 0
    }

    /// 转换为 f64, 分母为 0 时返回 NaN
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 单帧间隔 (毫秒)
    pub fn frame_interval_ms(self) -> f64 {
        if self.num == 0 {
            return f64::INFINITY;
        }
        1000.0 * f64::from(self.den) / f64::from(self.num)
    }

    /// 帧序号对应的毫秒时间: `frames * den / num` 秒
    pub fn frames_to_ms(self, frames: i64) -> i64 {
        if self.num == 0 {
            return 0;
        }
        let ms = i128::from(frames) * 1000 * i128::from(self.den) / i128::from(self.num);
        ms as i64
    }

    /// 约分
    pub fn reduce(self) -> Self {
        let g = gcd(self.num, self.den);
        if g <= 1 {
            return self;
        }
        Self {
            num: self.num / g,
            den: self.den / g,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
