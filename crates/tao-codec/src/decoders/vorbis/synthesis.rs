//! 加窗与重叠相加.
//!
//! 长块与短块相邻时, 长块只在与短块重叠的 bs0/2 区间内使用短斜坡, 其余部分为 0 或 1.
//! 每个包输出上一块中心到当前块中心之间的 pn/4 + cn/4 个采样.

/// 升窗斜坡: w[i] = sin(π/2 * sin²((i + 0.5) / len * π/2))
fn build_slope(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let x = (i as f64 + 0.5) / len as f64 * std::f64::consts::FRAC_PI_2;
            (std::f64::consts::FRAC_PI_2 * x.sin() * x.sin()).sin() as f32
        })
        .collect()
}

#[derive(Debug, Clone)]
pub(crate) struct VorbisWindows {
    blocksize0: usize,
    blocksize1: usize,
    short_slope: Vec<f32>,
    long_slope: Vec<f32>,
}

impl VorbisWindows {
    pub(crate) fn new(blocksize0: usize, blocksize1: usize) -> Self {
        Self {
            blocksize0,
            blocksize1,
            short_slope: build_slope(blocksize0 / 2),
            long_slope: build_slope(blocksize1 / 2),
        }
    }

    pub(crate) fn blocksize(&self, long: bool) -> usize {
        if long { self.blocksize1 } else { self.blocksize0 }
    }

    fn slope(&self, len: usize) -> &[f32] {
        if len == self.blocksize1 / 2 {
            &self.long_slope
        } else {
            &self.short_slope
        }
    }

    /// 对一个块原地加窗
    pub(crate) fn apply(&self, block: &mut [f32], long: bool, prev_long: bool, next_long: bool) {
        let n = block.len();
        let bs0 = self.blocksize0;
        let (left_start, left_n) = if long && !prev_long {
            (n / 4 - bs0 / 4, bs0 / 2)
        } else {
            (0, n / 2)
        };
        let (right_start, right_n) = if long && !next_long {
            (3 * n / 4 - bs0 / 4, bs0 / 2)
        } else {
            (n / 2, n / 2)
        };

        block[..left_start].fill(0.0);
        for (v, w) in block[left_start..left_start + left_n]
            .iter_mut()
            .zip(self.slope(left_n))
        {
            *v *= w;
        }
        for (v, w) in block[right_start..right_start + right_n]
            .iter_mut()
            .zip(self.slope(right_n).iter().rev())
        {
            *v *= w;
        }
        block[right_start + right_n..].fill(0.0);
    }
}

/// 上一块的加窗输出, 用于与下一块重叠
#[derive(Debug, Default)]
pub(crate) struct OverlapBuffer {
    prev: Option<Vec<Vec<f32>>>,
}

impl OverlapBuffer {
    pub(crate) fn reset(&mut self) {
        self.prev = None;
    }

    /// 送入当前块 (每声道 cn 个加窗采样), 返回可输出的采样
    ///
    /// 第一个块只保存不输出, 返回 None.
    pub(crate) fn push(&mut self, current: Vec<Vec<f32>>) -> Option<Vec<Vec<f32>>> {
        let prev = self.prev.replace(current)?;
        let current = self.prev.as_ref()?;

        let out = prev
            .iter()
            .zip(current)
            .map(|(p, c)| {
                let pn = p.len();
                let cn = c.len();
                let len = pn / 4 + cn / 4;
                (0..len)
                    .map(|k| {
                        let a = p.get(pn / 2 + k).copied().unwrap_or(0.0);
                        let ci = (cn / 4 + k).checked_sub(pn / 4);
                        let b = ci.and_then(|i| c.get(i)).copied().unwrap_or(0.0);
                        a + b
                    })
                    .collect()
            })
            .collect();
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_斜坡满足功率互补() {
        let s = build_slope(64);
        for i in 0..64 {
            let a = s[i];
            let b = s[63 - i];
            assert!((a * a + b * b - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_长块接短块的窗形() {
        let w = VorbisWindows::new(16, 64);
        let mut block = vec![1.0f32; 64];
        w.apply(&mut block, true, false, true);
        // 左侧: [0, 12) 为 0, [12, 20) 短斜坡, [20, 32) 为 1
        assert!(block[..12].iter().all(|&v| v == 0.0));
        assert!(block[12] > 0.0 && block[19] < 1.0);
        assert!(block[20..32].iter().all(|&v| v == 1.0));
        // 右侧为长斜坡
        assert!(block[32] > 0.99 && block[63] < 0.01);
    }

    #[test]
    fn test_重叠相加输出长度() {
        let mut ov = OverlapBuffer::default();
        assert!(ov.push(vec![vec![1.0; 64]]).is_none());
        let out = ov.push(vec![vec![2.0; 16]]).unwrap();
        assert_eq!(out[0].len(), 64 / 4 + 16 / 4);
        // 前 12 个采样只来自上一块
        assert_eq!(out[0][0], 1.0);
        assert_eq!(out[0][12], 3.0);

        let out = ov.push(vec![vec![4.0; 64]]).unwrap();
        assert_eq!(out[0].len(), 16 / 4 + 64 / 4);
        // 当前块从 cn/4 - pn/4 = 12 开始对齐, 后 12 个采样只来自当前块
        assert_eq!(out[0][0], 2.0 + 4.0);
        assert_eq!(out[0][19], 4.0);

        ov.reset();
        assert!(ov.push(vec![vec![1.0; 16]]).is_none());
    }
}
