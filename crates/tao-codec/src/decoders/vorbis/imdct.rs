//! 基于 N/4 点复数 FFT 的 IMDCT.
//!
//! y[n] = sum_k X[k] * cos(2π/N * (n + 1/2 + N/4) * (k + 1/2)), 不做归一化.
//! 计算分三步: 预旋转 + FFT + 后旋转得到 N/2 点 DCT-IV, 再按对称性展开为 N 点.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub(crate) struct Imdct {
    n: usize,
    fft: Arc<dyn Fft<f32>>,
    twiddle: Vec<Complex<f32>>,
    buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    dct: Vec<f32>,
}

impl std::fmt::Debug for Imdct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Imdct").field("n", &self.n).finish()
    }
}

impl Imdct {
    /// n 为块长 (输出点数), 必须是 4 的倍数
    pub(crate) fn new(n: usize) -> Self {
        let m = n / 2;
        let q = n / 4;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(q);
        let twiddle = (0..q)
            .map(|k| {
                let angle = -std::f64::consts::PI * (k as f64 + 0.125) / m as f64;
                Complex::new(angle.cos() as f32, angle.sin() as f32)
            })
            .collect();
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            n,
            fft,
            twiddle,
            buf: vec![Complex::new(0.0, 0.0); q],
            scratch,
            dct: vec![0.0; m],
        }
    }

    /// input 长度 n/2, output 长度 n
    pub(crate) fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let m = self.n / 2;
        let half = m / 2;

        for (k, (slot, tw)) in self.buf.iter_mut().zip(&self.twiddle).enumerate() {
            *slot = Complex::new(input[2 * k], input[m - 1 - 2 * k]) * tw;
        }
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);
        for (k, (z, tw)) in self.buf.iter().zip(&self.twiddle).enumerate() {
            let s = z * tw;
            self.dct[2 * k] = s.re;
            self.dct[m - 1 - 2 * k] = -s.im;
        }

        for (i, out) in output.iter_mut().enumerate().take(self.n) {
            *out = if i < half {
                self.dct[i + half]
            } else if i < 3 * half {
                -self.dct[3 * half - 1 - i]
            } else {
                -self.dct[i - 3 * half]
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(input: &[f32]) -> Vec<f32> {
        let m = input.len();
        let n = 2 * m;
        (0..n)
            .map(|i| {
                input
                    .iter()
                    .enumerate()
                    .map(|(k, &x)| {
                        let angle = 2.0 * std::f64::consts::PI / n as f64
                            * (i as f64 + 0.5 + n as f64 / 4.0)
                            * (k as f64 + 0.5);
                        f64::from(x) * angle.cos()
                    })
                    .sum::<f64>() as f32
            })
            .collect()
    }

    #[test]
    fn test_与直接公式一致() {
        for n in [16usize, 64, 256] {
            let input: Vec<f32> = (0..n / 2)
                .map(|k| ((k * 7 + 3) % 11) as f32 / 5.0 - 1.0)
                .collect();
            let mut imdct = Imdct::new(n);
            let mut out = vec![0.0f32; n];
            imdct.process(&input, &mut out);
            let expected = naive(&input);
            for (a, b) in out.iter().zip(&expected) {
                assert!((a - b).abs() < 1e-3, "n={n}: {a} != {b}");
            }
        }
    }

    #[test]
    fn test_全零输入() {
        let mut imdct = Imdct::new(64);
        let mut out = vec![1.0f32; 64];
        imdct.process(&[0.0; 32], &mut out);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
