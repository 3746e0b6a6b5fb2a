//! 8x8 整数反 DCT.
//!
//! 16 位定点实现, 中间结果按 i16 截断, 与编码端重建结果逐位一致.

const C1S7: i32 = 64277;
const C2S6: i32 = 60547;
const C3S5: i32 = 54491;
const C4S4: i32 = 46341;
const C5S3: i32 = 36410;
const C6S2: i32 = 25080;
const C7S1: i32 = 12785;

/// 一维 8 点反变换, 输入为一行, 输出写入一列 (步长 8)
fn idct8(y: &mut [i16], x: &[i16]) {
    let x0 = i32::from(x[0]);
    let x1 = i32::from(x[1]);
    let x2 = i32::from(x[2]);
    let x3 = i32::from(x[3]);
    let x4 = i32::from(x[4]);
    let x5 = i32::from(x[5]);
    let x6 = i32::from(x[6]);
    let x7 = i32::from(x[7]);

    let mut t0 = (C4S4 * i32::from((x0 + x4) as i16)) >> 16;
    let mut t1 = (C4S4 * i32::from((x0 - x4) as i16)) >> 16;
    let mut t2 = ((C6S2 * x2) >> 16) - ((C2S6 * x6) >> 16);
    let mut t3 = ((C2S6 * x2) >> 16) + ((C6S2 * x6) >> 16);
    let mut t4 = ((C7S1 * x1) >> 16) - ((C1S7 * x7) >> 16);
    let mut t5 = ((C3S5 * x5) >> 16) - ((C5S3 * x3) >> 16);
    let mut t6 = ((C5S3 * x5) >> 16) + ((C3S5 * x3) >> 16);
    let mut t7 = ((C1S7 * x1) >> 16) + ((C7S1 * x7) >> 16);

    let r = t4 + t5;
    t5 = (C4S4 * i32::from((t4 - t5) as i16)) >> 16;
    t4 = r;
    let r = t7 + t6;
    t6 = (C4S4 * i32::from((t7 - t6) as i16)) >> 16;
    t7 = r;

    let r = t0 + t3;
    t3 = t0 - t3;
    t0 = r;
    let r = t1 + t2;
    t2 = t1 - t2;
    t1 = r;
    let r = t6 + t5;
    t5 = t6 - t5;
    t6 = r;

    y[0] = (t0 + t7) as i16;
    y[8] = (t1 + t6) as i16;
    y[16] = (t2 + t5) as i16;
    y[24] = (t3 + t4) as i16;
    y[32] = (t3 - t4) as i16;
    y[40] = (t2 - t5) as i16;
    y[48] = (t1 - t6) as i16;
    y[56] = (t0 - t7) as i16;
}

/// 二维反变换, 输入与输出均为自然序 (行优先)
pub(crate) fn idct8x8(coeffs: &[i16; 64]) -> [i16; 64] {
    let mut w = [0i16; 64];
    let mut y = [0i16; 64];
    for i in 0..8 {
        idct8(&mut w[i..], &coeffs[i * 8..i * 8 + 8]);
    }
    for i in 0..8 {
        idct8(&mut y[i..], &w[i * 8..i * 8 + 8]);
    }
    for v in y.iter_mut() {
        *v = ((i32::from(*v) + 8) >> 4) as i16;
    }
    y
}

/// 仅有直流系数时的快速路径, 返回残差常量
pub(crate) fn idct_dc_only(dc: i16, dc_quant: u16) -> i16 {
    ((i32::from(dc) * i32::from(dc_quant) + 15) >> 5) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_全零输入() {
        assert_eq!(idct8x8(&[0; 64]), [0; 64]);
    }

    #[test]
    fn test_直流分量输出常量() {
        let mut c = [0i16; 64];
        c[0] = 1024;
        let out = idct8x8(&c);
        assert!(out.iter().all(|&v| v == out[0]));
        // 1024 / 8 / 8 * 4 约为 32
        assert!((out[0] - 32).abs() <= 1);
        assert!((idct_dc_only(64, 16) - 32).abs() <= 1);
    }

    #[test]
    fn test_交流分量输出对称() {
        let mut c = [0i16; 64];
        c[1] = 512;
        let out = idct8x8(&c);
        for row in 0..8 {
            for col in 0..4 {
                assert_eq!(out[row * 8 + col], -out[row * 8 + 7 - col]);
            }
            assert!(out[row * 8] > 0);
        }
    }
}
