//! 量化参数与反量化矩阵.

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

/// zigzag 序号到自然序号的映射
pub(crate) const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// 基础矩阵数量上限
const MAX_BASE_MATRICES: u32 = 384;

/// 以位数计的整数对数, `ilog(0) == 0`
pub(crate) fn ilog(v: u32) -> u32 {
    32 - v.leading_zeros()
}

/// 单个 (qti, pli) 组合的 qi 区间划分
#[derive(Debug, Clone, Default)]
struct QuantRanges {
    /// 各区间长度, 总和为 63
    sizes: Vec<u32>,
    /// 各区间端点使用的基础矩阵下标, 比 sizes 多一个
    base_indices: Vec<usize>,
}

/// setup 头包中的量化参数
#[derive(Debug, Clone)]
pub(crate) struct QuantParams {
    ac_scale: [u32; 64],
    dc_scale: [u32; 64],
    base_matrices: Vec<[u8; 64]>,
    /// 下标 [qti][pli]
    ranges: [[QuantRanges; 3]; 2],
}

impl QuantParams {
    pub(crate) fn read(br: &mut BitReader) -> TaoResult<Self> {
        let short = |_| TaoError::InvalidData("Theora 量化参数数据不足".into());

        let nbits = br.read_bits(4).map_err(short)? + 1;
        let mut ac_scale = [0u32; 64];
        for v in ac_scale.iter_mut() {
            *v = br.read_bits(nbits).map_err(short)?;
        }
        let nbits = br.read_bits(4).map_err(short)? + 1;
        let mut dc_scale = [0u32; 64];
        for v in dc_scale.iter_mut() {
            *v = br.read_bits(nbits).map_err(short)?;
        }

        let nbms = br.read_bits(9).map_err(short)? + 1;
        if nbms > MAX_BASE_MATRICES {
            return Err(TaoError::InvalidData(format!(
                "Theora 基础矩阵数量过多: {nbms}"
            )));
        }
        let mut base_matrices = Vec::with_capacity(nbms as usize);
        for _ in 0..nbms {
            let mut m = [0u8; 64];
            for v in m.iter_mut() {
                *v = br.read_bits(8).map_err(short)? as u8;
            }
            base_matrices.push(m);
        }

        let mut ranges: [[QuantRanges; 3]; 2] = Default::default();
        let bmi_bits = ilog(nbms - 1);
        for qti in 0..2 {
            for pli in 0..3 {
                let new_ranges = if qti > 0 || pli > 0 {
                    br.read_bits(1).map_err(short)? == 1
                } else {
                    true
                };
                if !new_ranges {
                    let from_prev_type = qti > 0 && br.read_bits(1).map_err(short)? == 1;
                    let (qtj, plj) = if from_prev_type {
                        (qti - 1, pli)
                    } else {
                        ((3 * qti + pli - 1) / 3, (pli + 2) % 3)
                    };
                    ranges[qti][pli] = ranges[qtj][plj].clone();
                    continue;
                }

                let mut r = QuantRanges::default();
                let read_bmi = |br: &mut BitReader| -> TaoResult<usize> {
                    let bmi = br.read_bits(bmi_bits).map_err(short)?;
                    if bmi >= nbms {
                        return Err(TaoError::InvalidData(format!(
                            "Theora 基础矩阵下标越界: {bmi} >= {nbms}"
                        )));
                    }
                    Ok(bmi as usize)
                };
                r.base_indices.push(read_bmi(br)?);
                let mut qi = 0u32;
                while qi < 63 {
                    let size = br.read_bits(ilog(62 - qi)).map_err(short)? + 1;
                    qi += size;
                    r.sizes.push(size);
                    r.base_indices.push(read_bmi(br)?);
                }
                if qi > 63 {
                    return Err(TaoError::InvalidData(format!(
                        "Theora 量化区间总长超过 63: {qi}"
                    )));
                }
                ranges[qti][pli] = r;
            }
        }

        Ok(Self {
            ac_scale,
            dc_scale,
            base_matrices,
            ranges,
        })
    }

    /// 计算单个 (qti, pli, qi) 的反量化矩阵 (自然序)
    fn matrix(&self, qti: usize, pli: usize, qi: usize) -> [u16; 64] {
        let r = &self.ranges[qti][pli];
        let mut qistart = 0usize;
        let mut qri = 0usize;
        while qri + 1 < r.sizes.len() && qi >= qistart + r.sizes[qri] as usize {
            qistart += r.sizes[qri] as usize;
            qri += 1;
        }
        let size = r.sizes[qri] as usize;
        let qiend = qistart + size;
        let bm_a = &self.base_matrices[r.base_indices[qri]];
        let bm_b = &self.base_matrices[r.base_indices[qri + 1]];

        let mut out = [0u16; 64];
        for ci in 0..64 {
            let bm = (2 * (qiend - qi) * usize::from(bm_a[ci])
                + 2 * (qi - qistart) * usize::from(bm_b[ci])
                + size)
                / (2 * size);
            let qmin = match (ci == 0, qti == 0) {
                (true, true) => 16,
                (true, false) => 32,
                (false, true) => 8,
                (false, false) => 16,
            };
            let scale = if ci == 0 {
                self.dc_scale[qi]
            } else {
                self.ac_scale[qi]
            } as usize;
            out[ci] = ((scale * bm / 100) * 4).min(4096).max(qmin) as u16;
        }
        out
    }

    /// 预先计算全部反量化矩阵
    pub(crate) fn build_tables(&self) -> DequantTables {
        let mut tables = Vec::with_capacity(2 * 3 * 64);
        for qti in 0..2 {
            for pli in 0..3 {
                for qi in 0..64 {
                    tables.push(self.matrix(qti, pli, qi));
                }
            }
        }
        DequantTables { tables }
    }
}

/// 反量化矩阵表
#[derive(Debug, Clone)]
pub(crate) struct DequantTables {
    tables: Vec<[u16; 64]>,
}

impl DequantTables {
    /// 取出 (qti, pli, qi) 对应的矩阵, qti 为 0 表示帧内
    pub(crate) fn get(&self, qti: usize, pli: usize, qi: usize) -> &[u16; 64] {
        &self.tables[(qti * 3 + pli) * 64 + qi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tao_core::bitwriter::BitWriter;

    /// 单一基础矩阵 (全 16), 全部 qi 一个区间, 其余组合复制
    fn flat_params(scale: u32) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(15, 4);
        for _ in 0..64 {
            bw.write_bits(scale, 16);
        }
        bw.write_bits(15, 4);
        for _ in 0..64 {
            bw.write_bits(scale, 16);
        }
        bw.write_bits(0, 9);
        for _ in 0..64 {
            bw.write_bits(16, 8);
        }
        // [0][0]: bmi 位数为 0, 区间长度 63 (6 位写 62), 终点 bmi
        bw.write_bits(62, 6);
        for qti in 0..2 {
            for pli in 0..3 {
                if qti == 0 && pli == 0 {
                    continue;
                }
                bw.write_bits(0, 1);
                if qti > 0 {
                    bw.write_bits(0, 1);
                }
            }
        }
        bw.finish()
    }

    #[test]
    fn test_ilog() {
        assert_eq!(ilog(0), 0);
        assert_eq!(ilog(1), 1);
        assert_eq!(ilog(62), 6);
        assert_eq!(ilog(383), 9);
    }

    #[test]
    fn test_平坦矩阵() {
        let data = flat_params(100);
        let mut br = BitReader::new(&data);
        let params = QuantParams::read(&mut br).unwrap();
        let tables = params.build_tables();
        // scale * bm / 100 * 4 = 100 * 16 / 100 * 4 = 64
        for qti in 0..2 {
            for pli in 0..3 {
                let m = tables.get(qti, pli, 10);
                assert_eq!(m[0], 64);
                assert_eq!(m[63], 64);
            }
        }
    }

    #[test]
    fn test_下限与上限() {
        let data = flat_params(1);
        let mut br = BitReader::new(&data);
        let tables = QuantParams::read(&mut br).unwrap().build_tables();
        assert_eq!(tables.get(0, 0, 0)[0], 16);
        assert_eq!(tables.get(1, 0, 0)[0], 32);
        assert_eq!(tables.get(0, 0, 0)[1], 8);
        assert_eq!(tables.get(1, 2, 0)[5], 16);

        let data = flat_params(60000);
        let mut br = BitReader::new(&data);
        let tables = QuantParams::read(&mut br).unwrap().build_tables();
        assert_eq!(tables.get(0, 0, 63)[7], 4096);
    }

    #[test]
    fn test_zigzag_是排列() {
        let mut seen = [false; 64];
        for &ci in &ZIGZAG {
            assert!(!seen[ci]);
            seen[ci] = true;
        }
    }
}
