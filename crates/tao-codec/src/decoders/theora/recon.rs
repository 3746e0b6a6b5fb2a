//! 块重建, 环路滤波与输出后处理.
//!
//! 帧缓冲按平面存放, 行序自下而上, 尺寸为完整编码帧 (块数 x 8).

use super::decode::{
    FrameData, FrameHeader, MODE_INTRA, MotionVector, reference_index,
};
use super::idct::{idct8x8, idct_dc_only};
use super::layout::{FrameLayout, PlaneLayout};
use super::quant::{DequantTables, ZIGZAG};

/// 三个平面的像素缓冲
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrameBuffer {
    pub(crate) planes: [Vec<u8>; 3],
}

impl FrameBuffer {
    /// 全部填充中性灰 (128), 用于首帧之前的参考帧
    pub(crate) fn gray(layout: &FrameLayout) -> Self {
        let make = |p: &PlaneLayout| vec![128u8; p.width() * p.height()];
        Self {
            planes: [
                make(&layout.planes[0]),
                make(&layout.planes[1]),
                make(&layout.planes[2]),
            ],
        }
    }
}

/// 从参考平面取一个 8x8 预测块, 越界坐标夹到平面边缘
fn fetch_block(plane: &[u8], width: usize, height: usize, x: isize, y: isize) -> [u8; 64] {
    let mut out = [0u8; 64];
    let inside = x >= 0 && y >= 0 && x as usize + 8 <= width && y as usize + 8 <= height;
    if inside {
        let (x, y) = (x as usize, y as usize);
        for r in 0..8 {
            let row = (y + r) * width + x;
            out[r * 8..r * 8 + 8].copy_from_slice(&plane[row..row + 8]);
        }
        return out;
    }
    let max_x = width as isize - 1;
    let max_y = height as isize - 1;
    for r in 0..8 {
        let sy = (y + r as isize).clamp(0, max_y) as usize;
        for c in 0..8 {
            let sx = (x + c as isize).clamp(0, max_x) as usize;
            out[r * 8 + c] = plane[sy * width + sx];
        }
    }
    out
}

/// 运动矢量分量拆为两个整像素偏移, 有小数部分时两者不同
fn mv_offsets(component: i32, decimated: bool) -> (isize, isize) {
    let div = if decimated { 4 } else { 2 };
    let off0 = component / div;
    let off1 = if component % div == 0 {
        off0
    } else if component > 0 {
        off0 + 1
    } else {
        off0 - 1
    };
    (off0 as isize, off1 as isize)
}

fn predict_inter(
    reference: &[u8],
    plane: &PlaneLayout,
    x0: usize,
    y0: usize,
    mv: MotionVector,
) -> [u8; 64] {
    let (w, h) = (plane.width(), plane.height());
    let (x0, y0) = (x0 as isize, y0 as isize);
    let (ox0, ox1) = mv_offsets(mv.x, plane.xdec);
    let (oy0, oy1) = mv_offsets(mv.y, plane.ydec);
    let a = fetch_block(reference, w, h, x0 + ox0, y0 + oy0);
    if ox0 == ox1 && oy0 == oy1 {
        return a;
    }
    let b = fetch_block(reference, w, h, x0 + ox1, y0 + oy1);
    let mut out = [0u8; 64];
    for i in 0..64 {
        out[i] = ((u16::from(a[i]) + u16::from(b[i])) >> 1) as u8;
    }
    out
}

/// 反量化并反变换得到残差
fn residual(
    coeffs: &[i16; 64],
    ncoeffs: u8,
    dc_quant: &[u16; 64],
    ac_quant: &[u16; 64],
) -> [i16; 64] {
    if ncoeffs < 2 {
        return [idct_dc_only(coeffs[0], dc_quant[0]); 64];
    }
    let mut dq = [0i16; 64];
    dq[0] = (i32::from(coeffs[0]) * i32::from(dc_quant[0])) as i16;
    for zz in 1..usize::from(ncoeffs) {
        let ci = ZIGZAG[zz];
        dq[ci] = (i32::from(coeffs[zz]) * i32::from(ac_quant[ci])) as i16;
    }
    idct8x8(&dq)
}

/// 重建一帧
///
/// `out` 进入时应是上一帧的拷贝, 未编码块保持不变.
pub(crate) fn reconstruct(
    layout: &FrameLayout,
    data: &FrameData,
    header: &FrameHeader,
    dequant: &DequantTables,
    prev: &FrameBuffer,
    golden: &FrameBuffer,
    out: &mut FrameBuffer,
) {
    for &fi in &data.coded_list {
        let pli = usize::from(layout.frag_plane[fi]);
        let plane = &layout.planes[pli];
        let (fx, fy) = layout.frag_coords(fi);
        let (x0, y0) = (fx * 8, fy * 8);
        let mode = data.frag_mode(layout, fi);
        let qti = usize::from(mode != MODE_INTRA);

        let qi0 = usize::from(header.qis[0]);
        let qi = usize::from(header.qis[usize::from(data.qiis[fi]).min(header.qis.len() - 1)]);
        let res = residual(
            &data.coeffs[fi],
            data.ncoeffs[fi],
            dequant.get(qti, pli, qi0),
            dequant.get(qti, pli, qi),
        );

        let pred = match reference_index(mode) {
            0 => [128u8; 64],
            1 => predict_inter(&prev.planes[pli], plane, x0, y0, data.mvs[fi]),
            _ => predict_inter(&golden.planes[pli], plane, x0, y0, data.mvs[fi]),
        };

        let width = plane.width();
        let dst = &mut out.planes[pli];
        for r in 0..8 {
            let row = (y0 + r) * width + x0;
            for c in 0..8 {
                let v = i32::from(pred[r * 8 + c]) + i32::from(res[r * 8 + c]);
                dst[row + c] = v.clamp(0, 255) as u8;
            }
        }
    }
}

/// 环路滤波的限幅响应
fn filter_response(r: i32, limit: i32) -> i32 {
    if r <= -2 * limit || r >= 2 * limit {
        0
    } else if r <= -limit {
        -r - 2 * limit
    } else if r < limit {
        r
    } else {
        2 * limit - r
    }
}

/// 对 4 个连续像素 (步长 `step`) 做一次边缘滤波, `pos` 指向边缘后第一个像素
fn filter_edge(buf: &mut [u8], pos: usize, step: usize, limit: i32) {
    let p0 = i32::from(buf[pos - 2 * step]);
    let p1 = i32::from(buf[pos - step]);
    let p2 = i32::from(buf[pos]);
    let p3 = i32::from(buf[pos + step]);
    let f = p0 - p3 + 3 * (p2 - p1);
    let lf = filter_response((f + 4) >> 3, limit);
    buf[pos - step] = (p1 + lf).clamp(0, 255) as u8;
    buf[pos] = (p2 - lf).clamp(0, 255) as u8;
}

/// 垂直边缘 (左侧为 x-1, 右侧为 x), 作用于 8 行
fn filter_vertical_edge(buf: &mut [u8], width: usize, x: usize, y0: usize, limit: i32) {
    for r in 0..8 {
        filter_edge(buf, (y0 + r) * width + x, 1, limit);
    }
}

/// 水平边缘 (下方为 y-1, 上方为 y), 作用于 8 列
fn filter_horizontal_edge(buf: &mut [u8], width: usize, x0: usize, y: usize, limit: i32) {
    for c in 0..8 {
        filter_edge(buf, y * width + x0 + c, width, limit);
    }
}

/// 对已编码块的边缘做环路滤波
pub(crate) fn loop_filter(layout: &FrameLayout, data: &FrameData, limit: u8, out: &mut FrameBuffer) {
    if limit == 0 {
        return;
    }
    let limit = i32::from(limit);
    for (pli, plane) in layout.planes.iter().enumerate() {
        let width = plane.width();
        let buf = &mut out.planes[pli];
        for fy in 0..plane.nvfrags {
            for fx in 0..plane.nhfrags {
                let fi = plane.frag(fx, fy);
                if !data.coded[fi] {
                    continue;
                }
                let (x0, y0) = (fx * 8, fy * 8);
                if fx > 0 {
                    filter_vertical_edge(buf, width, x0, y0, limit);
                }
                if fy > 0 {
                    filter_horizontal_edge(buf, width, x0, y0, limit);
                }
                if fx + 1 < plane.nhfrags && !data.coded[plane.frag(fx + 1, fy)] {
                    filter_vertical_edge(buf, width, x0 + 8, y0, limit);
                }
                if fy + 1 < plane.nvfrags && !data.coded[plane.frag(fx, fy + 1)] {
                    filter_horizontal_edge(buf, width, x0, y0 + 8, limit);
                }
            }
        }
    }
}

/// 输出后处理: 对平面内所有块边缘做去块滤波
///
/// 只作用于输出拷贝, 不影响参考帧.
pub(crate) fn deblock_plane(buf: &mut [u8], plane: &PlaneLayout, limit: i32) {
    let width = plane.width();
    for fy in 0..plane.nvfrags {
        for fx in 1..plane.nhfrags {
            filter_vertical_edge(buf, width, fx * 8, fy * 8, limit);
        }
    }
    for fy in 1..plane.nvfrags {
        for fx in 0..plane.nhfrags {
            filter_horizontal_edge(buf, width, fx * 8, fy * 8, limit);
        }
    }
}
