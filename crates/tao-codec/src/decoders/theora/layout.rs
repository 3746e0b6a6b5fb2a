//! 帧内块 (fragment) / 超级块 / 宏块的几何布局.
//!
//! 所有坐标以左下角为原点, 行号自下而上. 块在全局数组中按平面 (Y, Cb, Cr)
//! 依次存放, 平面内按光栅序排列.

use tao_core::PixelFormat;

/// 超级块内 16 个块的 Hilbert 曲线顺序, (x, y)
const HILBERT: [(usize, usize); 16] = [
    (0, 0),
    (1, 0),
    (1, 1),
    (0, 1),
    (0, 2),
    (0, 3),
    (1, 3),
    (1, 2),
    (2, 2),
    (2, 3),
    (3, 3),
    (3, 2),
    (3, 1),
    (2, 1),
    (2, 0),
    (3, 0),
];

/// 超级块内 4 个宏块的顺序: 左下, 左上, 右上, 右下
const MB_QUADRANTS: [(usize, usize); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];

/// 单个平面的块网格
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlaneLayout {
    /// 每行块数
    pub(crate) nhfrags: usize,
    /// 块行数
    pub(crate) nvfrags: usize,
    /// 本平面第一个块的全局下标
    pub(crate) frag_offset: usize,
    /// 水平方向是否抽样
    pub(crate) xdec: bool,
    /// 垂直方向是否抽样
    pub(crate) ydec: bool,
}

impl PlaneLayout {
    /// 平面像素宽度
    pub(crate) fn width(&self) -> usize {
        self.nhfrags * 8
    }

    /// 平面像素高度
    pub(crate) fn height(&self) -> usize {
        self.nvfrags * 8
    }

    /// 平面内坐标对应的全局块下标
    pub(crate) fn frag(&self, fx: usize, fy: usize) -> usize {
        self.frag_offset + fy * self.nhfrags + fx
    }
}

/// 一个宏块覆盖的块
#[derive(Debug, Clone)]
pub(crate) struct MacroblockMap {
    /// 4 个亮度块, 下标 i * 2 + j (i 为行, j 为列, 均自下而上/自左而右)
    pub(crate) luma: [usize; 4],
    /// 色度块, 依次为 Cb 再 Cr; 每个平面内按光栅序
    pub(crate) chroma: Vec<usize>,
}

/// 整帧的块布局
#[derive(Debug, Clone)]
pub(crate) struct FrameLayout {
    pub(crate) planes: [PlaneLayout; 3],
    /// 块总数
    pub(crate) nfrags: usize,
    /// 各超级块包含的块 (Hilbert 顺序, 已去掉平面外的块), 超级块按编码顺序
    pub(crate) superblocks: Vec<Vec<usize>>,
    /// 按编码顺序列出的全部块
    pub(crate) coded_order: Vec<usize>,
    /// 按编码顺序列出的宏块
    pub(crate) macroblocks: Vec<MacroblockMap>,
    /// 每个块所属平面
    pub(crate) frag_plane: Vec<u8>,
    /// 每个块所属宏块 (宏块编码顺序下标)
    pub(crate) frag_mb: Vec<usize>,
    pub(crate) pixel_format: PixelFormat,
}

impl FrameLayout {
    /// 按宏块尺寸与像素格式建立布局
    pub(crate) fn new(mb_width: usize, mb_height: usize, pixel_format: PixelFormat) -> Self {
        let (sx, sy) = pixel_format.chroma_shift();
        let luma = PlaneLayout {
            nhfrags: mb_width * 2,
            nvfrags: mb_height * 2,
            frag_offset: 0,
            xdec: false,
            ydec: false,
        };
        let chroma_w = luma.nhfrags >> sx;
        let chroma_h = luma.nvfrags >> sy;
        let cb = PlaneLayout {
            nhfrags: chroma_w,
            nvfrags: chroma_h,
            frag_offset: luma.nhfrags * luma.nvfrags,
            xdec: sx > 0,
            ydec: sy > 0,
        };
        let cr = PlaneLayout {
            frag_offset: cb.frag_offset + chroma_w * chroma_h,
            ..cb
        };
        let planes = [luma, cb, cr];
        let nfrags = cr.frag_offset + chroma_w * chroma_h;

        let mut frag_plane = vec![0u8; nfrags];
        for (pli, plane) in planes.iter().enumerate() {
            let start = plane.frag_offset;
            let end = start + plane.nhfrags * plane.nvfrags;
            frag_plane[start..end].fill(pli as u8);
        }

        let mut superblocks = Vec::new();
        let mut coded_order = Vec::with_capacity(nfrags);
        for plane in &planes {
            let nhsbs = plane.nhfrags.div_ceil(4);
            let nvsbs = plane.nvfrags.div_ceil(4);
            for sby in 0..nvsbs {
                for sbx in 0..nhsbs {
                    let mut frags = Vec::with_capacity(16);
                    for &(dx, dy) in &HILBERT {
                        let fx = sbx * 4 + dx;
                        let fy = sby * 4 + dy;
                        if fx < plane.nhfrags && fy < plane.nvfrags {
                            frags.push(plane.frag(fx, fy));
                        }
                    }
                    coded_order.extend_from_slice(&frags);
                    superblocks.push(frags);
                }
            }
        }

        let mut macroblocks = Vec::with_capacity(mb_width * mb_height);
        let mut frag_mb = vec![0usize; nfrags];
        for sby in 0..mb_height.div_ceil(2) {
            for sbx in 0..mb_width.div_ceil(2) {
                for &(qx, qy) in &MB_QUADRANTS {
                    let mbx = sbx * 2 + qx;
                    let mby = sby * 2 + qy;
                    if mbx >= mb_width || mby >= mb_height {
                        continue;
                    }
                    let mb_index = macroblocks.len();
                    let mut lumas = [0usize; 4];
                    for i in 0..2 {
                        for j in 0..2 {
                            let fi = luma.frag(mbx * 2 + j, mby * 2 + i);
                            lumas[i * 2 + j] = fi;
                            frag_mb[fi] = mb_index;
                        }
                    }
                    let mut chroma = Vec::with_capacity(8);
                    for plane in &planes[1..] {
                        let (cw, ch) = (2 >> sx, 2 >> sy);
                        for i in 0..ch {
                            for j in 0..cw {
                                let fi = plane.frag(mbx * cw + j, mby * ch + i);
                                chroma.push(fi);
                                frag_mb[fi] = mb_index;
                            }
                        }
                    }
                    macroblocks.push(MacroblockMap {
                        luma: lumas,
                        chroma,
                    });
                }
            }
        }

        Self {
            planes,
            nfrags,
            superblocks,
            coded_order,
            macroblocks,
            frag_plane,
            frag_mb,
            pixel_format,
        }
    }

    /// 块在平面内的坐标
    pub(crate) fn frag_coords(&self, fi: usize) -> (usize, usize) {
        let plane = &self.planes[usize::from(self.frag_plane[fi])];
        let local = fi - plane.frag_offset;
        (local % plane.nhfrags, local / plane.nhfrags)
    }
}
