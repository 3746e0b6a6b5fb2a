//! 帧数据解析: 帧头, 块编码标志, 宏块模式, 运动矢量, 块级 qi, DCT token 与直流预测.
//!
//! 帧数据越过包尾的位一律按 0 读取, 损坏的流会得到退化的图像而不是错误.

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

use super::huffman::HuffmanTable;
use super::layout::FrameLayout;

pub(crate) const MODE_INTER_NOMV: u8 = 0;
pub(crate) const MODE_INTRA: u8 = 1;
pub(crate) const MODE_INTER_MV: u8 = 2;
pub(crate) const MODE_INTER_MV_LAST: u8 = 3;
pub(crate) const MODE_INTER_MV_LAST2: u8 = 4;
pub(crate) const MODE_GOLDEN_NOMV: u8 = 5;
pub(crate) const MODE_GOLDEN_MV: u8 = 6;
pub(crate) const MODE_INTER_MV_FOUR: u8 = 7;

/// 模式编码方案 1-6 的字母表, 下标为码字序号
const MODE_ALPHABETS: [[u8; 8]; 6] = [
    [3, 4, 2, 0, 1, 5, 6, 7],
    [3, 4, 0, 2, 1, 5, 6, 7],
    [3, 2, 4, 0, 1, 5, 6, 7],
    [3, 2, 0, 4, 1, 5, 6, 7],
    [0, 3, 4, 2, 1, 5, 6, 7],
    [0, 5, 3, 4, 2, 1, 6, 7],
];

/// 最长的长游程, 之后需要重新读取位值
const LONG_RUN_MAX: usize = 4129;

/// 运动矢量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MotionVector {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl MotionVector {
    pub(crate) const ZERO: Self = Self { x: 0, y: 0 };

    fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 预测使用的参考帧: 0 帧内, 1 上一帧, 2 黄金帧
pub(crate) fn reference_index(mode: u8) -> usize {
    match mode {
        MODE_INTRA => 0,
        MODE_GOLDEN_NOMV | MODE_GOLDEN_MV => 2,
        _ => 1,
    }
}

/// 帧头
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    /// 是否为帧内编码帧 (关键帧)
    pub(crate) intra: bool,
    /// 1-3 个量化索引
    pub(crate) qis: Vec<u8>,
}

/// 一帧的解析结果, 缓冲区在帧间复用
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameData {
    /// 每块是否编码
    pub(crate) coded: Vec<bool>,
    /// 按编码顺序列出的已编码块
    pub(crate) coded_list: Vec<usize>,
    /// 每宏块的模式
    pub(crate) mb_modes: Vec<u8>,
    /// 每块的运动矢量 (半像素单位, 色度块已换算)
    pub(crate) mvs: Vec<MotionVector>,
    /// 每块的 qi 索引 (指向 FrameHeader::qis)
    pub(crate) qiis: Vec<u8>,
    /// 每块系数 (zigzag 序), 解析完成后直流已加上预测值
    pub(crate) coeffs: Vec<[i16; 64]>,
    /// 每块的有效系数个数 (最后一个 token 之后的位置)
    pub(crate) ncoeffs: Vec<u8>,
}

impl FrameData {
    fn reset(&mut self, layout: &FrameLayout) {
        let nfrags = layout.nfrags;
        self.coded.clear();
        self.coded.resize(nfrags, false);
        self.coded_list.clear();
        self.mb_modes.clear();
        self.mb_modes.resize(layout.macroblocks.len(), MODE_INTER_NOMV);
        self.mvs.clear();
        self.mvs.resize(nfrags, MotionVector::ZERO);
        self.qiis.clear();
        self.qiis.resize(nfrags, 0);
        self.coeffs.resize(nfrags, [0; 64]);
        self.ncoeffs.clear();
        self.ncoeffs.resize(nfrags, 0);
    }

    /// 块的宏块模式
    pub(crate) fn frag_mode(&self, layout: &FrameLayout, fi: usize) -> u8 {
        self.mb_modes[layout.frag_mb[fi]]
    }
}

/// 长/短游程位序列解码器
struct RunDecoder {
    long: bool,
    bit: bool,
    remaining: usize,
    started: bool,
    last_was_max: bool,
}

impl RunDecoder {
    fn long() -> Self {
        Self {
            long: true,
            bit: false,
            remaining: 0,
            started: false,
            last_was_max: false,
        }
    }

    fn short() -> Self {
        Self {
            long: false,
            ..Self::long()
        }
    }

    fn next(&mut self, br: &mut BitReader) -> bool {
        if self.remaining == 0 {
            if !self.started || (self.long && self.last_was_max) {
                self.bit = br.read_bit_padded() == 1;
                self.started = true;
            } else {
                self.bit = !self.bit;
            }
            let run = if self.long {
                read_long_run(br)
            } else {
                read_short_run(br)
            };
            self.last_was_max = run == LONG_RUN_MAX;
            self.remaining = run;
        }
        self.remaining -= 1;
        self.bit
    }
}

fn read_long_run(br: &mut BitReader) -> usize {
    const TABLE: [(usize, u32); 6] = [(1, 0), (2, 1), (4, 1), (6, 2), (10, 3), (18, 4)];
    for &(start, bits) in &TABLE {
        if br.read_bit_padded() == 0 {
            return start + br.read_bits_padded(bits) as usize;
        }
    }
    34 + br.read_bits_padded(12) as usize
}

fn read_short_run(br: &mut BitReader) -> usize {
    const TABLE: [(usize, u32); 5] = [(1, 1), (3, 1), (5, 1), (7, 2), (11, 2)];
    for &(start, bits) in &TABLE {
        if br.read_bit_padded() == 0 {
            return start + br.read_bits_padded(bits) as usize;
        }
    }
    15 + br.read_bits_padded(4) as usize
}

/// 解析帧头
///
/// 首位为 1 的包是头包, 不属于帧数据.
pub(crate) fn parse_frame_header(br: &mut BitReader) -> TaoResult<FrameHeader> {
    if br.read_bit_padded() != 0 {
        return Err(TaoError::InvalidData("Theora 帧数据首位非 0".into()));
    }
    let intra = br.read_bit_padded() == 0;
    let mut qis = vec![br.read_bits_padded(6) as u8];
    while qis.len() < 3 && br.read_bit_padded() == 1 {
        qis.push(br.read_bits_padded(6) as u8);
    }
    if intra && br.read_bits_padded(3) != 0 {
        return Err(TaoError::Unsupported(
            "Theora 关键帧保留位非 0, 编码特性不支持".into(),
        ));
    }
    Ok(FrameHeader { intra, qis })
}

/// 解析一帧的全部语法元素
pub(crate) fn decode_frame(
    br: &mut BitReader,
    layout: &FrameLayout,
    huffman: &[HuffmanTable],
    header: &FrameHeader,
    data: &mut FrameData,
) -> TaoResult<()> {
    data.reset(layout);

    if header.intra {
        data.coded.fill(true);
        data.mb_modes.fill(MODE_INTRA);
    } else {
        read_coded_flags(br, layout, data);
    }
    data.coded_list.extend(
        layout
            .coded_order
            .iter()
            .copied()
            .filter(|&fi| data.coded[fi]),
    );

    if !header.intra {
        read_mb_modes(br, layout, data);
        read_motion_vectors(br, layout, data);
    }
    read_block_qis(br, header.qis.len(), data);
    read_tokens(br, layout, huffman, data)?;
    predict_dc(layout, data);
    Ok(())
}

fn read_coded_flags(br: &mut BitReader, layout: &FrameLayout, data: &mut FrameData) {
    let nsbs = layout.superblocks.len();
    let mut runs = RunDecoder::long();
    let partial: Vec<bool> = (0..nsbs).map(|_| runs.next(br)).collect();

    let nfull = partial.iter().filter(|&&p| !p).count();
    let mut runs = RunDecoder::long();
    let full: Vec<bool> = (0..nfull).map(|_| runs.next(br)).collect();

    let mut full_iter = full.into_iter();
    let mut block_runs = RunDecoder::short();
    for (sbi, frags) in layout.superblocks.iter().enumerate() {
        if partial[sbi] {
            for &fi in frags {
                data.coded[fi] = block_runs.next(br);
            }
        } else {
            let coded = full_iter.next().unwrap_or(false);
            for &fi in frags {
                data.coded[fi] = coded;
            }
        }
    }
}

fn read_mb_modes(br: &mut BitReader, layout: &FrameLayout, data: &mut FrameData) {
    let scheme = br.read_bits_padded(3) as usize;
    let mut alphabet = [0u8; 8];
    if scheme == 0 {
        for mode in 0..8u8 {
            let mi = br.read_bits_padded(3) as usize;
            alphabet[mi] = mode;
        }
    } else if scheme < 7 {
        alphabet = MODE_ALPHABETS[scheme - 1];
    }

    for (mbi, mb) in layout.macroblocks.iter().enumerate() {
        if !mb.luma.iter().any(|&fi| data.coded[fi]) {
            data.mb_modes[mbi] = MODE_INTER_NOMV;
            continue;
        }
        data.mb_modes[mbi] = if scheme == 7 {
            br.read_bits_padded(3) as u8
        } else {
            let mut mi = 0usize;
            while mi < 7 && br.read_bit_padded() == 1 {
                mi += 1;
            }
            alphabet[mi]
        };
    }
}

fn read_mv_component(br: &mut BitReader, fixed: bool) -> i32 {
    if fixed {
        let mag = br.read_bits_padded(5) as i32;
        return if br.read_bit_padded() == 1 { -mag } else { mag };
    }
    let mag = match br.read_bits_padded(3) {
        0 => return 0,
        1 => return 1,
        2 => return -1,
        3 => 2,
        4 => 3,
        5 => 4 + br.read_bits_padded(2) as i32,
        6 => 8 + br.read_bits_padded(3) as i32,
        _ => 16 + br.read_bits_padded(4) as i32,
    };
    if br.read_bit_padded() == 1 {
        -mag
    } else {
        mag
    }
}

fn read_mv(br: &mut BitReader, fixed: bool) -> MotionVector {
    let x = read_mv_component(br, fixed);
    let y = read_mv_component(br, fixed);
    MotionVector::new(x, y)
}

/// 除以 2^shift 并四舍五入 (远离零)
fn div_round_pow2(v: i32, shift: u32) -> i32 {
    let bias = (1 << shift) >> 1;
    (v + bias - i32::from(v < 0)) >> shift
}

fn read_motion_vectors(br: &mut BitReader, layout: &FrameLayout, data: &mut FrameData) {
    let fixed = br.read_bit_padded() == 1;
    let mut last1 = MotionVector::ZERO;
    let mut last2 = MotionVector::ZERO;
    let (sx, sy) = layout.pixel_format.chroma_shift();

    for (mbi, mb) in layout.macroblocks.iter().enumerate() {
        let mode = data.mb_modes[mbi];
        if mode == MODE_INTER_MV_FOUR {
            let mut lbmvs = [MotionVector::ZERO; 4];
            let prior = last1;
            for (bi, &fi) in mb.luma.iter().enumerate() {
                if data.coded[fi] {
                    lbmvs[bi] = read_mv(br, fixed);
                    last1 = lbmvs[bi];
                }
                data.mvs[fi] = lbmvs[bi];
            }
            last2 = prior;
            assign_four_mv_chroma(mb.chroma.as_slice(), &lbmvs, (sx, sy), data);
            continue;
        }

        let mv = match mode {
            MODE_INTER_MV => {
                let mv = read_mv(br, fixed);
                last2 = last1;
                last1 = mv;
                mv
            }
            MODE_INTER_MV_LAST => last1,
            MODE_INTER_MV_LAST2 => {
                let mv = last2;
                last2 = last1;
                last1 = mv;
                mv
            }
            MODE_GOLDEN_MV => read_mv(br, fixed),
            _ => MotionVector::ZERO,
        };
        for &fi in mb.luma.iter().chain(mb.chroma.iter()) {
            data.mvs[fi] = mv;
        }
    }
}

/// 四矢量模式下由亮度矢量推导色度矢量
fn assign_four_mv_chroma(
    chroma: &[usize],
    lbmvs: &[MotionVector; 4],
    shift: (u32, u32),
    data: &mut FrameData,
) {
    let per_plane = chroma.len() / 2;
    let derived: Vec<MotionVector> = match shift {
        (1, 1) => {
            let sx: i32 = lbmvs.iter().map(|m| m.x).sum();
            let sy: i32 = lbmvs.iter().map(|m| m.y).sum();
            vec![MotionVector::new(div_round_pow2(sx, 2), div_round_pow2(sy, 2))]
        }
        (1, 0) => (0..2)
            .map(|row| {
                let a = lbmvs[row * 2];
                let b = lbmvs[row * 2 + 1];
                MotionVector::new(div_round_pow2(a.x + b.x, 1), div_round_pow2(a.y + b.y, 1))
            })
            .collect(),
        _ => lbmvs.to_vec(),
    };
    for plane in chroma.chunks(per_plane.max(1)) {
        for (&fi, mv) in plane.iter().zip(derived.iter()) {
            data.mvs[fi] = *mv;
        }
    }
}

fn read_block_qis(br: &mut BitReader, nqis: usize, data: &mut FrameData) {
    for qii in 0..nqis.saturating_sub(1) {
        let mut runs = RunDecoder::long();
        for &fi in &data.coded_list {
            if usize::from(data.qiis[fi]) == qii {
                data.qiis[fi] += u8::from(runs.next(br));
            }
        }
    }
}

fn huffman_group(ti: usize) -> usize {
    match ti {
        0 => 0,
        1..=5 => 1,
        6..=14 => 2,
        15..=27 => 3,
        _ => 4,
    }
}

fn signed(br: &mut BitReader, mag: i32) -> i16 {
    if br.read_bit_padded() == 1 {
        -mag as i16
    } else {
        mag as i16
    }
}

/// 写入 `zeros` 个零之后的一个值, 返回新的 token 位置
fn place(coeffs: &mut [i16; 64], ti: usize, zeros: usize, value: i16) -> TaoResult<usize> {
    let pos = ti + zeros;
    if pos >= 64 {
        return Err(TaoError::InvalidData(format!(
            "Theora DCT token 越过块尾: {pos}"
        )));
    }
    coeffs[pos] = value;
    Ok(pos + 1)
}

/// 展开一个非 EOB token
fn expand_token(
    br: &mut BitReader,
    token: u8,
    coeffs: &mut [i16; 64],
    ti: usize,
) -> TaoResult<usize> {
    match token {
        7 | 8 => {
            let run = if token == 7 {
                br.read_bits_padded(3) + 1
            } else {
                br.read_bits_padded(6) + 1
            } as usize;
            let pos = ti + run;
            if pos > 64 {
                return Err(TaoError::InvalidData(format!(
                    "Theora 零游程越过块尾: {pos}"
                )));
            }
            Ok(pos)
        }
        9 => place(coeffs, ti, 0, 1),
        10 => place(coeffs, ti, 0, -1),
        11 => place(coeffs, ti, 0, 2),
        12 => place(coeffs, ti, 0, -2),
        13..=16 => {
            let v = signed(br, i32::from(token) - 10);
            place(coeffs, ti, 0, v)
        }
        17..=22 => {
            const CATS: [(u32, i32); 6] = [(1, 7), (2, 9), (3, 13), (4, 21), (5, 37), (9, 69)];
            let (bits, base) = CATS[usize::from(token - 17)];
            let negative = br.read_bit_padded() == 1;
            let mag = base + br.read_bits_padded(bits) as i32;
            let value = if negative { -mag } else { mag };
            place(coeffs, ti, 0, value as i16)
        }
        23..=27 => {
            let v = signed(br, 1);
            place(coeffs, ti, usize::from(token - 22), v)
        }
        28 | 29 => {
            let negative = br.read_bit_padded() == 1;
            let zeros = if token == 28 {
                br.read_bits_padded(2) + 6
            } else {
                br.read_bits_padded(3) + 10
            } as usize;
            place(coeffs, ti, zeros, if negative { -1 } else { 1 })
        }
        30 => {
            let negative = br.read_bit_padded() == 1;
            let mag = br.read_bits_padded(1) as i16 + 2;
            place(coeffs, ti, 1, if negative { -mag } else { mag })
        }
        _ => {
            let negative = br.read_bit_padded() == 1;
            let mag = br.read_bits_padded(1) as i16 + 2;
            let zeros = br.read_bits_padded(1) as usize + 2;
            place(coeffs, ti, zeros, if negative { -mag } else { mag })
        }
    }
}

fn read_tokens(
    br: &mut BitReader,
    layout: &FrameLayout,
    huffman: &[HuffmanTable],
    data: &mut FrameData,
) -> TaoResult<()> {
    for &fi in &data.coded_list {
        data.coeffs[fi] = [0; 64];
    }
    let mut tis = vec![0u8; layout.nfrags];
    let mut eobs = 0usize;
    let mut hti_luma = 0usize;
    let mut hti_chroma = 0usize;

    for ti in 0..64usize {
        if ti <= 1 {
            hti_luma = br.read_bits_padded(4) as usize;
            hti_chroma = br.read_bits_padded(4) as usize;
        }
        let group = huffman_group(ti) * 16;
        for &fi in &data.coded_list {
            if usize::from(tis[fi]) != ti {
                continue;
            }
            if eobs > 0 {
                data.ncoeffs[fi] = ti as u8;
                tis[fi] = 64;
                eobs -= 1;
                continue;
            }
            let hti = if layout.frag_plane[fi] == 0 {
                hti_luma
            } else {
                hti_chroma
            };
            let token = huffman[group + hti].decode(br);
            if token < 7 {
                let run = match token {
                    0 => 1,
                    1 => 2,
                    2 => 3,
                    3 => br.read_bits_padded(2) as usize + 4,
                    4 => br.read_bits_padded(3) as usize + 8,
                    5 => br.read_bits_padded(4) as usize + 16,
                    _ => match br.read_bits_padded(12) as usize {
                        0 => usize::MAX,
                        n => n,
                    },
                };
                data.ncoeffs[fi] = ti as u8;
                tis[fi] = 64;
                eobs = run - 1;
            } else {
                let next = expand_token(br, token, &mut data.coeffs[fi], ti)?;
                tis[fi] = next as u8;
                if next == 64 {
                    data.ncoeffs[fi] = 64;
                }
            }
        }
    }
    Ok(())
}

/// 直流预测权重: (L, DL, D, DR, 除数), 下标为可用邻居标志
const DC_WEIGHTS: [(i32, i32, i32, i32, i32); 16] = [
    (0, 0, 0, 0, 0),
    (1, 0, 0, 0, 1),
    (0, 1, 0, 0, 1),
    (1, 0, 0, 0, 1),
    (0, 0, 1, 0, 1),
    (1, 0, 1, 0, 2),
    (0, 0, 1, 0, 1),
    (29, -26, 29, 0, 32),
    (0, 0, 0, 1, 1),
    (75, 0, 0, 53, 128),
    (0, 1, 0, 1, 2),
    (75, 0, 0, 53, 128),
    (0, 0, 1, 0, 1),
    (75, 0, 0, 53, 128),
    (0, 3, 10, 3, 16),
    (29, -26, 29, 0, 32),
];

fn predict_dc(layout: &FrameLayout, data: &mut FrameData) {
    for plane in &layout.planes {
        let mut last_dc = [0i32; 3];
        for fy in 0..plane.nvfrags {
            for fx in 0..plane.nhfrags {
                let fi = plane.frag(fx, fy);
                if !data.coded[fi] {
                    continue;
                }
                let rfi = reference_index(data.frag_mode(layout, fi));
                let neighbour = |nx: isize, ny: isize| -> Option<i32> {
                    if nx < 0 || ny < 0 || nx as usize >= plane.nhfrags {
                        return None;
                    }
                    let ni = plane.frag(nx as usize, ny as usize);
                    if data.coded[ni] && reference_index(data.frag_mode(layout, ni)) == rfi {
                        Some(i32::from(data.coeffs[ni][0]))
                    } else {
                        None
                    }
                };
                let (x, y) = (fx as isize, fy as isize);
                let l = neighbour(x - 1, y);
                let dl = neighbour(x - 1, y - 1);
                let d = neighbour(x, y - 1);
                let dr = neighbour(x + 1, y - 1);
                let flags = usize::from(l.is_some())
                    | usize::from(dl.is_some()) << 1
                    | usize::from(d.is_some()) << 2
                    | usize::from(dr.is_some()) << 3;

                let pred = if flags == 0 {
                    last_dc[rfi]
                } else {
                    let (pl, pdl, pd, pdr) =
                        (l.unwrap_or(0), dl.unwrap_or(0), d.unwrap_or(0), dr.unwrap_or(0));
                    let (wl, wdl, wd, wdr, div) = DC_WEIGHTS[flags];
                    let mut p = (wl * pl + wdl * pdl + wd * pd + wdr * pdr) / div;
                    if flags & 7 == 7 {
                        if (p - pd).abs() > 128 {
                            p = pd;
                        } else if (p - pl).abs() > 128 {
                            p = pl;
                        } else if (p - pdl).abs() > 128 {
                            p = pdl;
                        }
                    }
                    p
                };
                let dc = data.coeffs[fi][0].wrapping_add(pred as i16);
                data.coeffs[fi][0] = dc;
                last_dc[rfi] = i32::from(dc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tao_core::PixelFormat;
    use tao_core::bitwriter::BitWriter;

    #[test]
    fn test_帧头解析() {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 1);
        bw.write_bits(1, 1);
        bw.write_bits(20, 6);
        bw.write_bits(1, 1);
        bw.write_bits(30, 6);
        bw.write_bits(0, 1);
        let data = bw.finish();
        let h = parse_frame_header(&mut BitReader::new(&data)).unwrap();
        assert!(!h.intra);
        assert_eq!(h.qis, vec![20, 30]);

        assert!(parse_frame_header(&mut BitReader::new(&[0x80])).is_err());
    }

    #[test]
    fn test_长游程() {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 1);
        bw.write_bits(0b10, 2);
        bw.write_bits(1, 1);
        bw.write_bits(0b111111, 6);
        bw.write_bits(4095, 12);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_long_run(&mut br), 1);
        assert_eq!(read_long_run(&mut br), 3);
        assert_eq!(read_long_run(&mut br), LONG_RUN_MAX);
    }

    #[test]
    fn test_游程位序列交替() {
        // 起始位 1, 游程 2 (10 0), 然后翻转为 0, 游程 1 (0)
        let mut bw = BitWriter::new();
        bw.write_bits(1, 1);
        bw.write_bits(0b100, 3);
        bw.write_bits(0, 1);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        let mut runs = RunDecoder::long();
        let bits: Vec<bool> = (0..3).map(|_| runs.next(&mut br)).collect();
        assert_eq!(bits, vec![true, true, false]);
    }

    #[test]
    fn test_短游程() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b01, 2);
        bw.write_bits(0b11111, 5);
        bw.write_bits(15, 4);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_short_run(&mut br), 2);
        assert_eq!(read_short_run(&mut br), 30);
    }

    #[test]
    fn test_运动矢量分量() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b010, 3);
        bw.write_bits(0b0111, 4);
        bw.write_bits(0b101011, 6);
        bw.write_bits(0b11111111, 8);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_mv_component(&mut br, false), -1);
        assert_eq!(read_mv_component(&mut br, false), -2);
        assert_eq!(read_mv_component(&mut br, false), -5);
        assert_eq!(read_mv_component(&mut br, false), -31);

        let mut bw = BitWriter::new();
        bw.write_bits(17, 5);
        bw.write_bits(1, 1);
        let data = bw.finish();
        assert_eq!(read_mv_component(&mut BitReader::new(&data), true), -17);
    }

    #[test]
    fn test_色度矢量取整() {
        assert_eq!(div_round_pow2(6, 2), 2);
        assert_eq!(div_round_pow2(-6, 2), -2);
        assert_eq!(div_round_pow2(3, 1), 2);
        assert_eq!(div_round_pow2(-3, 1), -2);
        assert_eq!(div_round_pow2(-1, 2), 0);
    }

    #[test]
    fn test_token_展开() {
        let mut coeffs = [0i16; 64];
        let mut bw = BitWriter::new();
        // token 17: 符号 1, 幅度位 1 -> -8
        bw.write_bits(1, 1);
        bw.write_bits(1, 1);
        // token 24: 符号 0, 两个零后 +1
        bw.write_bits(0, 1);
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(expand_token(&mut br, 17, &mut coeffs, 0).unwrap(), 1);
        assert_eq!(coeffs[0], -8);
        assert_eq!(expand_token(&mut br, 24, &mut coeffs, 1).unwrap(), 4);
        assert_eq!(coeffs[3], 1);
        assert_eq!(coeffs[1], 0);

        let mut br = BitReader::new(&[0xFF]);
        assert!(expand_token(&mut br, 8, &mut coeffs, 10).is_err());
    }

    #[test]
    fn test_直流预测() {
        let layout = FrameLayout::new(1, 1, PixelFormat::Yuv420p);
        let mut data = FrameData::default();
        data.reset(&layout);
        data.coded.fill(true);
        data.mb_modes.fill(MODE_INTRA);
        let plane = layout.planes[0];
        // 亮度 2x2 块: 左下 10, 右下 (L) +5, 左上 (D, DR) 0, 右上 (L, DL, D) 0
        data.coeffs[plane.frag(0, 0)][0] = 10;
        data.coeffs[plane.frag(1, 0)][0] = 5;
        data.coeffs[plane.frag(0, 1)][0] = 0;
        data.coeffs[plane.frag(1, 1)][0] = 0;
        predict_dc(&layout, &mut data);
        assert_eq!(data.coeffs[plane.frag(0, 0)][0], 10);
        assert_eq!(data.coeffs[plane.frag(1, 0)][0], 15);
        // D=10, DR=15 -> 标志 12, 取 D
        assert_eq!(data.coeffs[plane.frag(0, 1)][0], 10);
        // L=10, DL=10, D=15 -> (29*(10+15) - 26*10) / 32 = 14
        assert_eq!(data.coeffs[plane.frag(1, 1)][0], 14);
    }

    /// 按 (值, 位数) 依次写入
    fn pack(fields: &[(u32, u32)]) -> Vec<u8> {
        let mut bw = BitWriter::new();
        for &(value, n) in fields {
            bw.write_bits(value, n);
        }
        bw.finish()
    }

    /// 定长运动矢量分量: 5 位幅度加符号位
    fn fixed_mv(x: i32, y: i32) -> [(u32, u32); 4] {
        [
            (x.unsigned_abs(), 5),
            (u32::from(x < 0), 1),
            (y.unsigned_abs(), 5),
            (u32::from(y < 0), 1),
        ]
    }

    fn frame_data(layout: &FrameLayout) -> FrameData {
        let mut data = FrameData::default();
        data.reset(layout);
        data
    }

    #[test]
    fn test_编码标志_部分超级块() {
        // 1x1 宏块: 超级块 0 为亮度 (Hilbert 序 0, 1, 3, 2), 1 为 Cb, 2 为 Cr
        let layout = FrameLayout::new(1, 1, PixelFormat::Yuv420p);
        let mut data = frame_data(&layout);
        let bits = pack(&[
            // 部分标志: 1 x1, 0 x2
            (1, 1),
            (0, 1),
            (0b100, 3),
            // 完整标志 (Cb, Cr): 1 x1, 0 x1
            (1, 1),
            (0, 1),
            (0, 1),
            // 亮度逐块 (短游程): 1 x1, 0 x2, 1 x1
            (1, 1),
            (0b00, 2),
            (0b01, 2),
            (0b00, 2),
        ]);
        read_coded_flags(&mut BitReader::new(&bits), &layout, &mut data);
        assert_eq!(data.coded, vec![true, false, true, false, true, false]);
    }

    #[test]
    fn test_编码标志_全部编码与全部跳过() {
        let layout = FrameLayout::new(1, 1, PixelFormat::Yuv420p);

        let mut data = frame_data(&layout);
        let bits = pack(&[(0, 1), (0b101, 3), (1, 1), (0b101, 3)]);
        read_coded_flags(&mut BitReader::new(&bits), &layout, &mut data);
        assert!(data.coded.iter().all(|&c| c));

        let mut data = frame_data(&layout);
        let bits = pack(&[(0, 1), (0b101, 3), (0, 1), (0b101, 3)]);
        read_coded_flags(&mut BitReader::new(&bits), &layout, &mut data);
        assert!(data.coded.iter().all(|&c| !c));
    }

    #[test]
    fn test_宏块模式_显式字母表() {
        // 2x1 宏块, 只有宏块 1 的亮度被编码
        let layout = FrameLayout::new(2, 1, PixelFormat::Yuv420p);
        let mut data = frame_data(&layout);
        for &fi in &layout.macroblocks[1].luma {
            data.coded[fi] = true;
        }
        // 模式 m 对应的码字序号
        let ranks = [2u32, 3, 1, 4, 5, 6, 0, 7];
        let mut fields = vec![(0, 3)];
        fields.extend(ranks.iter().map(|&mi| (mi, 3)));
        // 宏块 1: 序号 1 -> "10"; 其后为哨兵位
        fields.extend([(0b10, 2), (0b101, 3)]);
        let bits = pack(&fields);
        let mut br = BitReader::new(&bits);
        read_mb_modes(&mut br, &layout, &mut data);
        assert_eq!(data.mb_modes, vec![MODE_INTER_NOMV, MODE_INTER_MV]);
        // 未编码宏块不消耗任何位
        assert_eq!(br.read_bits_padded(3), 0b101);
    }

    #[test]
    fn test_宏块模式_定长方案() {
        let layout = FrameLayout::new(2, 1, PixelFormat::Yuv420p);
        let mut data = frame_data(&layout);
        data.coded.fill(true);
        let bits = pack(&[
            (7, 3),
            (u32::from(MODE_GOLDEN_MV), 3),
            (u32::from(MODE_INTER_MV_FOUR), 3),
        ]);
        read_mb_modes(&mut BitReader::new(&bits), &layout, &mut data);
        assert_eq!(data.mb_modes, vec![MODE_GOLDEN_MV, MODE_INTER_MV_FOUR]);
    }

    /// 宏块 mbi 的全部块是否都取得矢量 mv
    fn assert_mb_mv(layout: &FrameLayout, data: &FrameData, mbi: usize, mv: MotionVector) {
        let mb = &layout.macroblocks[mbi];
        for &fi in mb.luma.iter().chain(mb.chroma.iter()) {
            assert_eq!(data.mvs[fi], mv, "宏块 {mbi} 块 {fi}");
        }
    }

    #[test]
    fn test_运动矢量_last2_交换() {
        let layout = FrameLayout::new(2, 2, PixelFormat::Yuv420p);
        let mut data = frame_data(&layout);
        data.coded.fill(true);
        data.mb_modes = vec![
            MODE_INTER_MV,
            MODE_INTER_MV,
            MODE_INTER_MV_LAST2,
            MODE_INTER_MV_LAST,
        ];
        let a = MotionVector::new(2, -3);
        let b = MotionVector::new(5, 1);
        let mut fields = vec![(1, 1)];
        fields.extend(fixed_mv(a.x, a.y));
        fields.extend(fixed_mv(b.x, b.y));
        let bits = pack(&fields);
        read_motion_vectors(&mut BitReader::new(&bits), &layout, &mut data);
        assert_mb_mv(&layout, &data, 0, a);
        assert_mb_mv(&layout, &data, 1, b);
        // LAST2 取 a 并与 last1 交换, 之后 LAST 仍为 a
        assert_mb_mv(&layout, &data, 2, a);
        assert_mb_mv(&layout, &data, 3, a);
    }

    #[test]
    fn test_运动矢量_黄金帧矢量不更新历史() {
        let layout = FrameLayout::new(2, 2, PixelFormat::Yuv420p);
        let mut data = frame_data(&layout);
        data.coded.fill(true);
        data.mb_modes = vec![
            MODE_INTER_MV,
            MODE_GOLDEN_MV,
            MODE_INTER_MV_LAST,
            MODE_INTER_NOMV,
        ];
        let a = MotionVector::new(-7, 3);
        let g = MotionVector::new(4, 4);
        let mut fields = vec![(1, 1)];
        fields.extend(fixed_mv(a.x, a.y));
        fields.extend(fixed_mv(g.x, g.y));
        let bits = pack(&fields);
        read_motion_vectors(&mut BitReader::new(&bits), &layout, &mut data);
        assert_mb_mv(&layout, &data, 0, a);
        assert_mb_mv(&layout, &data, 1, g);
        assert_mb_mv(&layout, &data, 2, a);
        assert_mb_mv(&layout, &data, 3, MotionVector::ZERO);
    }

    #[test]
    fn test_运动矢量_四矢量色度推导() {
        let layout = FrameLayout::new(1, 1, PixelFormat::Yuv420p);
        let mut data = frame_data(&layout);
        data.coded.fill(true);
        let mb = layout.macroblocks[0].clone();
        // 左上亮度块未编码, 不读矢量且视为零
        data.coded[mb.luma[2]] = false;
        data.mb_modes = vec![MODE_INTER_MV_FOUR];
        let mut fields = vec![(1, 1)];
        fields.extend(fixed_mv(1, 2));
        fields.extend(fixed_mv(3, -4));
        fields.extend(fixed_mv(-9, 2));
        let bits = pack(&fields);
        read_motion_vectors(&mut BitReader::new(&bits), &layout, &mut data);
        assert_eq!(data.mvs[mb.luma[0]], MotionVector::new(1, 2));
        assert_eq!(data.mvs[mb.luma[1]], MotionVector::new(3, -4));
        assert_eq!(data.mvs[mb.luma[2]], MotionVector::ZERO);
        assert_eq!(data.mvs[mb.luma[3]], MotionVector::new(-9, 2));
        // 和为 (-5, 0), 除以 4 后远离零取整 -> (-1, 0)
        for &fi in &mb.chroma {
            assert_eq!(data.mvs[fi], MotionVector::new(-1, 0));
        }
    }

    #[test]
    fn test_块量化序号_多个qi() {
        let layout = FrameLayout::new(1, 1, PixelFormat::Yuv420p);
        let mut data = frame_data(&layout);
        data.coded_list = vec![0, 1, 2, 3];
        let bits = pack(&[
            // qii 0 一轮: 1, 0, 1, 1
            (1, 1),
            (0, 1),
            (0, 1),
            (0b100, 3),
            // qii 1 一轮 (块 0, 2, 3): 0, 1, 0
            (0, 1),
            (0, 1),
            (0, 1),
            (0, 1),
        ]);
        read_block_qis(&mut BitReader::new(&bits), 3, &mut data);
        assert_eq!(&data.qiis[..4], &[1, 0, 2, 1]);
        // 不在编码列表中的块保持 0
        assert_eq!(&data.qiis[4..], &[0, 0]);
    }
}
