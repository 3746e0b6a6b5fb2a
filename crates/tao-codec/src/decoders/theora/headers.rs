//! Theora 三个头包解析: identification / comment / setup.
//!
//! 头包统一以 1 字节类型 (0x80/0x81/0x82) 加 "theora" 开头, 位序为 MSB first.

use tao_core::bitreader::BitReader;
use tao_core::{PixelFormat, TaoError, TaoResult};

use super::huffman::HuffmanTable;
use super::quant::QuantParams;

/// Huffman 表数量 (5 组 x 16 张)
pub(crate) const NUM_HUFFMAN_TABLES: usize = 80;

/// 可接受的最大宏块总数 (相当于 8192x8192 亮度)
pub(crate) const MAX_FRAME_MBS: u64 = 1 << 18;

/// identification 头包内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TheoraInfo {
    /// 主版本号 (必须为 3)
    pub version_major: u8,
    /// 次版本号
    pub version_minor: u8,
    /// 修订号
    pub version_revision: u8,
    /// 编码帧宽度 (宏块数)
    pub frame_mb_width: u32,
    /// 编码帧高度 (宏块数)
    pub frame_mb_height: u32,
    /// 图像宽度 (像素)
    pub pic_width: u32,
    /// 图像高度 (像素)
    pub pic_height: u32,
    /// 图像区域左偏移
    pub pic_x: u32,
    /// 图像区域下偏移 (Theora 坐标原点在左下角)
    pub pic_y: u32,
    /// 帧率分子
    pub fps_numerator: u32,
    /// 帧率分母
    pub fps_denominator: u32,
    /// 像素宽高比分子
    pub aspect_numerator: u32,
    /// 像素宽高比分母
    pub aspect_denominator: u32,
    /// 色彩空间编号
    pub colorspace: u8,
    /// 标称码率
    pub nominal_bitrate: u32,
    /// 质量提示 (0-63)
    pub quality: u8,
    /// 关键帧粒度位移
    pub keyframe_granule_shift: u8,
    /// 像素格式
    pub pixel_format: PixelFormat,
}

impl TheoraInfo {
    /// 编码帧宽度 (像素)
    pub fn frame_width(&self) -> u32 {
        self.frame_mb_width * 16
    }

    /// 编码帧高度 (像素)
    pub fn frame_height(&self) -> u32 {
        self.frame_mb_height * 16
    }

    /// 版本是否不低于 3.2.1 (粒度位置从 1 开始计帧)
    pub fn granule_bias(&self) -> i64 {
        let v = (
            self.version_major,
            self.version_minor,
            self.version_revision,
        );
        i64::from(v >= (3, 2, 1))
    }
}

/// comment 头包内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TheoraComment {
    /// 编码器标识
    pub vendor: String,
    /// 用户注释 (形如 `KEY=value`)
    pub user_comments: Vec<String>,
}

/// setup 头包内容
#[derive(Debug, Clone)]
pub(crate) struct TheoraSetup {
    /// 各 qi 对应的环路滤波强度
    pub(crate) loop_filter_limits: [u8; 64],
    /// 量化参数
    pub(crate) quant: QuantParams,
    /// DCT token Huffman 表
    pub(crate) huffman: Vec<HuffmanTable>,
}

fn check_magic(packet: &[u8], kind: u8, what: &str) -> TaoResult<()> {
    if packet.len() < 7 || packet[0] != kind || &packet[1..7] != b"theora" {
        return Err(TaoError::InvalidData(format!("Theora {what} 头包标识无效")));
    }
    Ok(())
}

/// 数据是否以任一 Theora 头包标识开头
pub fn is_header_packet(packet: &[u8]) -> bool {
    !packet.is_empty() && packet[0] & 0x80 != 0
}

/// 解析 identification 头包
///
/// 帧率不做校验, 由上层决定如何处理分母为 0 的流.
pub fn parse_identification(packet: &[u8]) -> TaoResult<TheoraInfo> {
    check_magic(packet, 0x80, "identification")?;
    let mut br = BitReader::new(&packet[7..]);
    let short = |_| TaoError::InvalidData("Theora identification 头包长度不足".into());

    let version_major = br.read_bits(8).map_err(short)? as u8;
    let version_minor = br.read_bits(8).map_err(short)? as u8;
    let version_revision = br.read_bits(8).map_err(short)? as u8;
    if version_major != 3 || version_minor > 2 {
        return Err(TaoError::Unsupported(format!(
            "Theora 版本不支持: {version_major}.{version_minor}.{version_revision}"
        )));
    }

    let frame_mb_width = br.read_bits(16).map_err(short)?;
    let frame_mb_height = br.read_bits(16).map_err(short)?;
    let pic_width = br.read_bits(24).map_err(short)?;
    let pic_height = br.read_bits(24).map_err(short)?;
    let pic_x = br.read_bits(8).map_err(short)?;
    let pic_y = br.read_bits(8).map_err(short)?;
    let fps_numerator = br.read_bits(32).map_err(short)?;
    let fps_denominator = br.read_bits(32).map_err(short)?;
    let aspect_numerator = br.read_bits(24).map_err(short)?;
    let aspect_denominator = br.read_bits(24).map_err(short)?;
    let colorspace = br.read_bits(8).map_err(short)? as u8;
    let nominal_bitrate = br.read_bits(24).map_err(short)?;
    let quality = br.read_bits(6).map_err(short)? as u8;
    let keyframe_granule_shift = br.read_bits(5).map_err(short)? as u8;
    let pf_code = br.read_bits(2).map_err(short)? as u8;
    let reserved = br.read_bits(3).map_err(short)?;

    if frame_mb_width == 0 || frame_mb_height == 0 {
        return Err(TaoError::InvalidData("Theora 帧尺寸为 0".into()));
    }
    if u64::from(frame_mb_width) * u64::from(frame_mb_height) > MAX_FRAME_MBS {
        return Err(TaoError::Unsupported(format!(
            "Theora 帧尺寸过大: {frame_mb_width}x{frame_mb_height} 宏块"
        )));
    }
    if pic_width + pic_x > frame_mb_width * 16 || pic_height + pic_y > frame_mb_height * 16 {
        return Err(TaoError::InvalidData(format!(
            "Theora 图像区域越界: {pic_width}x{pic_height}+{pic_x}+{pic_y}, 帧 {}x{}",
            frame_mb_width * 16,
            frame_mb_height * 16,
        )));
    }
    let pixel_format = PixelFormat::from_theora_code(pf_code)
        .ok_or_else(|| TaoError::InvalidData("Theora 像素格式为保留值".into()))?;
    if reserved != 0 {
        return Err(TaoError::InvalidData("Theora identification 保留位非 0".into()));
    }

    Ok(TheoraInfo {
        version_major,
        version_minor,
        version_revision,
        frame_mb_width,
        frame_mb_height,
        pic_width,
        pic_height,
        pic_x,
        pic_y,
        fps_numerator,
        fps_denominator,
        aspect_numerator,
        aspect_denominator,
        colorspace,
        nominal_bitrate,
        quality,
        keyframe_granule_shift,
        pixel_format,
    })
}

/// 解析 comment 头包
pub fn parse_comment(packet: &[u8]) -> TaoResult<TheoraComment> {
    check_magic(packet, 0x81, "comment")?;
    let mut pos = 7usize;
    let vendor_len = read_le_u32(packet, &mut pos)? as usize;
    let vendor = read_string(packet, &mut pos, vendor_len)?;
    let count = read_le_u32(packet, &mut pos)? as usize;
    let mut user_comments = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        let len = read_le_u32(packet, &mut pos)? as usize;
        user_comments.push(read_string(packet, &mut pos, len)?);
    }
    Ok(TheoraComment {
        vendor,
        user_comments,
    })
}

fn read_le_u32(data: &[u8], pos: &mut usize) -> TaoResult<u32> {
    let bytes = data
        .get(*pos..*pos + 4)
        .ok_or_else(|| TaoError::InvalidData("Theora comment 长度字段越界".into()))?;
    *pos += 4;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_string(data: &[u8], pos: &mut usize, len: usize) -> TaoResult<String> {
    let end = pos.saturating_add(len);
    let bytes = data.get(*pos..end).ok_or_else(|| {
        TaoError::InvalidData(format!(
            "Theora comment 字符串越界: pos={}, len={}, total={}",
            *pos,
            len,
            data.len()
        ))
    })?;
    *pos = end;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// 解析 setup 头包
pub(crate) fn parse_setup(packet: &[u8]) -> TaoResult<TheoraSetup> {
    check_magic(packet, 0x82, "setup")?;
    let mut br = BitReader::new(&packet[7..]);
    let short = |_| TaoError::InvalidData("Theora setup 头包长度不足".into());

    let nbits = br.read_bits(3).map_err(short)?;
    let mut loop_filter_limits = [0u8; 64];
    for lim in loop_filter_limits.iter_mut() {
        *lim = br.read_bits(nbits).map_err(short)? as u8;
    }

    let quant = QuantParams::read(&mut br)?;

    let mut huffman = Vec::with_capacity(NUM_HUFFMAN_TABLES);
    for _ in 0..NUM_HUFFMAN_TABLES {
        huffman.push(HuffmanTable::read(&mut br)?);
    }

    Ok(TheoraSetup {
        loop_filter_limits,
        quant,
        huffman,
    })
}
