//! Theora 视频解码器.
//!
//! 完整实现 Theora I 解码流程:
//! - 三个头包 (identification/comment/setup) 解析
//! - 帧数据解析 (编码标志, 宏块模式, 运动矢量, DCT token, 直流预测)
//! - 反量化, 整数反 DCT, 运动补偿, 环路滤波
//! - 黄金帧/上一帧参考管理与粒度位置跟踪
//! - 输出裁剪到图像区域, 行序转为自上而下, 可选去块后处理

mod decode;
mod headers;
mod huffman;
mod idct;
mod layout;
mod quant;
mod recon;

use std::collections::VecDeque;

use log::{debug, warn};
use tao_core::bitreader::BitReader;
use tao_core::{Rational, TaoError, TaoResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, CodecParamsType, VideoCodecParams};
use crate::decoder::Decoder;
use crate::frame::{Frame, VideoFrame};
use crate::packet::Packet;

pub use self::headers::{
    TheoraComment, TheoraInfo, is_header_packet, parse_comment, parse_identification,
};

use self::decode::{FrameData, parse_frame_header};
use self::headers::parse_setup;
use self::huffman::HuffmanTable;
use self::layout::FrameLayout;
use self::quant::DequantTables;
use self::recon::FrameBuffer;

/// 最高后处理级别: 1 为亮度去块, 2 为亮度与色度去块
pub const PP_LEVEL_MAX: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderStage {
    Identification,
    Comment,
    Setup,
    Frames,
}

/// setup 之后才能建立的解码状态
struct DecodeState {
    layout: FrameLayout,
    dequant: DequantTables,
    loop_filter_limits: [u8; 64],
    huffman: Vec<HuffmanTable>,
    data: FrameData,
    prev: FrameBuffer,
    golden: FrameBuffer,
}

/// Theora 解码器
pub struct TheoraDecoder {
    stage: HeaderStage,
    info: Option<TheoraInfo>,
    comment: Option<TheoraComment>,
    state: Option<DecodeState>,
    pp_level: u8,
    /// 最近关键帧的帧号
    keyframe_num: i64,
    /// 下一帧的帧号
    current_frame: i64,
    last_output: Option<VideoFrame>,
    pending: VecDeque<VideoFrame>,
}

impl Default for TheoraDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TheoraDecoder {
    /// 创建解码器, 后处理级别从最高开始
    pub fn new() -> Self {
        Self {
            stage: HeaderStage::Identification,
            info: None,
            comment: None,
            state: None,
            pp_level: PP_LEVEL_MAX,
            keyframe_num: 0,
            current_frame: 0,
            last_output: None,
            pending: VecDeque::new(),
        }
    }

    /// 创建 Theora 解码器 (工厂函数)
    pub fn create() -> TaoResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new()))
    }

    /// identification 头包信息
    pub fn info(&self) -> Option<&TheoraInfo> {
        self.info.as_ref()
    }

    /// comment 头包信息
    pub fn comment(&self) -> Option<&TheoraComment> {
        self.comment.as_ref()
    }

    /// 当前后处理级别
    pub fn pp_level(&self) -> u8 {
        self.pp_level
    }

    fn parse_header(&mut self, data: &[u8]) -> TaoResult<()> {
        if !is_header_packet(data) {
            return Err(TaoError::InvalidArgument(
                "Theora 头包尚未就绪, 不能送入数据包".into(),
            ));
        }
        match self.stage {
            HeaderStage::Identification => {
                let info = parse_identification(data)?;
                debug!(
                    "Theora {}.{}.{}: 帧 {}x{}, 图像 {}x{}+{}+{}, {}/{} fps, {}",
                    info.version_major,
                    info.version_minor,
                    info.version_revision,
                    info.frame_width(),
                    info.frame_height(),
                    info.pic_width,
                    info.pic_height,
                    info.pic_x,
                    info.pic_y,
                    info.fps_numerator,
                    info.fps_denominator,
                    info.pixel_format,
                );
                self.info = Some(info);
                self.stage = HeaderStage::Comment;
            }
            HeaderStage::Comment => {
                let comment = parse_comment(data)?;
                debug!(
                    "Theora vendor: {}, {} 条注释",
                    comment.vendor,
                    comment.user_comments.len()
                );
                self.comment = Some(comment);
                self.stage = HeaderStage::Setup;
            }
            HeaderStage::Setup => {
                let info = self
                    .info
                    .as_ref()
                    .ok_or_else(|| TaoError::Internal("Theora setup 前缺少 identification".into()))?;
                let setup = parse_setup(data)?;
                let layout = FrameLayout::new(
                    info.frame_mb_width as usize,
                    info.frame_mb_height as usize,
                    info.pixel_format,
                );
                let gray = FrameBuffer::gray(&layout);
                self.state = Some(DecodeState {
                    dequant: setup.quant.build_tables(),
                    loop_filter_limits: setup.loop_filter_limits,
                    huffman: setup.huffman,
                    data: FrameData::default(),
                    prev: gray.clone(),
                    golden: gray,
                    layout,
                });
                self.stage = HeaderStage::Frames;
            }
            HeaderStage::Frames => {}
        }
        Ok(())
    }

    fn granule_params(&self) -> (u32, i64) {
        self.info
            .as_ref()
            .map(|i| (u32::from(i.keyframe_granule_shift), i.granule_bias()))
            .unwrap_or((0, 0))
    }

    /// 以数据包携带的粒度位置校正帧号
    fn sync_granule(&mut self, granule: i64) {
        let (shift, bias) = self.granule_params();
        let mask = (1i64 << shift) - 1;
        self.keyframe_num = (granule >> shift) - bias;
        self.current_frame = self.keyframe_num + (granule & mask);
    }

    /// 为刚解码的帧生成粒度位置并推进帧号
    fn advance_granule(&mut self, keyframe: bool) -> i64 {
        let (shift, bias) = self.granule_params();
        if keyframe {
            self.keyframe_num = self.current_frame;
        }
        let granule =
            ((self.keyframe_num + bias) << shift) + (self.current_frame - self.keyframe_num);
        self.current_frame += 1;
        granule
    }

    fn decode_frame(&mut self, data: &[u8], granule_hint: Option<i64>) -> TaoResult<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| TaoError::InvalidArgument("Theora 头包尚未就绪".into()))?;
        let mut br = BitReader::new(data);
        let header = parse_frame_header(&mut br)?;
        decode::decode_frame(&mut br, &state.layout, &state.huffman, &header, &mut state.data)?;

        let mut current = state.prev.clone();
        recon::reconstruct(
            &state.layout,
            &state.data,
            &header,
            &state.dequant,
            &state.prev,
            &state.golden,
            &mut current,
        );
        let qi0 = header.qis[0];
        recon::loop_filter(
            &state.layout,
            &state.data,
            state.loop_filter_limits[usize::from(qi0)],
            &mut current,
        );
        if header.intra {
            state.golden = current.clone();
        }
        state.prev = current;

        if let Some(g) = granule_hint {
            self.sync_granule(g);
        }
        let granule = self.advance_granule(header.intra);
        let mut frame = self.output_frame(qi0)?;
        frame.granule = granule;
        frame.is_keyframe = header.intra;
        self.last_output = Some(frame.clone());
        self.pending.push_back(frame);
        Ok(())
    }

    /// 从上一帧缓冲生成输出帧
    fn output_frame(&self, qi0: u8) -> TaoResult<VideoFrame> {
        let (Some(state), Some(info)) = (self.state.as_ref(), self.info.as_ref()) else {
            return Err(TaoError::Internal("Theora 解码状态缺失".into()));
        };
        if self.pp_level == 0 {
            return Ok(crop_output(info, &state.layout, &state.prev));
        }
        let mut buf = state.prev.clone();
        let limit = (i32::from(state.loop_filter_limits[usize::from(qi0)]) * 2).max(2);
        let planes = if self.pp_level >= 2 { 3 } else { 1 };
        for pli in 0..planes {
            recon::deblock_plane(&mut buf.planes[pli], &state.layout.planes[pli], limit);
        }
        Ok(crop_output(info, &state.layout, &buf))
    }
}

/// 裁剪到图像区域并翻转为自上而下的行序
fn crop_output(info: &TheoraInfo, layout: &FrameLayout, buf: &FrameBuffer) -> VideoFrame {
    let fmt = info.pixel_format;
    let mut frame = VideoFrame::new(info.pic_width, info.pic_height, fmt);
    let (sx, sy) = fmt.chroma_shift();
    for pli in 0..3 {
        let plane = &layout.planes[pli];
        let (px, py) = if pli == 0 { (0, 0) } else { (sx, sy) };
        let x0 = (info.pic_x >> px) as usize;
        let y0 = (info.pic_y >> py) as usize;
        let out_w = frame.linesize[pli];
        let out_h = if out_w == 0 {
            0
        } else {
            frame.data[pli].len() / out_w
        };
        let w = out_w.min(plane.width().saturating_sub(x0));
        let h = out_h.min(plane.height().saturating_sub(y0));
        let src = &buf.planes[pli];
        for row in 0..h {
            let src_row = y0 + h - 1 - row;
            let s = src_row * plane.width() + x0;
            let d = row * out_w;
            frame.data[pli][d..d + w].copy_from_slice(&src[s..s + w]);
        }
    }
    frame
}

impl Decoder for TheoraDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Theora
    }

    fn name(&self) -> &str {
        "theora"
    }

    fn headers_ready(&self) -> bool {
        self.stage == HeaderStage::Frames
    }

    fn parameters(&self) -> Option<CodecParameters> {
        if !self.headers_ready() {
            return None;
        }
        let info = self.info.as_ref()?;
        Some(CodecParameters {
            codec_id: CodecId::Theora,
            bit_rate: u64::from(info.nominal_bitrate),
            params: CodecParamsType::Video(VideoCodecParams {
                width: info.pic_width,
                height: info.pic_height,
                pixel_format: info.pixel_format,
                frame_rate: Rational::new(info.fps_numerator, info.fps_denominator),
                sample_aspect_ratio: Rational::new(info.aspect_numerator, info.aspect_denominator),
            }),
        })
    }

    fn granule_time(&self, granule: i64) -> Option<f64> {
        let info = self.info.as_ref()?;
        if granule < 0 || info.fps_numerator == 0 {
            return None;
        }
        let shift = u32::from(info.keyframe_granule_shift);
        let iframe = granule >> shift;
        let pframe = granule - (iframe << shift);
        let frame = iframe + pframe - info.granule_bias();
        Some((frame + 1) as f64 * f64::from(info.fps_denominator) / f64::from(info.fps_numerator))
    }

    fn send_packet(&mut self, packet: &Packet) -> TaoResult<()> {
        let data = packet.data.as_ref();
        if self.stage != HeaderStage::Frames {
            return self.parse_header(data);
        }
        if is_header_packet(data) {
            warn!("Theora 头包之后又收到头包, 已跳过 (包序号 {})", packet.packet_no);
            return Ok(());
        }
        let granule_hint = packet.granule.filter(|&g| g >= 0);
        if data.is_empty() {
            // 空包表示重复上一帧
            if let Some(g) = granule_hint {
                self.sync_granule(g);
            }
            let granule = self.advance_granule(false);
            if let Some(last) = &self.last_output {
                let mut frame = last.clone();
                frame.granule = granule;
                frame.is_keyframe = false;
                self.pending.push_back(frame);
            }
            return Ok(());
        }
        self.decode_frame(data, granule_hint)
    }

    fn receive_frame(&mut self) -> TaoResult<Frame> {
        if !self.headers_ready() {
            return Err(TaoError::InvalidArgument("Theora 头包尚未就绪".into()));
        }
        self.pending
            .pop_front()
            .map(Frame::Video)
            .ok_or(TaoError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.last_output = None;
        self.keyframe_num = 0;
        self.current_frame = 0;
        if let Some(state) = self.state.as_mut() {
            let gray = FrameBuffer::gray(&state.layout);
            state.prev = gray.clone();
            state.golden = gray;
        }
    }

    fn postprocess_level_max(&self) -> u8 {
        PP_LEVEL_MAX
    }

    fn set_postprocess_level(&mut self, level: u8) {
        let level = level.min(PP_LEVEL_MAX);
        if level != self.pp_level {
            debug!("Theora 后处理级别: {} -> {}", self.pp_level, level);
            self.pp_level = level;
        }
    }
}
