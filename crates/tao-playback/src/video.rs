//! 视频解码状态.
//!
//! 每个数据包产生一帧. 显示时间由帧的粒度位置换算:
//! `1000 * (iframe + pframe) * fps_den / fps_num` 毫秒.
//! 后处理级别只会由同步器请求降低, 降级在下一个数据包之前生效.

use log::{debug, warn};
use tao_codec::{Decoder, Frame, Packet};
use tao_core::{PixelFormat, Rational, TaoError, TaoResult};
use tao_scale::{YuvPlanes, yuv420p_to_rgba};

use crate::output::VideoFrame;

/// 解码出的 YUV 图像及其显示时间
#[derive(Debug, Clone)]
pub struct DecodedPicture {
    pub frame: tao_codec::VideoFrame,
    pub presentation_time_ms: i64,
}

impl DecodedPicture {
    /// 转换为 RGBA 输出帧
    pub fn to_rgba(&self) -> TaoResult<VideoFrame> {
        let f = &self.frame;
        if f.pixel_format != PixelFormat::Yuv420p || f.data.len() < 3 || f.linesize.len() < 3 {
            return Err(TaoError::Unsupported(format!(
                "无法转换像素格式 {:?}",
                f.pixel_format
            )));
        }
        let planes = YuvPlanes {
            y: &f.data[0],
            u: &f.data[1],
            v: &f.data[2],
            strides: [f.linesize[0], f.linesize[1], f.linesize[2]],
            width: f.width,
            height: f.height,
        };
        Ok(VideoFrame {
            data: yuv420p_to_rgba(&planes)?,
            width: f.width,
            height: f.height,
            presentation_time_ms: self.presentation_time_ms,
        })
    }
}

/// 视频解码状态
pub struct VideoDecoderState {
    decoder: Box<dyn Decoder>,
    frame_rate: Rational,
    pp_level: u8,
    pp_level_max: u8,
    drop_requested: bool,
    frames: u64,
}

impl VideoDecoderState {
    /// 包装已完成头包解析的解码器
    ///
    /// `post_processing` 为 false 时后处理级别固定为 0.
    pub fn new(mut decoder: Box<dyn Decoder>, frame_rate: Rational, post_processing: bool) -> Self {
        let pp_level_max = decoder.postprocess_level_max();
        let pp_level = if post_processing { pp_level_max } else { 0 };
        decoder.set_postprocess_level(pp_level);
        Self {
            decoder,
            frame_rate,
            pp_level,
            pp_level_max,
            drop_requested: false,
            frames: 0,
        }
    }

    pub fn frame_rate(&self) -> Rational {
        self.frame_rate
    }

    pub fn pp_level(&self) -> u8 {
        self.pp_level
    }

    pub fn pp_level_max(&self) -> u8 {
        self.pp_level_max
    }

    /// 已解码帧数
    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }

    /// 请求在下一个数据包之前把后处理降低一级
    pub fn request_quality_drop(&mut self) {
        self.drop_requested = true;
    }

    fn apply_quality_drop(&mut self) {
        if !self.drop_requested {
            return;
        }
        self.drop_requested = false;
        if self.pp_level > 0 {
            self.pp_level -= 1;
            self.decoder.set_postprocess_level(self.pp_level);
            debug!("视频: 后处理级别降为 {}", self.pp_level);
        }
    }

    /// 解码一个数据包
    ///
    /// 头包形状的包不产生图像, 返回 `Ok(None)`.
    pub fn decode_packet(&mut self, packet: &Packet) -> TaoResult<Option<DecodedPicture>> {
        self.apply_quality_drop();
        self.decoder.send_packet(packet)?;
        let frame = match self.decoder.receive_frame() {
            Ok(Frame::Video(frame)) => frame,
            Ok(Frame::Audio(_)) => {
                return Err(TaoError::Internal("视频解码器输出了音频帧".into()));
            }
            Err(TaoError::NeedMoreData) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(seconds) = self.decoder.granule_time(frame.granule) else {
            warn!("视频: 帧的粒度位置 {} 无法换算时间, 丢弃", frame.granule);
            return Ok(None);
        };
        self.frames += 1;
        Ok(Some(DecodedPicture {
            presentation_time_ms: (seconds * 1000.0).round() as i64,
            frame,
        }))
    }

    /// 丢弃参考帧, 用于重新开始
    pub fn reset(&mut self) {
        self.decoder.flush();
        self.drop_requested = false;
    }
}

impl std::fmt::Debug for VideoDecoderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoDecoderState")
            .field("codec", &self.decoder.name())
            .field("frame_rate", &self.frame_rate)
            .field("pp_level", &self.pp_level)
            .field("frames", &self.frames)
            .finish()
    }
}
