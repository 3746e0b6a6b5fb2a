//! 编解码器参数.
//!
//! 解码器在 3 个头包解析完成后对外报告的流参数.

use tao_core::{PixelFormat, Rational};

use crate::codec_id::CodecId;

/// 编解码器参数
#[derive(Debug, Clone, PartialEq)]
pub struct CodecParameters {
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 标称码率 (bits/s), 未知为 0
    pub bit_rate: u64,
    /// 媒体类型特定参数
    pub params: CodecParamsType,
}

/// 媒体类型特定参数
#[derive(Debug, Clone, PartialEq)]
pub enum CodecParamsType {
    /// 视频参数
    Video(VideoCodecParams),
    /// 音频参数
    Audio(AudioCodecParams),
}

/// 视频编解码器参数
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCodecParams {
    /// 输出图像宽度 (像素)
    pub width: u32,
    /// 输出图像高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 帧率, 原样报告, 可能含 0
    pub frame_rate: Rational,
    /// 采样宽高比 (SAR)
    pub sample_aspect_ratio: Rational,
}

/// 音频编解码器参数
#[derive(Debug, Clone, PartialEq)]
pub struct AudioCodecParams {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u32,
    /// 最大块长 (采样)
    pub max_block_size: u32,
}

impl CodecParameters {
    /// 获取视频参数 (如果是视频流)
    pub fn video(&self) -> Option<&VideoCodecParams> {
        match &self.params {
            CodecParamsType::Video(v) => Some(v),
            CodecParamsType::Audio(_) => None,
        }
    }

    /// 获取音频参数 (如果是音频流)
    pub fn audio(&self) -> Option<&AudioCodecParams> {
        match &self.params {
            CodecParamsType::Audio(a) => Some(a),
            CodecParamsType::Video(_) => None,
        }
    }
}
