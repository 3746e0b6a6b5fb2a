//! 输出给调用方的数据类型.

use tao_core::Rational;

/// 可直接显示的视频帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// RGBA8888, 长度为 `width * height * 4`
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 显示时间 (毫秒)
    pub presentation_time_ms: i64,
}

/// 固定长度的 PCM 片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFragment {
    /// 有符号 16 位小端交织采样
    pub data: Vec<u8>,
    /// 片段第一个采样的时间 (毫秒)
    pub presentation_time_ms: i64,
}

impl AudioFragment {
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// 会话信息, 头包解析完成后不再变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvSessionInfo {
    pub width: u32,
    pub height: u32,
    /// 帧率, 有视频时分母一定非零
    pub frame_rate: Rational,
    pub sample_rate: u32,
    pub channels: u32,
    /// 输出采样位深, 固定为 16
    pub bits_per_sample: u32,
    pub has_video: bool,
    pub has_audio: bool,
}

impl Default for AvSessionInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            frame_rate: Rational::new(0, 1),
            sample_rate: 0,
            channels: 0,
            bits_per_sample: 16,
            has_video: false,
            has_audio: false,
        }
    }
}

impl AvSessionInfo {
    /// 是否为立体声
    pub fn is_stereo(&self) -> bool {
        self.channels > 1
    }
}
