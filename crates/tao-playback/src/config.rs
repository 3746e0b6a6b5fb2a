//! 播放配置.
//!
//! 所有字段都有默认值, JSON 配置文件只需写出要覆盖的字段.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tao_core::{TaoError, TaoResult};

/// 解码驱动的运行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    /// 后台线程循环解码
    #[default]
    Threaded,
    /// 调用方每个时间步驱动一次
    Tick,
}

/// 播放配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub mode: DriveMode,
    /// 每次从字节源读取的字节数
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// 打开阶段连续读到 0 字节的最大次数
    #[serde(default = "default_max_idle_reads")]
    pub max_idle_reads: u32,
    /// 单次驱动迭代内的最大步数
    #[serde(default = "default_max_iteration_steps")]
    pub max_iteration_steps: u32,
    /// 视频最多领先时钟的帧数
    #[serde(default = "default_video_advance_frames")]
    pub video_advance_frames: f64,
    /// 音频解码领先时钟的帧数
    #[serde(default = "default_audio_advance_frames")]
    pub audio_advance_frames: f64,
    /// 视频帧落后时钟多少帧后丢弃
    #[serde(default = "default_late_tolerance_frames")]
    pub late_tolerance_frames: f64,
    /// 音频领先时钟的上限 (毫秒), 超过后认为输出端已饱和
    #[serde(default = "default_audio_lead_limit_ms")]
    pub audio_lead_limit_ms: i64,
    /// 音频落后时钟的下限 (毫秒, 负数), 低于后进入追赶
    #[serde(default = "default_audio_lag_limit_ms")]
    pub audio_lag_limit_ms: i64,
    /// 音频片段的固定字节数, 未设置时取长块长度 x 2
    #[serde(default)]
    pub audio_fragment_bytes: Option<usize>,
    #[serde(default = "default_true")]
    pub enable_video: bool,
    #[serde(default = "default_true")]
    pub enable_audio: bool,
    /// 是否启用 Theora 后处理 (去块)
    #[serde(default = "default_true")]
    pub post_processing: bool,
}

fn default_true() -> bool {
    true
}

fn default_read_chunk_size() -> usize {
    4096
}

fn default_max_idle_reads() -> u32 {
    64
}

fn default_max_iteration_steps() -> u32 {
    256
}

fn default_video_advance_frames() -> f64 {
    10.0
}

fn default_audio_advance_frames() -> f64 {
    11.0
}

fn default_late_tolerance_frames() -> f64 {
    1.0
}

fn default_audio_lead_limit_ms() -> i64 {
    500
}

fn default_audio_lag_limit_ms() -> i64 {
    -100
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mode: DriveMode::default(),
            read_chunk_size: default_read_chunk_size(),
            max_idle_reads: default_max_idle_reads(),
            max_iteration_steps: default_max_iteration_steps(),
            video_advance_frames: default_video_advance_frames(),
            audio_advance_frames: default_audio_advance_frames(),
            late_tolerance_frames: default_late_tolerance_frames(),
            audio_lead_limit_ms: default_audio_lead_limit_ms(),
            audio_lag_limit_ms: default_audio_lag_limit_ms(),
            audio_fragment_bytes: None,
            enable_video: true,
            enable_audio: true,
            post_processing: true,
        }
    }
}

impl PlaybackConfig {
    /// 从 JSON 字符串解析
    pub fn from_json_str(text: &str) -> TaoResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| TaoError::InvalidArgument(format!("播放配置解析失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn from_json_file(path: impl AsRef<Path>) -> TaoResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// 检查取值范围
    pub fn validate(&self) -> TaoResult<()> {
        if self.read_chunk_size == 0 {
            return Err(TaoError::InvalidArgument("read_chunk_size 不能为 0".into()));
        }
        if self.max_iteration_steps == 0 {
            return Err(TaoError::InvalidArgument(
                "max_iteration_steps 不能为 0".into(),
            ));
        }
        if self.audio_lag_limit_ms > self.audio_lead_limit_ms {
            return Err(TaoError::InvalidArgument(format!(
                "音频容差窗口非法: 下限 {} 大于上限 {}",
                self.audio_lag_limit_ms, self.audio_lead_limit_ms
            )));
        }
        for (name, v) in [
            ("video_advance_frames", self.video_advance_frames),
            ("audio_advance_frames", self.audio_advance_frames),
            ("late_tolerance_frames", self.late_tolerance_frames),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(TaoError::InvalidArgument(format!("{name} 取值非法: {v}")));
            }
        }
        Ok(())
    }
}
