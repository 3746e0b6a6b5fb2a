//! 同步器: 按播放时钟决定视频帧与音频片段的去留.
//!
//! 状态流转: `WaitingForHeaders -> Buffering -> Playing -> Stopped`.
//!
//! 视频帧 (显示时间 t, 时钟 c):
//! - `t < c - 容忍`: 丢弃, 并请求降低后处理级别
//! - `t <= c`: 立即输出
//! - `t > c + 视频领先量`: 本次迭代让出
//! - 其余: 保留待输出, 暂停后续视频解码
//!
//! 音频片段按 `t - c` 与固定的上下限比较, 超过上限认为输出端已饱和,
//! 低于下限则追赶 (输出并继续迭代).

use log::{debug, info};
use tao_core::Rational;

use crate::config::PlaybackConfig;

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    WaitingForHeaders,
    /// 等待视频帧与完整音频片段同时就绪
    Buffering,
    Playing,
    Stopped,
}

/// 对待输出视频帧的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoDecision {
    /// 已经过时, 丢弃
    Drop,
    /// 到时, 输出
    Emit,
    /// 远在未来, 结束本次迭代
    Yield,
    /// 尚未到时, 保留
    Hold,
}

/// 对就绪音频片段的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDecision {
    /// 领先过多, 暂停音频解码
    Saturated,
    /// 落后过多, 输出并继续迭代
    CatchUp,
    Emit,
}

/// 同步器
#[derive(Debug, Clone)]
pub struct Synchronizer {
    state: SyncState,
    has_video: bool,
    has_audio: bool,
    late_tolerance_ms: f64,
    video_lead_ms: f64,
    audio_horizon_ms: f64,
    audio_lead_limit_ms: i64,
    audio_lag_limit_ms: i64,
    dropped_frames: u64,
}

impl Synchronizer {
    /// `frame_rate` 为 None 表示没有视频流
    pub fn new(config: &PlaybackConfig, frame_rate: Option<Rational>, has_audio: bool) -> Self {
        let interval = frame_rate
            .filter(Rational::is_valid)
            .map(Rational::frame_interval_ms);
        Self {
            state: SyncState::WaitingForHeaders,
            has_video: interval.is_some(),
            has_audio,
            late_tolerance_ms: interval.map_or(0.0, |i| i * config.late_tolerance_frames),
            video_lead_ms: interval.map_or(0.0, |i| i * config.video_advance_frames),
            audio_horizon_ms: interval.map_or(config.audio_lead_limit_ms as f64, |i| {
                i * config.audio_advance_frames
            }),
            audio_lead_limit_ms: config.audio_lead_limit_ms,
            audio_lag_limit_ms: config.audio_lag_limit_ms,
            dropped_frames: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// 头包就绪, 开始缓冲
    pub fn begin_buffering(&mut self) {
        if self.state == SyncState::WaitingForHeaders {
            debug!("同步器: 开始缓冲");
            self.state = SyncState::Buffering;
        }
    }

    /// 缓冲阶段检查是否可以开始播放, 返回当前是否处于 Playing
    ///
    /// 没有的媒体类型视为已就绪.
    pub fn check_buffered(&mut self, video_ready: bool, audio_ready: bool) -> bool {
        if self.state == SyncState::Buffering
            && (!self.has_video || video_ready)
            && (!self.has_audio || audio_ready)
        {
            info!("同步器: 缓冲完成, 开始播放");
            self.state = SyncState::Playing;
        }
        self.state == SyncState::Playing
    }

    /// 缓冲未完成但数据已耗尽时直接进入播放, 以便输出剩余数据
    pub fn force_playing(&mut self) {
        if self.state == SyncState::Buffering {
            debug!("同步器: 数据耗尽, 跳过缓冲");
            self.state = SyncState::Playing;
        }
    }

    /// 视频帧决定
    pub fn decide_video(&mut self, frame_ms: i64, clock_ms: i64) -> VideoDecision {
        let t = frame_ms as f64;
        let c = clock_ms as f64;
        if t < c - self.late_tolerance_ms {
            self.dropped_frames += 1;
            debug!(
                "同步器: 视频帧 {} ms 落后时钟 {} ms, 丢弃 (累计 {})",
                frame_ms, clock_ms, self.dropped_frames
            );
            VideoDecision::Drop
        } else if t <= c {
            VideoDecision::Emit
        } else if t > c + self.video_lead_ms {
            VideoDecision::Yield
        } else {
            VideoDecision::Hold
        }
    }

    /// 音频片段决定
    pub fn decide_audio(&self, fragment_ms: i64, clock_ms: i64) -> AudioDecision {
        let offset = fragment_ms - clock_ms;
        if offset > self.audio_lead_limit_ms {
            AudioDecision::Saturated
        } else if offset < self.audio_lag_limit_ms {
            AudioDecision::CatchUp
        } else {
            AudioDecision::Emit
        }
    }

    /// 音频解码是否已领先足够多
    pub fn audio_ahead(&self, audio_ms: i64, clock_ms: i64) -> bool {
        (audio_ms - clock_ms) as f64 > self.audio_horizon_ms
    }

    pub fn stop(&mut self) {
        if self.state != SyncState::Stopped {
            info!("同步器: 停止 (丢帧 {})", self.dropped_frames);
            self.state = SyncState::Stopped;
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }
}
