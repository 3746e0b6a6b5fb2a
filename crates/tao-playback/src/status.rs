//! 播放状态与计数.

use std::sync::{Arc, Mutex, PoisonError};

use crate::sync::SyncState;

/// 播放状态快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub state: SyncState,
    /// 因落后时钟而丢弃的视频帧数
    pub dropped_frames: u64,
    /// 已入队的视频帧数
    pub video_frames: u64,
    /// 已入队的音频片段数
    pub audio_fragments: u64,
    pub end_of_stream: bool,
    /// 运行时解码错误
    pub error: Option<String>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: SyncState::WaitingForHeaders,
            dropped_frames: 0,
            video_frames: 0,
            audio_fragments: 0,
            end_of_stream: false,
            error: None,
        }
    }
}

/// 解码侧与调用方共享的状态
#[derive(Debug, Clone, Default)]
pub struct SharedStatus {
    inner: Arc<Mutex<PlaybackStatus>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在锁内修改
    pub fn update<R>(&self, f: impl FnOnce(&mut PlaybackStatus) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// 读取快照
    pub fn snapshot(&self) -> PlaybackStatus {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
