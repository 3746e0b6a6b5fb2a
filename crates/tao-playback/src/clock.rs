//! 播放时钟.
//!
//! 单个共享的毫秒计数, 由调用方通过 set/advance 推进, 解码线程只读.

use std::sync::{Arc, Mutex, PoisonError};

/// 播放时钟 (线程安全, clone 后共享同一计数)
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    elapsed_ms: Arc<Mutex<i64>>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置当前时间 (毫秒)
    pub fn set(&self, ms: i64) {
        *self.elapsed_ms.lock().unwrap_or_else(PoisonError::into_inner) = ms;
    }

    /// 读取当前时间 (毫秒)
    pub fn get(&self) -> i64 {
        *self.elapsed_ms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 推进时间, 返回推进后的值
    pub fn advance(&self, step_ms: i64) -> i64 {
        let mut guard = self.elapsed_ms.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.saturating_add(step_ms);
        *guard
    }

    /// 归零
    pub fn reset(&self) {
        self.set(0);
    }
}
