//! 后台解码线程.
//!
//! 线程以 `1000 / (fps * 2)` 毫秒为周期循环执行 [`DecodeDriver::iterate`],
//! 直到流结束, 会话停止, 或收到关闭信号. 暂停期间只等待, 不迭代.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use tao_core::{Rational, TaoError, TaoResult};

use crate::clock::PlaybackClock;
use crate::driver::DecodeDriver;

/// 没有视频流时的迭代周期
const DEFAULT_PERIOD_MS: u64 = 10;

/// 迭代周期: 半个帧间隔, 至少 1 毫秒
pub fn iteration_period(frame_rate: Option<Rational>) -> Duration {
    let ms = frame_rate
        .filter(Rational::is_valid)
        .map_or(DEFAULT_PERIOD_MS, |r| {
            (1000 * u64::from(r.den) / (2 * u64::from(r.num))).max(1)
        });
    Duration::from_millis(ms)
}

/// 运行解码驱动的后台线程
#[derive(Debug)]
pub struct ThreadedRunner {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<DecodeDriver>>,
    paused: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
}

impl ThreadedRunner {
    /// 启动线程, 驱动的所有权转移到线程中
    pub fn spawn(
        mut driver: DecodeDriver,
        clock: PlaybackClock,
        frame_rate: Option<Rational>,
    ) -> TaoResult<Self> {
        let (tx, rx) = mpsc::channel::<()>();
        let paused = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(AtomicBool::new(false));
        let period = iteration_period(frame_rate);
        let thread_paused = Arc::clone(&paused);
        let thread_exited = Arc::clone(&exited);

        let handle = thread::Builder::new()
            .name("tao-decode".into())
            .spawn(move || {
                info!("解码线程启动, 周期 {:?}", period);
                loop {
                    if !thread_paused.load(Ordering::Relaxed) {
                        let outcome = driver.iterate(clock.get());
                        if outcome.is_final() {
                            debug!("解码线程: {:?}", outcome);
                            break;
                        }
                    }
                    match rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                thread_exited.store(true, Ordering::Release);
                info!("解码线程退出");
                driver
            })
            .map_err(TaoError::Io)?;

        Ok(Self {
            shutdown: Some(tx),
            handle: Some(handle),
            paused,
            exited,
        })
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// 线程是否已自行结束 (流结束或出错)
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// 通知线程退出并等待, 取回驱动
    pub fn shutdown(mut self) -> Option<DecodeDriver> {
        self.stop_thread()
    }

    fn stop_thread(&mut self) -> Option<DecodeDriver> {
        if let Some(tx) = self.shutdown.take() {
            // 线程已退出时接收端不存在, 发送失败无妨
            let _ = tx.send(());
        }
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(driver) => Some(driver),
            Err(_) => {
                warn!("解码线程异常退出");
                None
            }
        }
    }
}

impl Drop for ThreadedRunner {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
