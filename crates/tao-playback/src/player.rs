//! 调用方接口.
//!
//! [`Player`] 负责打开会话 (识别流, 解析头包), 按配置选择驱动方式,
//! 并向调用方提供时钟控制与输出队列.

use std::path::Path;

use log::info;
use tao_core::{Rational, TaoError, TaoResult};
use tao_format::{ByteSource, FileSource, OggDemuxer};

use crate::clock::PlaybackClock;
use crate::config::{DriveMode, PlaybackConfig};
use crate::driver::{DecodeDriver, IterationOutcome};
use crate::error::OpenError;
use crate::headers::assemble_headers;
use crate::output::{AudioFragment, AvSessionInfo, VideoFrame};
use crate::queue::OutputQueue;
use crate::runner::ThreadedRunner;
use crate::status::{PlaybackStatus, SharedStatus};
use crate::sync::SyncState;

/// 驱动的宿主
#[derive(Debug)]
enum DriverHost {
    /// 已打开, 后台线程尚未启动
    Pending(DecodeDriver),
    /// 调用方按时间步驱动
    Tick(DecodeDriver),
    Threaded(ThreadedRunner),
    /// 已停止, 驱动已释放
    Released,
}

/// 播放会话
#[derive(Debug)]
pub struct Player {
    info: AvSessionInfo,
    frame_rate: Option<Rational>,
    clock: PlaybackClock,
    video_queue: OutputQueue<VideoFrame>,
    audio_queue: OutputQueue<AudioFragment>,
    status: SharedStatus,
    host: DriverHost,
    started: bool,
    paused: bool,
}

impl Player {
    /// 从字节源打开会话
    ///
    /// 返回时所有头包都已解析, 会话信息可用, 尚未开始播放.
    pub fn open(mut source: Box<dyn ByteSource>, config: PlaybackConfig) -> Result<Self, OpenError> {
        config.validate().map_err(OpenError::InvalidConfig)?;
        let mut demuxer = OggDemuxer::new();
        let streams = assemble_headers(source.as_mut(), &mut demuxer, &config)?;
        let info = streams.info;
        let frame_rate = info.has_video.then_some(info.frame_rate);

        let driver = DecodeDriver::new(source, demuxer, streams, &config);
        let video_queue = driver.video_queue();
        let audio_queue = driver.audio_queue();
        let status = driver.status();
        let host = match config.mode {
            DriveMode::Threaded => DriverHost::Pending(driver),
            DriveMode::Tick => DriverHost::Tick(driver),
        };
        info!("会话已打开 ({:?} 模式)", config.mode);
        Ok(Self {
            info,
            frame_rate,
            clock: PlaybackClock::new(),
            video_queue,
            audio_queue,
            status,
            host,
            started: false,
            paused: false,
        })
    }

    /// 打开本地文件
    pub fn open_file(path: impl AsRef<Path>, config: PlaybackConfig) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let source = FileSource::open(path).map_err(|source| OpenError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::open(Box::new(source), config)
    }

    /// 开始或继续播放
    ///
    /// 已停止的会话不能再播放, 需要重新打开.
    pub fn play(&mut self) -> TaoResult<()> {
        self.host = match std::mem::replace(&mut self.host, DriverHost::Released) {
            DriverHost::Released => {
                return Err(TaoError::InvalidArgument(
                    "会话已停止, 需要重新打开".into(),
                ));
            }
            DriverHost::Pending(driver) => {
                DriverHost::Threaded(ThreadedRunner::spawn(driver, self.clock.clone(), self.frame_rate)?)
            }
            DriverHost::Threaded(runner) => {
                runner.set_paused(false);
                DriverHost::Threaded(runner)
            }
            host @ DriverHost::Tick(_) => host,
        };
        if !self.started {
            info!("开始播放");
        }
        self.started = true;
        self.paused = false;
        Ok(())
    }

    /// 暂停: 不再迭代, 时钟由调用方停住
    pub fn pause(&mut self) {
        self.paused = true;
        if let DriverHost::Threaded(runner) = &self.host {
            runner.set_paused(true);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// 停止会话: 结束解码线程, 清空输出队列, 时钟归零
    pub fn stop(&mut self) {
        let driver = match std::mem::replace(&mut self.host, DriverHost::Released) {
            DriverHost::Released => return,
            DriverHost::Pending(driver) | DriverHost::Tick(driver) => Some(driver),
            DriverHost::Threaded(runner) => runner.shutdown(),
        };
        if let Some(mut driver) = driver {
            driver.stop();
        }
        self.video_queue.clear();
        self.audio_queue.clear();
        self.clock.reset();
        self.status.update(|s| s.state = SyncState::Stopped);
        info!("会话已停止");
    }

    fn is_running(&self) -> bool {
        self.started && !self.paused && !matches!(self.host, DriverHost::Released)
    }

    fn tick_once(&mut self) -> Option<IterationOutcome> {
        if !self.is_running() {
            return None;
        }
        match &mut self.host {
            DriverHost::Tick(driver) => Some(driver.iterate(self.clock.get())),
            _ => None,
        }
    }

    /// 设置已播放时间 (毫秒)
    ///
    /// 按时间步驱动时随后执行一次迭代.
    pub fn set_elapsed_time(&mut self, ms: i64) -> Option<IterationOutcome> {
        self.clock.set(ms);
        self.tick_once()
    }

    /// 时钟前进 `step_ms` 毫秒并执行一次迭代, 0 不做任何事
    ///
    /// 未播放或已暂停时时钟不动. 后台线程模式下只推进时钟.
    pub fn advance(&mut self, step_ms: i64) -> Option<IterationOutcome> {
        if step_ms == 0 || !self.is_running() {
            return None;
        }
        self.clock.advance(step_ms);
        self.tick_once()
    }

    /// 当前已播放时间 (毫秒)
    pub fn elapsed_time(&self) -> i64 {
        self.clock.get()
    }

    pub fn poll_video_frame(&self) -> Option<VideoFrame> {
        self.video_queue.pop()
    }

    pub fn poll_audio_fragment(&self) -> Option<AudioFragment> {
        self.audio_queue.pop()
    }

    pub fn session_info(&self) -> &AvSessionInfo {
        &self.info
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.snapshot()
    }

    /// 所有数据都已进入输出队列
    pub fn is_end_of_stream(&self) -> bool {
        self.status.snapshot().end_of_stream
    }

    /// 解码线程 (若有) 是否已结束
    pub fn is_finished(&self) -> bool {
        match &self.host {
            DriverHost::Threaded(runner) => runner.has_exited(),
            DriverHost::Released => true,
            DriverHost::Pending(d) | DriverHost::Tick(d) => {
                d.is_end_of_stream() || d.state() == SyncState::Stopped
            }
        }
    }
}
