//! 解码驱动.
//!
//! 一次迭代按顺序执行: 填充解码器 (缺包时读取字节并路由页面), 同步决策,
//! 输出入队, 检测流结束. 每次迭代最多执行 `max_iteration_steps` 步,
//! 后台线程与按时间步驱动两种运行方式共用这一套逻辑.

use log::{debug, info, warn};
use tao_core::{TaoError, TaoResult};
use tao_format::{ByteSource, OggDemuxer};

use crate::audio::AudioDecoderState;
use crate::config::PlaybackConfig;
use crate::headers::AssembledStreams;
use crate::output::{AudioFragment, AvSessionInfo, VideoFrame};
use crate::queue::OutputQueue;
use crate::reader::{ChunkReader, ReadStatus};
use crate::status::SharedStatus;
use crate::sync::{AudioDecision, SyncState, Synchronizer, VideoDecision};
use crate::video::{DecodedPicture, VideoDecoderState};

/// 一次迭代的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// 输出已领先时钟, 等待时钟推进
    Waiting,
    /// 字节源暂时没有数据
    Starved,
    /// 达到单次迭代的步数上限
    StepLimit,
    /// 数据全部输出完毕
    EndOfStream,
    /// 会话已停止 (调用方停止或解码失败)
    Stopped,
}

impl IterationOutcome {
    /// 之后的迭代不会再产生输出
    pub fn is_final(self) -> bool {
        matches!(self, Self::EndOfStream | Self::Stopped)
    }
}

/// 视频侧本步的节奏
#[derive(Debug, Clone, Copy, Default)]
struct VideoPace {
    blocked: bool,
    yielded: bool,
}

/// 音频侧本步的节奏
#[derive(Debug, Clone, Copy, Default)]
struct AudioPace {
    blocked: bool,
    catch_up: bool,
}

/// 解码驱动, 独占解复用与解码状态
pub struct DecodeDriver {
    source: Box<dyn ByteSource>,
    demuxer: OggDemuxer,
    reader: ChunkReader,
    video: Option<VideoDecoderState>,
    audio: Option<AudioDecoderState>,
    info: AvSessionInfo,
    sync: Synchronizer,
    /// 已解码等待输出的图像
    picture: Option<DecodedPicture>,
    video_queue: OutputQueue<VideoFrame>,
    audio_queue: OutputQueue<AudioFragment>,
    status: SharedStatus,
    max_steps: u32,
    exhausted: bool,
    end_of_stream: bool,
}

impl DecodeDriver {
    pub fn new(
        source: Box<dyn ByteSource>,
        demuxer: OggDemuxer,
        streams: AssembledStreams,
        config: &PlaybackConfig,
    ) -> Self {
        let frame_rate = streams.video.as_ref().map(VideoDecoderState::frame_rate);
        let sync = Synchronizer::new(config, frame_rate, streams.audio.is_some());
        Self {
            source,
            demuxer,
            reader: ChunkReader::new(config.read_chunk_size),
            video: streams.video,
            audio: streams.audio,
            info: streams.info,
            sync,
            picture: None,
            video_queue: OutputQueue::new(),
            audio_queue: OutputQueue::new(),
            status: SharedStatus::new(),
            max_steps: config.max_iteration_steps.max(1),
            exhausted: false,
            end_of_stream: false,
        }
    }

    pub fn session_info(&self) -> &AvSessionInfo {
        &self.info
    }

    /// 视频输出队列 (共享句柄)
    pub fn video_queue(&self) -> OutputQueue<VideoFrame> {
        self.video_queue.clone()
    }

    /// 音频输出队列 (共享句柄)
    pub fn audio_queue(&self) -> OutputQueue<AudioFragment> {
        self.audio_queue.clone()
    }

    /// 状态 (共享句柄)
    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// 执行一次迭代
    pub fn iterate(&mut self, clock_ms: i64) -> IterationOutcome {
        match self.sync.state() {
            SyncState::Stopped if self.end_of_stream => return IterationOutcome::EndOfStream,
            SyncState::Stopped => return IterationOutcome::Stopped,
            SyncState::WaitingForHeaders => self.sync.begin_buffering(),
            SyncState::Buffering | SyncState::Playing => {}
        }

        let mut outcome = IterationOutcome::StepLimit;
        for _ in 0..self.max_steps {
            match self.step(clock_ms) {
                Ok(None) => continue,
                Ok(Some(done)) => {
                    outcome = done;
                    break;
                }
                Err(e) => {
                    self.fail(e);
                    return IterationOutcome::Stopped;
                }
            }
        }
        if outcome == IterationOutcome::EndOfStream {
            self.finish();
        }
        let state = self.sync.state();
        let dropped = self.sync.dropped_frames();
        self.status.update(|s| {
            s.state = state;
            s.dropped_frames = dropped;
        });
        outcome
    }

    /// 单步, 返回 Some 时结束本次迭代
    fn step(&mut self, clock_ms: i64) -> TaoResult<Option<IterationOutcome>> {
        let video_starved = self.fill_video()?;
        let audio_starved = self.fill_audio()?;

        if self.exhausted && (video_starved || audio_starved) {
            self.sync.force_playing();
        }
        let audio_ready = self.audio.as_ref().is_some_and(AudioDecoderState::is_fragment_ready);
        let playing = match self.sync.state() {
            SyncState::Buffering => self.sync.check_buffered(self.picture.is_some(), audio_ready),
            SyncState::Playing => true,
            SyncState::WaitingForHeaders | SyncState::Stopped => false,
        };

        let (video, audio) = if playing {
            (self.pace_video(clock_ms)?, self.pace_audio(clock_ms))
        } else {
            // 缓冲阶段: 已就绪的一侧等待另一侧
            (
                VideoPace {
                    blocked: self.video.is_none() || self.picture.is_some(),
                    yielded: false,
                },
                AudioPace {
                    blocked: self.audio.is_none() || audio_ready,
                    catch_up: false,
                },
            )
        };

        if video.yielded && !audio.catch_up {
            return Ok(Some(IterationOutcome::Waiting));
        }

        let need_data = (video_starved && !video.blocked) || (audio_starved && !audio.blocked);
        if need_data && !self.exhausted {
            if self.pump() > 0 {
                return Ok(None);
            }
            match self.reader.read_chunk(self.source.as_mut(), &mut self.demuxer)? {
                ReadStatus::Data(_) => {
                    self.pump();
                    return Ok(None);
                }
                ReadStatus::Starved => return Ok(Some(IterationOutcome::Starved)),
                ReadStatus::Exhausted => {
                    info!("字节源耗尽, 共读取 {} 字节", self.reader.total_bytes());
                    self.exhausted = true;
                    self.pump();
                    return Ok(None);
                }
            }
        }

        if self.exhausted && self.is_drained() {
            return Ok(Some(IterationOutcome::EndOfStream));
        }
        let video_idle = video.blocked || (video_starved && self.exhausted);
        let audio_idle = audio.blocked || (audio_starved && self.exhausted);
        if video_idle && audio_idle && !audio.catch_up {
            return Ok(Some(IterationOutcome::Waiting));
        }
        Ok(None)
    }

    /// 没有待输出图像时解码下一个视频包, 返回是否缺包
    fn fill_video(&mut self) -> TaoResult<bool> {
        let Some(video) = self.video.as_mut() else {
            return Ok(false);
        };
        while self.picture.is_none() {
            let Some(packet) = self.demuxer.video_packet() else {
                return Ok(true);
            };
            self.picture = video.decode_packet(&packet)?;
        }
        Ok(false)
    }

    /// 先搬运待取采样, 仍未填满且没有待取采样时才解码新包, 返回是否缺包
    fn fill_audio(&mut self) -> TaoResult<bool> {
        let Some(audio) = self.audio.as_mut() else {
            return Ok(false);
        };
        while !audio.fill() {
            let Some(packet) = self.demuxer.audio_packet() else {
                return Ok(true);
            };
            audio.decode_packet(&packet)?;
        }
        Ok(false)
    }

    fn pace_video(&mut self, clock_ms: i64) -> TaoResult<VideoPace> {
        let Some(picture) = self.picture.as_ref() else {
            return Ok(VideoPace {
                blocked: self.video.is_none(),
                yielded: false,
            });
        };
        let pace = match self.sync.decide_video(picture.presentation_time_ms, clock_ms) {
            VideoDecision::Drop => {
                self.picture = None;
                if let Some(video) = self.video.as_mut() {
                    video.request_quality_drop();
                }
                VideoPace::default()
            }
            VideoDecision::Emit => {
                let frame = picture.to_rgba()?;
                self.picture = None;
                debug!("输出视频帧 {} ms (时钟 {} ms)", frame.presentation_time_ms, clock_ms);
                self.video_queue.push(frame);
                self.status.update(|s| s.video_frames += 1);
                VideoPace::default()
            }
            VideoDecision::Yield => VideoPace {
                blocked: true,
                yielded: true,
            },
            VideoDecision::Hold => VideoPace {
                blocked: true,
                yielded: false,
            },
        };
        Ok(pace)
    }

    fn pace_audio(&mut self, clock_ms: i64) -> AudioPace {
        let Some(audio) = self.audio.as_mut() else {
            return AudioPace {
                blocked: true,
                catch_up: false,
            };
        };
        let Some(t) = audio.fragment_time_ms() else {
            return AudioPace::default();
        };
        let decision = self.sync.decide_audio(t, clock_ms);
        if decision == AudioDecision::Saturated {
            return AudioPace {
                blocked: true,
                catch_up: false,
            };
        }
        if let Some(fragment) = audio.take_fragment() {
            debug!("输出音频片段 {} ms, {} 字节", t, fragment.size_bytes());
            self.audio_queue.push(fragment);
            self.status.update(|s| s.audio_fragments += 1);
        }
        match decision {
            AudioDecision::CatchUp => AudioPace {
                blocked: false,
                catch_up: true,
            },
            _ => AudioPace {
                blocked: self.sync.audio_ahead(t, clock_ms),
                catch_up: false,
            },
        }
    }

    /// 路由缓存的页面, 丢弃被禁用流的包
    fn pump(&mut self) -> usize {
        let routed = self.demuxer.pump();
        if self.video.is_none() {
            while self.demuxer.video_packet().is_some() {}
        }
        if self.audio.is_none() {
            while self.demuxer.audio_packet().is_some() {}
        }
        routed
    }

    /// 所有已读数据都已输出或丢弃
    fn is_drained(&mut self) -> bool {
        let video_done = self.video.is_none()
            || (self.picture.is_none() && self.demuxer.video_packets_pending() == 0);
        let audio_done = match self.audio.as_ref() {
            None => true,
            Some(a) => {
                !a.has_pending_pcm()
                    && !a.is_fragment_ready()
                    && self.demuxer.audio_packets_pending() == 0
            }
        };
        video_done && audio_done
    }

    fn finish(&mut self) {
        if !self.end_of_stream {
            info!("播放结束");
            self.end_of_stream = true;
            self.sync.stop();
            self.status.update(|s| s.end_of_stream = true);
        }
    }

    fn fail(&mut self, error: TaoError) {
        warn!("解码失败, 停止播放: {}", error);
        self.clear_decode_state();
        self.sync.stop();
        let state = self.sync.state();
        self.status.update(|s| {
            s.state = state;
            s.error = Some(error.to_string());
        });
    }

    fn clear_decode_state(&mut self) {
        self.picture = None;
        if let Some(video) = self.video.as_mut() {
            video.reset();
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.reset();
        }
        self.demuxer.reset();
    }

    /// 停止会话: 清空解码状态与输出队列
    pub fn stop(&mut self) {
        self.clear_decode_state();
        self.sync.stop();
        self.video_queue.clear();
        self.audio_queue.clear();
        let state = self.sync.state();
        self.status.update(|s| s.state = state);
    }
}

impl std::fmt::Debug for DecodeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeDriver")
            .field("state", &self.sync.state())
            .field("video", &self.video)
            .field("audio", &self.audio)
            .field("exhausted", &self.exhausted)
            .field("end_of_stream", &self.end_of_stream)
            .finish()
    }
}
