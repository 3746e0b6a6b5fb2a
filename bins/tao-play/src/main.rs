//! # tao-play
//!
//! 无界面的 Ogg/Theora/Vorbis 播放器.
//!
//! 按播放时钟解码输入文件, 把同步器放行的视频帧写为 PAM 图像,
//! 音频片段拼接为 s16le 原始 PCM. 用于检查解码与同步结果.

mod logging;
mod sink;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use tao_playback::{DriveMode, PlaybackConfig, Player};

use crate::sink::{FrameSink, PcmSink};

/// 命令行中的驱动方式
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// 后台线程按墙钟解码
    Threaded,
    /// 按固定时间步驱动, 不等待墙钟
    Tick,
}

impl From<ModeArg> for DriveMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Threaded => DriveMode::Threaded,
            ModeArg::Tick => DriveMode::Tick,
        }
    }
}

/// Ogg/Theora/Vorbis 无界面播放器
#[derive(Parser)]
#[command(name = "tao-play", version, about = "Ogg/Theora/Vorbis 无界面播放器")]
struct Args {
    /// 输入文件 (.ogv / .ogg)
    input: PathBuf,

    /// 驱动方式, 覆盖配置文件
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long = "novideo", help = "禁用视频")]
    no_video: bool,

    #[arg(long = "noaudio", help = "禁用音频")]
    no_audio: bool,

    /// 视频帧输出目录 (PAM 格式)
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// 最多输出的视频帧数, 达到后停止
    #[arg(long)]
    max_frames: Option<u64>,

    /// PCM 输出文件 (s16le 交织)
    #[arg(long)]
    pcm_out: Option<PathBuf>,

    /// tick 模式的时间步 (毫秒), 默认取一个帧间隔
    #[arg(long)]
    step_ms: Option<i64>,

    /// 日志目录, 不指定时只输出到终端
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// 日志详细程度 (-v debug, -vv tao trace, -vvv 全局 trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(args: &Args) -> anyhow::Result<PlaybackConfig> {
    let mut config = match &args.config {
        Some(path) => PlaybackConfig::from_json_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => PlaybackConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if args.no_video {
        config.enable_video = false;
    }
    if args.no_audio {
        config.enable_audio = false;
    }
    Ok(config)
}

/// 输出统计
#[derive(Debug, Default)]
struct Totals {
    frames: u64,
    fragments: u64,
}

struct Outputs {
    frames: Option<FrameSink>,
    pcm: Option<PcmSink>,
    max_frames: Option<u64>,
    totals: Totals,
}

impl Outputs {
    /// 取空输出队列, 返回是否已达到帧数上限
    fn drain(&mut self, player: &Player) -> anyhow::Result<bool> {
        while let Some(frame) = player.poll_video_frame() {
            if let Some(sink) = self.frames.as_mut() {
                sink.write(&frame)?;
            }
            self.totals.frames += 1;
            if self.max_frames.is_some_and(|max| self.totals.frames >= max) {
                return Ok(true);
            }
        }
        while let Some(fragment) = player.poll_audio_fragment() {
            if let Some(sink) = self.pcm.as_mut() {
                sink.write(&fragment)?;
            }
            self.totals.fragments += 1;
        }
        Ok(false)
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let mode = config.mode;
    let mut player = Player::open_file(&args.input, config)
        .map_err(|e| anyhow::anyhow!("打开 {} 失败 (错误码 {}): {}", args.input.display(), e.code(), e))?;

    let session = *player.session_info();
    if session.has_video {
        info!(
            "视频: {}x{} @ {} fps",
            session.width, session.height, session.frame_rate
        );
    }
    if session.has_audio {
        info!(
            "音频: {} Hz, {} 声道, {} 位",
            session.sample_rate, session.channels, session.bits_per_sample
        );
    }

    let mut outputs = Outputs {
        frames: args.frames_dir.as_deref().map(FrameSink::create).transpose()?,
        pcm: args.pcm_out.as_deref().map(PcmSink::create).transpose()?,
        max_frames: args.max_frames,
        totals: Totals::default(),
    };

    let step_ms = args
        .step_ms
        .filter(|&s| s > 0)
        .unwrap_or_else(|| {
            if session.has_video {
                session.frame_rate.frame_interval_ms().ceil().max(1.0) as i64
            } else {
                20
            }
        });

    player.play().context("开始播放失败")?;
    let started = Instant::now();
    loop {
        match mode {
            DriveMode::Tick => {
                player.advance(step_ms);
            }
            DriveMode::Threaded => {
                thread::sleep(Duration::from_millis(step_ms.unsigned_abs()));
                player.set_elapsed_time(started.elapsed().as_millis() as i64);
            }
        }
        if outputs.drain(&player)? {
            info!("已达到帧数上限 {}", outputs.totals.frames);
            break;
        }
        if player.is_end_of_stream() || player.is_finished() {
            outputs.drain(&player)?;
            break;
        }
    }

    let status = player.status();
    player.stop();
    if let Some(pcm) = outputs.pcm.take() {
        let bytes = pcm.finish()?;
        info!("PCM 共 {} 字节", bytes);
    }
    info!(
        "播放结束: 视频帧 {}, 音频片段 {}, 丢帧 {}, 播放时间 {} ms",
        outputs.totals.frames,
        outputs.totals.fragments,
        status.dropped_frames,
        started.elapsed().as_millis()
    );
    if let Some(error) = status.error {
        bail!("解码失败: {error}");
    }
    if !status.end_of_stream && outputs.max_frames.is_none() {
        warn!("播放未到达流结束");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init("tao-play", args.verbose, args.log_dir.as_deref())?;
    run(args)
}
