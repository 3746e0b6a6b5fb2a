//! 播放管线集成测试: 合成 Ogg 流 -> 头包 -> 解码 -> 同步 -> 输出队列.

mod common;

use std::time::{Duration, Instant};

use tao_ogv::core::Rational;
use tao_ogv::format::MemorySource;
use tao_ogv::playback::{DriveMode, IterationOutcome, OpenError, PlaybackConfig, Player, SyncState};

use common::*;

fn tick_config() -> PlaybackConfig {
    PlaybackConfig {
        mode: DriveMode::Tick,
        ..PlaybackConfig::default()
    }
}

fn open(data: Vec<u8>, config: PlaybackConfig) -> Result<Player, OpenError> {
    init_logging();
    Player::open(Box::new(MemorySource::new(data)), config)
}

#[test]
fn test_仅视频端到端() {
    let mut player = open(video_only_stream((10, 1), 0), tick_config()).unwrap();
    let info = *player.session_info();
    assert!(info.has_video);
    assert!(!info.has_audio);
    assert_eq!((info.width, info.height), (16, 16));
    assert_eq!(info.frame_rate, Rational::new(10, 1));

    player.play().unwrap();
    assert_eq!(player.set_elapsed_time(0), Some(IterationOutcome::Waiting));
    assert!(player.poll_video_frame().is_none());

    assert_eq!(player.advance(100), Some(IterationOutcome::Waiting));
    let first = player.poll_video_frame().unwrap();
    assert_eq!(first.presentation_time_ms, 100);
    assert_eq!(first.data.len(), 16 * 16 * 4);
    assert!(first.data.chunks(4).all(|px| px == &first.data[..4]));
    assert_eq!(first.data[3], 255);
    assert!(player.poll_video_frame().is_none());

    assert_eq!(player.advance(100), Some(IterationOutcome::EndOfStream));
    let second = player.poll_video_frame().unwrap();
    assert_eq!(second.presentation_time_ms, 200);
    assert_eq!(second.data, first.data);
    assert!(player.is_end_of_stream());

    let status = player.status();
    assert_eq!(status.video_frames, 2);
    assert_eq!(status.dropped_frames, 0);
    assert_eq!(status.state, SyncState::Stopped);
}

#[test]
fn test_时钟为零时不推进() {
    let mut player = open(video_only_stream((10, 1), 0), tick_config()).unwrap();
    player.play().unwrap();
    assert_eq!(player.advance(0), None);
    assert_eq!(player.elapsed_time(), 0);
}

#[test]
fn test_暂停后不迭代() {
    let mut player = open(video_only_stream((10, 1), 0), tick_config()).unwrap();
    player.play().unwrap();
    player.pause();
    assert!(player.is_paused());
    assert_eq!(player.advance(100), None);
    assert!(player.poll_video_frame().is_none());
    player.play().unwrap();
    player.advance(100);
    assert!(player.poll_video_frame().is_some());
}

#[test]
fn test_一直没有数据时头包不完整() {
    init_logging();
    let err = Player::open(Box::new(StalledSource::default()), PlaybackConfig::default()).unwrap_err();
    assert!(matches!(err, OpenError::TruncatedHeader(_)));
    assert_eq!(err.code(), -4);
}

#[test]
fn test_帧率为零() {
    let err = open(video_only_stream((0, 1), 0), tick_config()).unwrap_err();
    assert!(matches!(
        err,
        OpenError::InvalidFrameRate {
            numerator: 0,
            denominator: 1
        }
    ));
    let err = open(video_only_stream((25, 0), 0), tick_config()).unwrap_err();
    assert_eq!(err.code(), -6);
}

#[test]
fn test_不支持的像素格式() {
    let err = open(video_only_stream((10, 1), 2), tick_config()).unwrap_err();
    assert!(matches!(err, OpenError::UnsupportedPixelFormat(_)));
    assert_eq!(err.code(), -5);
}

#[test]
fn test_截断的流() {
    let mut data = video_only_stream((10, 1), 0);
    // 只保留 BOS 页面和部分头包页面
    data.truncate(120);
    let err = open(data, tick_config()).unwrap_err();
    assert!(matches!(err, OpenError::TruncatedHeader(_)));
}

#[test]
fn test_停止清空队列并重置时钟() {
    let mut player = open(video_only_stream((10, 1), 0), tick_config()).unwrap();
    player.play().unwrap();
    player.advance(100);
    assert_eq!(player.elapsed_time(), 100);

    player.stop();
    assert!(player.poll_video_frame().is_none());
    assert!(player.poll_audio_fragment().is_none());
    assert_eq!(player.elapsed_time(), 0);
    assert_eq!(player.status().state, SyncState::Stopped);
    assert!(player.play().is_err());
    assert_eq!(player.advance(100), None);
}

#[test]
fn test_音频片段总是满的() {
    let config = PlaybackConfig {
        audio_fragment_bytes: Some(100),
        ..tick_config()
    };
    let mut player = open(av_stream(20), config).unwrap();
    let info = *player.session_info();
    assert!(info.has_audio);
    assert_eq!(info.sample_rate, 8000);
    assert_eq!(info.channels, 1);
    assert_eq!(info.bits_per_sample, 16);

    player.play().unwrap();
    player.set_elapsed_time(0);
    let mut outcome = None;
    for _ in 0..10 {
        outcome = player.advance(100);
        if player.is_end_of_stream() {
            break;
        }
    }
    assert_eq!(outcome, Some(IterationOutcome::EndOfStream));

    let fragments: Vec<_> = std::iter::from_fn(|| player.poll_audio_fragment()).collect();
    // 19 个包 x 32 采样 = 608 采样, 每片 50 采样, 余下的 8 个采样丢弃
    assert_eq!(fragments.len(), 12);
    assert!(fragments.iter().all(|f| f.size_bytes() == 100));
    assert!(
        fragments
            .windows(2)
            .all(|w| w[0].presentation_time_ms < w[1].presentation_time_ms)
    );
    assert_eq!(fragments[0].presentation_time_ms, 0);
    assert!(fragments.iter().all(|f| f.data.iter().all(|&b| b == 0)));

    let frames: Vec<_> = std::iter::from_fn(|| player.poll_video_frame()).collect();
    let times: Vec<i64> = frames.iter().map(|f| f.presentation_time_ms).collect();
    assert_eq!(times, vec![100, 200]);
}

#[test]
fn test_仅音频() {
    let config = PlaybackConfig {
        enable_video: false,
        audio_fragment_bytes: Some(64),
        ..tick_config()
    };
    let mut player = open(av_stream(9), config).unwrap();
    assert!(!player.session_info().has_video);
    player.play().unwrap();
    player.set_elapsed_time(0);
    for _ in 0..10 {
        player.advance(20);
        if player.is_end_of_stream() {
            break;
        }
    }
    assert!(player.is_end_of_stream());
    assert!(player.poll_video_frame().is_none());
    // 8 个包 x 32 采样 / 每片 32 采样
    let count = std::iter::from_fn(|| player.poll_audio_fragment()).count();
    assert_eq!(count, 8);
}

#[test]
fn test_后台线程播放文件() {
    init_logging();
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), video_only_stream((10, 1), 0)).unwrap();

    let mut player = Player::open_file(file.path(), PlaybackConfig::default()).unwrap();
    player.play().unwrap();
    player.set_elapsed_time(100);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut frames = Vec::new();
    while Instant::now() < deadline && frames.len() < 2 {
        if let Some(frame) = player.poll_video_frame() {
            frames.push(frame.presentation_time_ms);
            player.set_elapsed_time(200);
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(frames, vec![100, 200]);

    while Instant::now() < deadline && !player.is_finished() {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(player.is_end_of_stream());
    player.stop();
}
