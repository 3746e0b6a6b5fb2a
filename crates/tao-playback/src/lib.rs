//! # tao-playback
//!
//! 音视频同步播放核心.
//!
//! 管线: 字节源 -> Ogg 解复用 -> 头包组装 -> Theora / Vorbis 解码
//! -> RGBA 转换 -> 同步器 -> 输出队列 -> 调用方.
//!
//! 同一套 [`DecodeDriver`] 既可以在后台线程中循环运行 ([`ThreadedRunner`]),
//! 也可以由调用方在每个时间步驱动一次 ([`Player::advance`]).
//!
//! ```rust,no_run
//! use tao_playback::{PlaybackConfig, Player};
//!
//! let mut player = Player::open_file("movie.ogv", PlaybackConfig::default()).unwrap();
//! player.play().unwrap();
//! player.advance(40);
//! while let Some(frame) = player.poll_video_frame() {
//!     println!("{}x{} @ {} ms", frame.width, frame.height, frame.presentation_time_ms);
//! }
//! ```

pub mod audio;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod headers;
pub mod output;
pub mod player;
pub mod queue;
mod reader;
pub mod runner;
pub mod status;
pub mod sync;
pub mod video;

#[cfg(test)]
mod testutil;

pub use audio::AudioDecoderState;
pub use clock::PlaybackClock;
pub use config::{DriveMode, PlaybackConfig};
pub use driver::{DecodeDriver, IterationOutcome};
pub use error::OpenError;
pub use headers::{AssembledStreams, assemble_headers};
pub use output::{AudioFragment, AvSessionInfo, VideoFrame};
pub use player::Player;
pub use queue::OutputQueue;
pub use runner::ThreadedRunner;
pub use status::{PlaybackStatus, SharedStatus};
pub use sync::{AudioDecision, SyncState, Synchronizer, VideoDecision};
pub use video::{DecodedPicture, VideoDecoderState};
