//! # tao-ogv
//!
//! 纯 Rust 实现的 Ogg/Theora/Vorbis 解码与音视频同步播放核心.
//!
//! - **容器**: Ogg 页面同步, 逻辑流识别与包重组
//! - **解码**: Theora I 视频, Vorbis I 音频
//! - **像素转换**: YUV 4:2:0 到 RGBA
//! - **播放**: 头包组装, 按时钟丢帧/放行, 固定长度 PCM 片段, 线程或时间步驱动
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tao_ogv::playback::{DriveMode, PlaybackConfig, Player};
//!
//! let config = PlaybackConfig {
//!     mode: DriveMode::Tick,
//!     ..PlaybackConfig::default()
//! };
//! let mut player = Player::open_file("movie.ogv", config).unwrap();
//! player.play().unwrap();
//! while !player.is_end_of_stream() {
//!     player.advance(40);
//!     while let Some(frame) = player.poll_video_frame() {
//!         println!("帧 @ {} ms", frame.presentation_time_ms);
//!     }
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `tao-core` | 错误类型, 有理数, 位读写, CRC |
//! | `tao-codec` | Theora / Vorbis 解码器 |
//! | `tao-format` | Ogg 解复用与字节源 |
//! | `tao-scale` | YUV 到 RGBA 转换 |
//! | `tao-playback` | 音视频同步播放 |

/// 核心类型与工具
pub use tao_core as core;

/// Theora / Vorbis 解码器
pub use tao_codec as codec;

/// Ogg 解复用与字节源
pub use tao_format as format;

/// 像素格式转换
pub use tao_scale as scale;

/// 音视频同步播放
pub use tao_playback as playback;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册 Theora 与 Vorbis 解码器的注册表
pub fn default_codec_registry() -> tao_codec::CodecRegistry {
    tao_codec::CodecRegistry::with_defaults()
}
