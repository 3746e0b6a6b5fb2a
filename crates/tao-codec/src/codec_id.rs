//! 编解码器标识符.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// Theora 视频
    Theora,
    /// Vorbis 音频
    Vorbis,
}

impl CodecId {
    /// 是否为视频编解码器
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Theora)
    }

    /// 是否为音频编解码器
    pub const fn is_audio(&self) -> bool {
        matches!(self, Self::Vorbis)
    }

    /// 编解码器名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Theora => "theora",
            Self::Vorbis => "vorbis",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
