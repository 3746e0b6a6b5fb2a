//! 打开会话时的错误类型.
//!
//! 打开阶段的错误都是致命的, 会话不会开始, 也不会重试.
//! 每种错误对应一个固定的数值错误码, 便于调用方记录具体原因.

use std::path::PathBuf;

use tao_codec::CodecId;
use tao_core::{PixelFormat, TaoError};
use thiserror::Error;

/// 打开会话失败的原因
#[derive(Debug, Error)]
pub enum OpenError {
    /// 无法打开输入文件
    #[error("无法打开文件 {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 已识别流的头包解析失败
    #[error("{codec} 头包损坏: {source}")]
    CorruptHeader {
        codec: CodecId,
        #[source]
        source: TaoError,
    },

    /// 字节源在所有头包到达之前耗尽 (或长时间没有数据)
    #[error("头包不完整: {0}")]
    TruncatedHeader(String),

    /// 输出端只支持 4:2:0
    #[error("不支持的像素格式 {0:?}, 仅支持 4:2:0")]
    UnsupportedPixelFormat(PixelFormat),

    /// 帧率分子或分母为 0
    #[error("无效的帧率 {numerator}/{denominator}")]
    InvalidFrameRate { numerator: u32, denominator: u32 },

    /// 字节源中没有 Theora 或 Vorbis 逻辑流
    #[error("未找到 Theora 或 Vorbis 逻辑流")]
    NoStreamFound,

    /// 读取字节源失败
    #[error("读取字节源失败: {0}")]
    Read(#[source] TaoError),

    /// 播放配置不合法
    #[error("播放配置无效: {0}")]
    InvalidConfig(#[source] TaoError),
}

impl OpenError {
    /// 数值错误码, 各种错误互不相同
    pub fn code(&self) -> i32 {
        match self {
            Self::FileOpen { .. } => -1,
            Self::CorruptHeader {
                codec: CodecId::Vorbis,
                ..
            } => -3,
            Self::CorruptHeader { .. } => -2,
            Self::TruncatedHeader(_) => -4,
            Self::UnsupportedPixelFormat(_) => -5,
            Self::InvalidFrameRate { .. } => -6,
            Self::NoStreamFound => -7,
            Self::Read(_) => -8,
            Self::InvalidConfig(_) => -9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_错误码互不相同() {
        let errors = [
            OpenError::FileOpen {
                path: PathBuf::from("a.ogv"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
            OpenError::CorruptHeader {
                codec: CodecId::Theora,
                source: TaoError::InvalidData("x".into()),
            },
            OpenError::CorruptHeader {
                codec: CodecId::Vorbis,
                source: TaoError::InvalidData("x".into()),
            },
            OpenError::TruncatedHeader("eof".into()),
            OpenError::UnsupportedPixelFormat(PixelFormat::Yuv444p),
            OpenError::InvalidFrameRate {
                numerator: 25,
                denominator: 0,
            },
            OpenError::NoStreamFound,
            OpenError::Read(TaoError::Eof),
            OpenError::InvalidConfig(TaoError::InvalidArgument("x".into())),
        ];
        let codes: Vec<i32> = errors.iter().map(OpenError::code).collect();
        assert_eq!(codes, vec![-1, -2, -3, -4, -5, -6, -7, -8, -9]);
    }

    #[test]
    fn test_错误信息() {
        let err = OpenError::CorruptHeader {
            codec: CodecId::Vorbis,
            source: TaoError::InvalidData("setup 截断".into()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("vorbis 头包损坏"));
        assert!(msg.contains("setup 截断"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
