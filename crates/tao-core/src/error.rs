//! 统一错误类型定义.
//!
//! 解复用、解码与播放各层共用的错误类型, 支持跨 crate 传播.

use thiserror::Error;

/// 统一错误类型
#[derive(Debug, Error)]
pub enum TaoError {
    /// 无效参数, 通常是调用顺序错误 (例如头包未就绪时送入数据包)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 码流合法但当前实现不支持
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// 容器格式错误
    #[error("格式错误: {0}")]
    Format(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl TaoError {
    /// 是否为"数据暂缺"类错误, 调用方可在补充输入后重试
    pub fn is_starvation(&self) -> bool {
        matches!(self, Self::NeedMoreData)
    }
}

/// 统一 Result 类型
pub type TaoResult<T> = Result<T, TaoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_错误自动转换() {
        fn open() -> TaoResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))?;
            Ok(())
        }
        match open() {
            Err(TaoError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("期望 Io 错误, 实际: {other:?}"),
        }
    }

    #[test]
    fn test_数据暂缺判定() {
        assert!(TaoError::NeedMoreData.is_starvation());
        assert!(!TaoError::Eof.is_starvation());
        assert!(!TaoError::InvalidData("x".into()).is_starvation());
    }
}
