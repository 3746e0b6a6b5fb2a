//! 解码器注册表.
//!
//! 按 CodecId 查找并实例化解码器, 上层只依赖 `dyn Decoder`.

use std::collections::HashMap;

use tao_core::{TaoError, TaoResult};

use crate::codec_id::CodecId;
use crate::decoder::Decoder;

/// 解码器工厂函数类型
pub type DecoderFactory = fn() -> TaoResult<Box<dyn Decoder>>;

/// 解码器注册条目
struct DecoderEntry {
    /// 解码器名称
    name: String,
    /// 工厂函数
    factory: DecoderFactory,
}

/// 解码器注册表
#[derive(Default)]
pub struct CodecRegistry {
    decoders: HashMap<CodecId, Vec<DecoderEntry>>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建已注册全部内置解码器的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::decoders::register_all_decoders(&mut registry);
        registry
    }

    /// 注册一个解码器, 同一 CodecId 先注册者优先
    pub fn register_decoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: DecoderFactory,
    ) {
        self.decoders
            .entry(codec_id)
            .or_default()
            .push(DecoderEntry {
                name: name.into(),
                factory,
            });
    }

    /// 创建指定编解码器 ID 的解码器实例
    pub fn create_decoder(&self, codec_id: CodecId) -> TaoResult<Box<dyn Decoder>> {
        let entry = self
            .decoders
            .get(&codec_id)
            .and_then(|entries| entries.first())
            .ok_or_else(|| TaoError::Unsupported(format!("未找到 {codec_id} 的解码器")))?;
        (entry.factory)()
    }

    /// 获取所有已注册的解码器名称
    pub fn list_decoders(&self) -> Vec<(CodecId, &str)> {
        let mut result = Vec::new();
        for (id, entries) in &self.decoders {
            for entry in entries {
                result.push((*id, entry.name.as_str()));
            }
        }
        result.sort_by_key(|(_, name)| *name);
        result
    }
}
