//! 解码器实现模块.

pub mod theora;
pub mod vorbis;

use crate::codec_id::CodecId;
use crate::registry::CodecRegistry;

/// 注册所有内置解码器
pub fn register_all_decoders(registry: &mut CodecRegistry) {
    registry.register_decoder(CodecId::Theora, "theora", theora::TheoraDecoder::create);
    registry.register_decoder(CodecId::Vorbis, "vorbis", vorbis::VorbisDecoder::create);
}

/// 根据逻辑流的第一个包判断编解码器
///
/// 只有能被完整解析的 identification 头包才算识别成功.
pub fn probe_ogg_header(packet: &[u8]) -> CodecId {
    if theora::parse_identification(packet).is_ok() {
        CodecId::Theora
    } else if vorbis::parse_identification(packet).is_ok() {
        CodecId::Vorbis
    } else {
        CodecId::None
    }
}
