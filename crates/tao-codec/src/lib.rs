//! # tao-codec
//!
//! Ogg 承载的编解码器库, 提供 Packet/Frame 抽象与 Theora / Vorbis 解码器.
//!
//! ## 使用示例
//!
//! ```rust
//! use tao_codec::{CodecId, CodecRegistry};
//!
//! let reg = CodecRegistry::with_defaults();
//! let decoder = reg.create_decoder(CodecId::Theora).unwrap();
//! assert!(!decoder.headers_ready());
//!
//! // 通过第一个头包识别编解码器
//! assert_eq!(tao_codec::probe_ogg_header(b"\x01vorbis"), CodecId::None);
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType, VideoCodecParams};
pub use decoder::Decoder;
pub use decoders::probe_ogg_header;
pub use frame::{AudioFrame, Frame, VideoFrame};
pub use packet::Packet;
pub use registry::CodecRegistry;
