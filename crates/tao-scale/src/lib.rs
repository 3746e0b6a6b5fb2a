//! # tao-scale
//!
//! 像素格式转换库: 把解码得到的 4:2:0 平面 YUV 转换为显示用的交织 RGBA.

pub mod convert;

pub use convert::{YuvPlanes, yuv_to_rgba, yuv420p_to_rgba, yuv420p_to_rgba_into};
