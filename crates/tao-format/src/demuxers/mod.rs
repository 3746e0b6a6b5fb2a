//! 解复用器实现模块.

pub mod ogg;
