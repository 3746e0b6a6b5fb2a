//! 像素格式定义.
//!
//! 只覆盖 Theora 能产生的三种平面 YUV 布局以及播放输出使用的 RGBA.

use std::fmt;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// YUV 4:2:0 平面格式, 8 位
    Yuv420p,
    /// YUV 4:2:2 平面格式, 8 位
    Yuv422p,
    /// YUV 4:4:4 平面格式, 8 位
    Yuv444p,
    /// RGBA 各 8 位, 打包
    Rgba,
}

impl PixelFormat {
    /// 色度在水平/垂直方向的降采样位移 (log2)
    pub const fn chroma_shift(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p => (1, 1),
            Self::Yuv422p => (1, 0),
            Self::Yuv444p | Self::Rgba => (0, 0),
        }
    }

    /// 是否为平面格式
    pub const fn is_planar(&self) -> bool {
        !matches!(self, Self::Rgba)
    }

    /// 平面数量
    pub const fn plane_count(&self) -> usize {
        if self.is_planar() { 3 } else { 1 }
    }

    /// 指定平面的宽高 (像素), 奇数尺寸向上取整
    pub fn plane_size(&self, plane: usize, width: u32, height: u32) -> Option<(u32, u32)> {
        if plane >= self.plane_count() {
            return None;
        }
        if plane == 0 {
            return Some((width, height));
        }
        let (sx, sy) = self.chroma_shift();
        Some((
            (width + (1 << sx) - 1) >> sx,
            (height + (1 << sy) - 1) >> sy,
        ))
    }

    /// 按 Theora 标识头中的 2 位像素格式字段映射, 保留值返回 None
    pub const fn from_theora_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Yuv420p),
            2 => Some(Self::Yuv422p),
            3 => Some(Self::Yuv444p),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Rgba => "rgba",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theora_像素格式映射() {
        assert_eq!(PixelFormat::from_theora_code(0), Some(PixelFormat::Yuv420p));
        assert_eq!(PixelFormat::from_theora_code(1), None);
        assert_eq!(PixelFormat::from_theora_code(2), Some(PixelFormat::Yuv422p));
        assert_eq!(PixelFormat::from_theora_code(3), Some(PixelFormat::Yuv444p));
    }

    #[test]
    fn test_平面尺寸() {
        let f = PixelFormat::Yuv420p;
        assert_eq!(f.plane_size(0, 33, 17), Some((33, 17)));
        assert_eq!(f.plane_size(1, 33, 17), Some((17, 9)));
        assert_eq!(f.plane_size(3, 33, 17), None);
        assert_eq!(PixelFormat::Yuv422p.plane_size(2, 32, 16), Some((16, 16)));
        assert_eq!(PixelFormat::Rgba.plane_size(1, 4, 4), None);
    }
}
