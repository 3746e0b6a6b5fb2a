//! 像素格式转换模块.
//!
//! 把 4:2:0 平面 YUV 转换为交织 RGBA. 每个 2x2 亮度块共享一对色度采样,
//! 四个亮度采样各自独立换算:
//! ```text
//! u = Cb - 128, v = Cr - 128
//! R = Y + (1.402 * v)
//! G = Y - (0.344 * u + 0.714 * v)
//! B = Y + (1.772 * u)
//! ```
//! 乘积向零取整后相加, 各通道截断到 [0, 255], alpha 固定为 255.
//! 转换无状态, 按行并行, 多次调用结果逐字节一致.

use rayon::prelude::*;
use tao_core::{PixelFormat, TaoError, TaoResult};

/// 4:2:0 平面 YUV 输入
#[derive(Debug, Clone, Copy)]
pub struct YuvPlanes<'a> {
    /// 亮度平面
    pub y: &'a [u8],
    /// Cb 平面
    pub u: &'a [u8],
    /// Cr 平面
    pub v: &'a [u8],
    /// 各平面行字节数 (Y, U, V)
    pub strides: [usize; 3],
    /// 亮度宽度 (像素)
    pub width: u32,
    /// 亮度高度 (像素)
    pub height: u32,
}

impl<'a> YuvPlanes<'a> {
    /// 按紧凑排列 (行字节数等于平面宽度) 构造
    pub fn packed(y: &'a [u8], u: &'a [u8], v: &'a [u8], width: u32, height: u32) -> Self {
        let chroma_width = width.div_ceil(2) as usize;
        Self {
            y,
            u,
            v,
            strides: [width as usize, chroma_width, chroma_width],
            width,
            height,
        }
    }

    fn validate(&self) -> TaoResult<()> {
        let w = self.width as usize;
        let h = self.height as usize;
        if w == 0 || h == 0 {
            return Err(TaoError::InvalidArgument("图像尺寸不能为 0".into()));
        }
        let (cw, ch) = match PixelFormat::Yuv420p.plane_size(1, self.width, self.height) {
            Some((cw, ch)) => (cw as usize, ch as usize),
            None => return Err(TaoError::Internal("Yuv420p 缺少色度平面".into())),
        };
        let planes = [
            ("Y", self.y, self.strides[0], w, h),
            ("U", self.u, self.strides[1], cw, ch),
            ("V", self.v, self.strides[2], cw, ch),
        ];
        for (name, data, stride, pw, ph) in planes {
            if stride < pw {
                return Err(TaoError::InvalidArgument(format!(
                    "{} 平面行字节数 {} 小于宽度 {}",
                    name, stride, pw
                )));
            }
            let need = (ph - 1) * stride + pw;
            if data.len() < need {
                return Err(TaoError::InvalidArgument(format!(
                    "{} 平面数据不足: 需要 {} 字节, 实际 {} 字节",
                    name,
                    need,
                    data.len()
                )));
            }
        }
        Ok(())
    }
}

/// 单个像素的 YCbCr → RGBA
#[inline]
pub fn yuv_to_rgba(y: u8, cb: u8, cr: u8) -> [u8; 4] {
    let y = i32::from(y);
    let u = f32::from(cb) - 128.0;
    let v = f32::from(cr) - 128.0;
    let r = y + (1.402 * v) as i32;
    let g = y - (0.344 * u + 0.714 * v) as i32;
    let b = y + (1.772 * u) as i32;
    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
        255,
    ]
}

/// YUV420P → RGBA, 返回 `width * height * 4` 字节
pub fn yuv420p_to_rgba(src: &YuvPlanes<'_>) -> TaoResult<Vec<u8>> {
    let mut out = vec![0u8; src.width as usize * src.height as usize * 4];
    yuv420p_to_rgba_into(src, &mut out)?;
    Ok(out)
}

/// YUV420P → RGBA, 写入调用方提供的缓冲区
pub fn yuv420p_to_rgba_into(src: &YuvPlanes<'_>, dst: &mut [u8]) -> TaoResult<()> {
    src.validate()?;
    let w = src.width as usize;
    let h = src.height as usize;
    if dst.len() < w * h * 4 {
        return Err(TaoError::InvalidArgument(format!(
            "RGBA 输出缓冲区不足: 需要 {} 字节, 实际 {} 字节",
            w * h * 4,
            dst.len()
        )));
    }

    let [y_stride, u_stride, v_stride] = src.strides;
    dst[..w * h * 4]
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(row, line)| {
            let y_row = &src.y[row * y_stride..row * y_stride + w];
            let u_row = &src.u[(row / 2) * u_stride..];
            let v_row = &src.v[(row / 2) * v_stride..];
            for (col, (px, &y)) in line.chunks_exact_mut(4).zip(y_row).enumerate() {
                px.copy_from_slice(&yuv_to_rgba(y, u_row[col / 2], v_row[col / 2]));
            }
        });
    Ok(())
}
