//! 解码后的帧数据 (Frame).

use tao_core::PixelFormat;

/// 视频帧
///
/// 平面 YUV 数据, 行序自上而下, 已裁剪到图像区域.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 各平面的像素数据 (Y, U, V)
    pub data: Vec<Vec<u8>>,
    /// 各平面每行的字节数
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 本帧的粒度位置
    pub granule: i64,
    /// 是否为关键帧 (帧内编码)
    pub is_keyframe: bool,
}

impl VideoFrame {
    /// 创建指定尺寸的空帧, 各平面按像素格式分配并填 0
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let mut data = Vec::with_capacity(pixel_format.plane_count());
        let mut linesize = Vec::with_capacity(pixel_format.plane_count());
        for plane in 0..pixel_format.plane_count() {
            let (w, h) = pixel_format.plane_size(plane, width, height).unwrap_or((0, 0));
            data.push(vec![0u8; w as usize * h as usize]);
            linesize.push(w as usize);
        }
        Self {
            data,
            linesize,
            width,
            height,
            pixel_format,
            granule: -1,
            is_keyframe: false,
        }
    }
}

/// 音频帧
///
/// 平面 f32 采样, 每声道一个 Vec, 取值范围约为 [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// 每声道采样
    pub samples: Vec<Vec<f32>>,
    /// 每声道采样数
    pub nb_samples: usize,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 本帧第一个采样的位置 (以采样为单位), 未知时为 None
    pub pts: Option<i64>,
}

impl AudioFrame {
    /// 声道数
    pub fn channels(&self) -> usize {
        self.samples.len()
    }
}

/// 帧 (视频帧或音频帧的统一包装)
#[derive(Debug, Clone)]
pub enum Frame {
    /// 视频帧
    Video(VideoFrame),
    /// 音频帧
    Audio(AudioFrame),
}
