//! 音频解码状态.
//!
//! 解码得到的平面 f32 采样先进入待取队列, 再被逐段搬进固定容量的片段,
//! 转换为交织的有符号 16 位小端 PCM. 只有待取队列为空时才解码新包.
//! 片段只有在完全填满后才算就绪, 未填满的片段永远不会输出.

use std::collections::VecDeque;

use log::debug;
use tao_codec::{Decoder, Frame, Packet};
use tao_core::{TaoError, TaoResult};

use crate::output::AudioFragment;

/// f32 采样转换为 s16: `clamp(floor(x * 32767), -32768, 32767)`
#[inline]
pub fn sample_to_s16(x: f32) -> i16 {
    (x * 32767.0).floor().clamp(-32768.0, 32767.0) as i16
}

/// 已解码尚未搬入片段的采样
#[derive(Debug)]
struct PendingPcm {
    samples: Vec<Vec<f32>>,
    offset: usize,
    len: usize,
    /// 第一个采样的位置
    start: i64,
}

impl PendingPcm {
    fn remaining(&self) -> usize {
        self.len - self.offset
    }
}

/// 音频解码状态
pub struct AudioDecoderState {
    decoder: Box<dyn Decoder>,
    sample_rate: u32,
    channels: usize,
    pending: VecDeque<PendingPcm>,
    fragment: Vec<u8>,
    capacity: usize,
    /// 当前片段第一个采样的位置
    fragment_start: Option<i64>,
    /// 下一个解码采样的位置, 解码器未给出位置时使用
    next_position: i64,
}

impl AudioDecoderState {
    /// 片段容量: 指定值或 `blocksize1 * 2`, 向下取整到 `channels * 2` 的倍数
    pub fn fragment_capacity(requested: Option<usize>, blocksize1: u32, channels: u32) -> usize {
        let frame_bytes = channels.max(1) as usize * 2;
        let wanted = requested.unwrap_or(blocksize1 as usize * 2);
        let capacity = wanted - wanted % frame_bytes;
        capacity.max(frame_bytes)
    }

    /// 包装已完成头包解析的解码器
    pub fn new(decoder: Box<dyn Decoder>, sample_rate: u32, channels: u32, capacity: usize) -> Self {
        debug!(
            "音频: {} Hz, {} 声道, 片段 {} 字节",
            sample_rate, channels, capacity
        );
        Self {
            decoder,
            sample_rate,
            channels: channels.max(1) as usize,
            pending: VecDeque::new(),
            fragment: Vec::with_capacity(capacity),
            capacity,
            fragment_start: None,
            next_position: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels as u32
    }

    /// 片段固定字节数
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 是否还有已解码未搬运的采样
    pub fn has_pending_pcm(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_fragment_ready(&self) -> bool {
        self.fragment.len() == self.capacity
    }

    /// 就绪片段的时间 (毫秒)
    pub fn fragment_time_ms(&self) -> Option<i64> {
        if !self.is_fragment_ready() {
            return None;
        }
        self.fragment_start.map(|s| self.position_to_ms(s))
    }

    fn position_to_ms(&self, position: i64) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (i128::from(position) * 1000 / i128::from(self.sample_rate)) as i64
    }

    /// 把待取采样搬进片段, 返回片段是否已满
    pub fn fill(&mut self) -> bool {
        let frame_bytes = self.channels * 2;
        while !self.is_fragment_ready() {
            let Some(pcm) = self.pending.front_mut() else {
                break;
            };
            if self.fragment_start.is_none() {
                self.fragment_start = Some(pcm.start + pcm.offset as i64);
            }
            let room = (self.capacity - self.fragment.len()) / frame_bytes;
            let n = room.min(pcm.remaining());
            for i in pcm.offset..pcm.offset + n {
                for ch in 0..self.channels {
                    let s = pcm.samples.get(ch).and_then(|c| c.get(i)).copied().unwrap_or(0.0);
                    self.fragment.extend_from_slice(&sample_to_s16(s).to_le_bytes());
                }
            }
            pcm.offset += n;
            if pcm.remaining() == 0 {
                self.pending.pop_front();
            }
        }
        self.is_fragment_ready()
    }

    /// 解码一个数据包, 结果进入待取队列
    pub fn decode_packet(&mut self, packet: &Packet) -> TaoResult<()> {
        self.decoder.send_packet(packet)?;
        loop {
            let frame = match self.decoder.receive_frame() {
                Ok(Frame::Audio(frame)) => frame,
                Ok(Frame::Video(_)) => {
                    return Err(TaoError::Internal("音频解码器输出了视频帧".into()));
                }
                Err(TaoError::NeedMoreData) => return Ok(()),
                Err(e) => return Err(e),
            };
            if frame.nb_samples == 0 {
                continue;
            }
            let start = frame.pts.unwrap_or(self.next_position);
            self.next_position = start + frame.nb_samples as i64;
            self.pending.push_back(PendingPcm {
                len: frame.nb_samples,
                samples: frame.samples,
                offset: 0,
                start,
            });
        }
    }

    /// 取出已满的片段
    pub fn take_fragment(&mut self) -> Option<AudioFragment> {
        let presentation_time_ms = self.fragment_time_ms()?;
        self.fragment_start = None;
        let data = std::mem::replace(&mut self.fragment, Vec::with_capacity(self.capacity));
        Some(AudioFragment {
            data,
            presentation_time_ms,
        })
    }

    /// 清空所有采样与重叠状态
    pub fn reset(&mut self) {
        self.decoder.flush();
        self.pending.clear();
        self.fragment.clear();
        self.fragment_start = None;
        self.next_position = 0;
    }
}

impl std::fmt::Debug for AudioDecoderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDecoderState")
            .field("codec", &self.decoder.name())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("capacity", &self.capacity)
            .field("filled", &self.fragment.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeAudio;

    fn state(capacity: usize) -> AudioDecoderState {
        AudioDecoderState::new(FakeAudio::boxed(), 1000, 2, capacity)
    }

    #[test]
    fn test_采样转换() {
        assert_eq!(sample_to_s16(0.0), 0);
        assert_eq!(sample_to_s16(1.0), 32767);
        assert_eq!(sample_to_s16(2.0), 32767);
        assert_eq!(sample_to_s16(-1.0), -32767);
        assert_eq!(sample_to_s16(-2.0), -32768);
        // floor 而不是四舍五入
        assert_eq!(sample_to_s16(0.5), 16383);
        assert_eq!(sample_to_s16(-0.5), -16384);
    }

    #[test]
    fn test_片段容量() {
        assert_eq!(AudioDecoderState::fragment_capacity(None, 2048, 2), 4096);
        assert_eq!(AudioDecoderState::fragment_capacity(Some(1001), 2048, 2), 1000);
        assert_eq!(AudioDecoderState::fragment_capacity(Some(1000), 2048, 3), 996);
        assert_eq!(AudioDecoderState::fragment_capacity(Some(1), 2048, 2), 4);
    }

    #[test]
    fn test_只输出满片段() {
        // 4 个立体声采样 = 16 字节
        let mut a = state(16);
        a.decode_packet(&Packet::from_data(vec![50u8; 3]).with_granule(0)).unwrap();
        assert!(!a.fill());
        assert!(!a.has_pending_pcm());
        assert!(a.take_fragment().is_none());

        a.decode_packet(&Packet::from_data(vec![100u8; 3])).unwrap();
        assert!(a.fill());
        assert!(a.has_pending_pcm());
        let frag = a.take_fragment().unwrap();
        assert_eq!(frag.size_bytes(), 16);
        assert_eq!(frag.presentation_time_ms, 0);
        // 交织: L, R
        assert_eq!(&frag.data[..4], &[0xFF, 0x3F, 0x00, 0xC0]);
        // 第 4 个采样来自第二个包 (1.0)
        let mut last = Vec::new();
        last.extend_from_slice(&32767i16.to_le_bytes());
        last.extend_from_slice(&(-32767i16).to_le_bytes());
        assert_eq!(&frag.data[12..16], &last[..]);

        // 剩余 2 个采样从位置 4 开始
        assert!(!a.fill());
        a.decode_packet(&Packet::from_data(vec![0u8; 2])).unwrap();
        assert!(a.fill());
        let frag = a.take_fragment().unwrap();
        assert_eq!(frag.size_bytes(), 16);
        assert_eq!(frag.presentation_time_ms, 4);
    }

    #[test]
    fn test_片段时间使用解码器位置() {
        let mut a = state(8);
        a.decode_packet(&Packet::from_data(vec![0u8; 2]).with_granule(500)).unwrap();
        assert!(a.fill());
        assert_eq!(a.fragment_time_ms(), Some(500));
    }

    #[test]
    fn test_reset() {
        let mut a = state(8);
        a.decode_packet(&Packet::from_data(vec![0u8; 5])).unwrap();
        a.fill();
        a.reset();
        assert!(!a.has_pending_pcm());
        assert!(!a.is_fragment_ready());
        assert_eq!(a.fragment_time_ms(), None);
    }
}
