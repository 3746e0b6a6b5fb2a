//! Ogg 容器解复用器.
//!
//! 字节由调用方推入 (`submit`), 解复用器负责页面同步、按 serial 路由页面,
//! 以及启动阶段的流识别: 逐个检查 BOS 页面, 用临时的逻辑流状态取出第一个包,
//! 能完整解析为 Theora identification 头包的是视频流, 能解析为 Vorbis 的是音频流.
//! 每种媒体类型只接受第一个识别到的流, 其余一律忽略.

mod page;
mod stream;

use std::collections::HashMap;

use log::{debug, info, warn};
use tao_codec::{Packet, probe_ogg_header};

pub use self::page::{OggPage, OggSync, PageFlags};
pub use self::stream::OggStreamState;

#[cfg(test)]
pub(crate) use self::page::build_page;

/// 每个 serial 对应的逻辑流分类
#[derive(Debug)]
pub enum StreamSlot {
    /// BOS 页面尚未给出完整的第一个包
    Unclassified(OggStreamState),
    Video(OggStreamState),
    Audio(OggStreamState),
    /// 未知编解码器, 或同类型的第二个流
    Ignored,
}

/// 流识别进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// 仍在 BOS 页面区域, 需要更多字节
    NeedMoreData,
    /// 已遇到第一个非 BOS 页面
    Complete,
}

/// Ogg 解复用器
#[derive(Debug, Default)]
pub struct OggDemuxer {
    sync: OggSync,
    slots: HashMap<u32, StreamSlot>,
    video_serial: Option<u32>,
    audio_serial: Option<u32>,
    scan_complete: bool,
}

impl OggDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加原始字节
    pub fn submit(&mut self, data: &[u8]) {
        self.sync.submit(data);
    }

    /// 识别逻辑流
    ///
    /// 消费 BOS 页面直到遇到第一个非 BOS 页面, 该页面会被路由到它所属的流.
    pub fn scan_headers(&mut self) -> ScanStatus {
        if self.scan_complete {
            return ScanStatus::Complete;
        }
        while let Some(page) = self.sync.next_page() {
            if page.is_bos() {
                self.open_stream(&page);
                continue;
            }
            self.scan_complete = true;
            info!(
                "Ogg 流识别完成: 视频={:?}, 音频={:?}",
                self.video_serial, self.audio_serial
            );
            self.route_page(&page);
            return ScanStatus::Complete;
        }
        ScanStatus::NeedMoreData
    }

    /// 把缓存中所有完整页面路由到各自的流, 返回处理的页面数
    ///
    /// 流识别尚未完成时先继续识别.
    pub fn pump(&mut self) -> usize {
        let mut routed = 0;
        if !self.scan_complete {
            if self.scan_headers() == ScanStatus::NeedMoreData {
                return 0;
            }
            routed += 1;
        }
        while let Some(page) = self.sync.next_page() {
            self.route_page(&page);
            routed += 1;
        }
        routed
    }

    fn open_stream(&mut self, page: &OggPage) {
        if self.slots.contains_key(&page.serial) {
            warn!("Ogg: 重复的 BOS 页面 serial=0x{:08X}, 已忽略", page.serial);
            return;
        }
        let mut state = OggStreamState::new(page.serial);
        if let Err(e) = state.pagein(page) {
            warn!("Ogg: BOS 页面无法送入逻辑流: {}", e);
            self.slots.insert(page.serial, StreamSlot::Ignored);
            return;
        }
        let slot = self.classify(state);
        self.slots.insert(page.serial, slot);
    }

    /// 用第一个包判断流的类型
    fn classify(&mut self, state: OggStreamState) -> StreamSlot {
        let serial = state.serial();
        let Some(first) = state.peek_packet() else {
            return StreamSlot::Unclassified(state);
        };
        let codec = probe_ogg_header(&first.data);
        if codec.is_video() && self.video_serial.is_none() {
            debug!("Ogg: serial=0x{:08X} 识别为 {} 视频流", serial, codec);
            self.video_serial = Some(serial);
            StreamSlot::Video(state)
        } else if codec.is_audio() && self.audio_serial.is_none() {
            debug!("Ogg: serial=0x{:08X} 识别为 {} 音频流", serial, codec);
            self.audio_serial = Some(serial);
            StreamSlot::Audio(state)
        } else {
            debug!("Ogg: 忽略 serial=0x{:08X} ({})", serial, codec);
            StreamSlot::Ignored
        }
    }

    fn route_page(&mut self, page: &OggPage) {
        let Some(slot) = self.slots.remove(&page.serial) else {
            if page.is_bos() {
                debug!("Ogg: 识别结束后出现新的逻辑流 0x{:08X}, 已忽略", page.serial);
                self.slots.insert(page.serial, StreamSlot::Ignored);
            }
            return;
        };
        let slot = match slot {
            StreamSlot::Unclassified(mut state) => {
                if let Err(e) = state.pagein(page) {
                    warn!("Ogg: 页面路由失败: {}", e);
                }
                self.classify(state)
            }
            StreamSlot::Video(mut state) => {
                if let Err(e) = state.pagein(page) {
                    warn!("Ogg: 页面路由失败: {}", e);
                }
                StreamSlot::Video(state)
            }
            StreamSlot::Audio(mut state) => {
                if let Err(e) = state.pagein(page) {
                    warn!("Ogg: 页面路由失败: {}", e);
                }
                StreamSlot::Audio(state)
            }
            StreamSlot::Ignored => StreamSlot::Ignored,
        };
        self.slots.insert(page.serial, slot);
    }

    fn video_state(&mut self) -> Option<&mut OggStreamState> {
        match self.slots.get_mut(&self.video_serial?) {
            Some(StreamSlot::Video(state)) => Some(state),
            _ => None,
        }
    }

    fn audio_state(&mut self) -> Option<&mut OggStreamState> {
        match self.slots.get_mut(&self.audio_serial?) {
            Some(StreamSlot::Audio(state)) => Some(state),
            _ => None,
        }
    }

    /// 取出视频流的下一个包
    pub fn video_packet(&mut self) -> Option<Packet> {
        self.video_state()?.next_packet()
    }

    /// 取出音频流的下一个包
    pub fn audio_packet(&mut self) -> Option<Packet> {
        self.audio_state()?.next_packet()
    }

    /// 视频流中等待取出的包数量
    pub fn video_packets_pending(&mut self) -> usize {
        self.video_state().map_or(0, |s| s.packets_pending())
    }

    /// 音频流中等待取出的包数量
    pub fn audio_packets_pending(&mut self) -> usize {
        self.audio_state().map_or(0, |s| s.packets_pending())
    }

    pub fn has_video(&self) -> bool {
        self.video_serial.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_serial.is_some()
    }

    /// 已识别的视频流 serial
    pub fn video_serial(&self) -> Option<u32> {
        self.video_serial
    }

    /// 已识别的音频流 serial
    pub fn audio_serial(&self) -> Option<u32> {
        self.audio_serial
    }

    /// 流识别是否已结束
    pub fn is_scan_complete(&self) -> bool {
        self.scan_complete
    }

    /// 页面同步器中尚未组成页面的字节数
    pub fn buffered_bytes(&self) -> usize {
        self.sync.buffered()
    }

    /// 丢弃缓存字节和所有流的重组状态, 保留流识别结果
    pub fn reset(&mut self) {
        self.sync.reset();
        for slot in self.slots.values_mut() {
            match slot {
                StreamSlot::Unclassified(s) | StreamSlot::Video(s) | StreamSlot::Audio(s) => {
                    s.reset()
                }
                StreamSlot::Ignored => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 能通过 Vorbis identification 解析的最小头包
    fn vorbis_ident() -> Vec<u8> {
        let mut v = vec![0x01];
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(2);
        v.extend_from_slice(&44100u32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.extend_from_slice(&128000i32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.push(0xB8);
        v.push(1);
        v
    }

    fn feed(demux: &mut OggDemuxer, pages: &[Vec<u8>]) {
        for p in pages {
            demux.submit(p);
        }
    }

    #[test]
    fn test_识别音频流并路由数据页() {
        let mut demux = OggDemuxer::new();
        feed(
            &mut demux,
            &[
                build_page(PageFlags::BOS, 0, 0xA, 0, &[&vorbis_ident()], false),
                build_page(PageFlags::empty(), 0, 0xA, 1, &[b"\x03comment"], false),
            ],
        );
        assert_eq!(demux.scan_headers(), ScanStatus::Complete);
        assert!(demux.has_audio());
        assert!(!demux.has_video());
        assert_eq!(demux.audio_serial(), Some(0xA));
        assert_eq!(demux.audio_packets_pending(), 2);
        assert_eq!(demux.audio_packet().unwrap().data[0], 0x01);
        assert_eq!(demux.audio_packet().unwrap().data[0], 0x03);
        assert!(demux.video_packet().is_none());
    }

    #[test]
    fn test_未知流与重复流被忽略() {
        let mut demux = OggDemuxer::new();
        feed(
            &mut demux,
            &[
                build_page(PageFlags::BOS, 0, 1, 0, &[b"OpusHead\x01\x02"], false),
                build_page(PageFlags::BOS, 0, 2, 0, &[&vorbis_ident()], false),
                build_page(PageFlags::BOS, 0, 3, 0, &[&vorbis_ident()], false),
                build_page(PageFlags::empty(), 0, 3, 1, &[b"x"], false),
                build_page(PageFlags::empty(), 0, 1, 1, &[b"y"], false),
                build_page(PageFlags::empty(), 0, 2, 1, &[b"z"], false),
            ],
        );
        assert_eq!(demux.scan_headers(), ScanStatus::Complete);
        assert_eq!(demux.audio_serial(), Some(2));
        assert!(matches!(demux.slots.get(&1), Some(StreamSlot::Ignored)));
        assert!(matches!(demux.slots.get(&3), Some(StreamSlot::Ignored)));
        assert_eq!(demux.pump(), 2);
        assert_eq!(demux.audio_packets_pending(), 2);
        demux.audio_packet();
        assert_eq!(&demux.audio_packet().unwrap().data[..], b"z");
    }

    #[test]
    fn test_字节不足时等待() {
        let page = build_page(PageFlags::BOS, 0, 9, 0, &[&vorbis_ident()], false);
        let mut demux = OggDemuxer::new();
        demux.submit(&page[..20]);
        assert_eq!(demux.scan_headers(), ScanStatus::NeedMoreData);
        assert_eq!(demux.pump(), 0);
        demux.submit(&page[20..]);
        assert_eq!(demux.scan_headers(), ScanStatus::NeedMoreData);
        assert!(demux.has_audio());
        assert!(!demux.is_scan_complete());
    }

    #[test]
    fn test_没有可识别的流() {
        let mut demux = OggDemuxer::new();
        feed(
            &mut demux,
            &[
                build_page(PageFlags::BOS, 0, 1, 0, &[b"\x01vorbis-bad"], false),
                build_page(PageFlags::empty(), 0, 1, 1, &[b"data"], false),
            ],
        );
        assert_eq!(demux.scan_headers(), ScanStatus::Complete);
        assert!(!demux.has_audio());
        assert!(!demux.has_video());
    }

    #[test]
    fn test_reset_保留识别结果() {
        let mut demux = OggDemuxer::new();
        feed(
            &mut demux,
            &[
                build_page(PageFlags::BOS, 0, 4, 0, &[&vorbis_ident()], false),
                build_page(PageFlags::empty(), 0, 4, 1, &[b"a"], false),
            ],
        );
        demux.scan_headers();
        demux.submit(b"OggS");
        demux.reset();
        assert_eq!(demux.buffered_bytes(), 0);
        assert_eq!(demux.audio_packets_pending(), 0);
        assert!(demux.has_audio());
    }
}
