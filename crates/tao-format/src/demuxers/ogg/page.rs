//! Ogg 页面捕获.
//!
//! # 页面结构
//! ```text
//! Capture pattern: "OggS" (4 bytes)
//! Version:         1 byte (always 0)
//! Header type:     1 byte (flags: continued=0x01, BOS=0x02, EOS=0x04)
//! Granule pos:     8 bytes (little-endian, codec-specific)
//! Serial number:   4 bytes (identifies logical stream)
//! Page seq no:     4 bytes
//! CRC checksum:    4 bytes
//! Num segments:    1 byte
//! Segment table:   N bytes (lacing values)
//! Page data:       sum(segment_table) bytes
//! ```
//!
//! `OggSync` 是推模式的: 调用方通过 `submit` 追加任意大小的字节块,
//! 再用 `next_page` 逐个取出完整且 CRC 正确的页面.

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, warn};
use tao_core::crc::ogg_crc32_update;

/// Ogg 同步字 (capture pattern)
pub const OGG_CAPTURE: &[u8; 4] = b"OggS";

/// 页头固定部分长度 (不含段表)
pub const PAGE_HEADER_SIZE: usize = 27;

bitflags! {
    /// 页面头部标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// 首个片段延续上一页的包
        const CONTINUED = 0x01;
        /// 逻辑流的第一页
        const BOS = 0x02;
        /// 逻辑流的最后一页
        const EOS = 0x04;
    }
}

/// CRC 字段在页头中的偏移
const CRC_OFFSET: usize = 22;

/// 已校验的 Ogg 页面
#[derive(Debug, Clone)]
pub struct OggPage {
    /// 头部标志
    pub flags: PageFlags,
    /// 粒度位置, -1 表示本页没有包结束
    pub granule_position: i64,
    /// 逻辑流序列号
    pub serial: u32,
    /// 页面序号
    pub sequence: u32,
    /// 段表 (lacing values)
    pub segment_table: Vec<u8>,
    /// 页面数据
    pub body: Bytes,
}

impl OggPage {
    /// 是否为 BOS (beginning of stream) 页面
    pub fn is_bos(&self) -> bool {
        self.flags.contains(PageFlags::BOS)
    }

    /// 是否为 EOS (end of stream) 页面
    pub fn is_eos(&self) -> bool {
        self.flags.contains(PageFlags::EOS)
    }

    /// 首个片段是否延续上一页未完成的包
    pub fn is_continued(&self) -> bool {
        self.flags.contains(PageFlags::CONTINUED)
    }

    /// 粒度位置 (负值视为缺失)
    pub fn granule(&self) -> Option<i64> {
        (self.granule_position >= 0).then_some(self.granule_position)
    }

    /// 本页内结束的包数量 (lacing 值小于 255 的段数)
    pub fn completed_packets(&self) -> usize {
        self.segment_table.iter().filter(|&&l| l < 255).count()
    }
}

/// 页面同步器
#[derive(Debug, Default)]
pub struct OggSync {
    buffer: BytesMut,
    /// 累计跳过的字节数 (同步字之前的垃圾与坏页)
    skipped: u64,
}

impl OggSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加原始字节
    pub fn submit(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// 尚未组成页面的缓存字节数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 累计丢弃的字节数
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// 丢弃所有缓存数据
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.skipped = 0;
    }

    /// 取出下一个完整页面
    ///
    /// 数据不足时返回 None, 未完成的页面保留在缓存中.
    /// 版本号或 CRC 错误的页面从同步字后一个字节重新搜索.
    pub fn next_page(&mut self) -> Option<OggPage> {
        loop {
            if !self.seek_capture() {
                return None;
            }
            if self.buffer.len() < PAGE_HEADER_SIZE {
                return None;
            }

            let version = self.buffer[4];
            if version != 0 {
                warn!("Ogg: 不支持的页面版本 {}, 重新同步", version);
                self.skip(1);
                continue;
            }

            let segments = usize::from(self.buffer[26]);
            let header_len = PAGE_HEADER_SIZE + segments;
            if self.buffer.len() < header_len {
                return None;
            }
            let body_len: usize = self.buffer[PAGE_HEADER_SIZE..header_len]
                .iter()
                .map(|&l| usize::from(l))
                .sum();
            let total = header_len + body_len;
            if self.buffer.len() < total {
                return None;
            }

            let stored = LittleEndian::read_u32(&self.buffer[CRC_OFFSET..CRC_OFFSET + 4]);
            let computed = page_crc(&self.buffer[..total]);
            if stored != computed {
                warn!(
                    "Ogg 页面 CRC 校验失败: 读取=0x{stored:08X}, 计算=0x{computed:08X}, 重新同步"
                );
                self.skip(1);
                continue;
            }

            let raw = self.buffer.split_to(total).freeze();
            let page = OggPage {
                flags: PageFlags::from_bits_retain(raw[5]),
                granule_position: LittleEndian::read_i64(&raw[6..14]),
                serial: LittleEndian::read_u32(&raw[14..18]),
                sequence: LittleEndian::read_u32(&raw[18..22]),
                segment_table: raw[PAGE_HEADER_SIZE..header_len].to_vec(),
                body: raw.slice(header_len..),
            };
            debug!(
                "Ogg 页面: serial=0x{:08X}, seq={}, flags=0x{:02X}, granule={}, {} 段 {} 字节",
                page.serial,
                page.sequence,
                page.flags.bits(),
                page.granule_position,
                segments,
                body_len,
            );
            return Some(page);
        }
    }

    /// 丢弃同步字之前的字节, 返回缓存是否以同步字开头
    fn seek_capture(&mut self) -> bool {
        if let Some(pos) = self
            .buffer
            .windows(OGG_CAPTURE.len())
            .position(|w| w == OGG_CAPTURE)
        {
            if pos > 0 {
                debug!("Ogg: 跳过同步字前的 {} 字节", pos);
                self.skip(pos);
            }
            return true;
        }
        // 末尾可能是不完整的同步字, 保留最后 3 个字节
        let keep = self.buffer.len().min(OGG_CAPTURE.len() - 1);
        let drop = self.buffer.len() - keep;
        if drop > 0 {
            self.skip(drop);
        }
        false
    }

    fn skip(&mut self, n: usize) {
        self.buffer.advance(n);
        self.skipped += n as u64;
    }
}

/// 整页 CRC, 其中 CRC 字段按 0 参与计算
fn page_crc(page: &[u8]) -> u32 {
    let crc = ogg_crc32_update(0, &page[..CRC_OFFSET]);
    let crc = ogg_crc32_update(crc, &[0; 4]);
    ogg_crc32_update(crc, &page[CRC_OFFSET + 4..])
}

/// 构造一个带正确 CRC 的页面, 段表由 `packets` 的长度按 lacing 规则生成
///
/// `continue_last` 为 true 时最后一个包不结束 (末段为 255 或以 255 结尾的整数倍).
#[cfg(test)]
pub(crate) fn build_page(
    flags: PageFlags,
    granule: i64,
    serial: u32,
    sequence: u32,
    packets: &[&[u8]],
    continue_last: bool,
) -> Vec<u8> {
    let mut segments = Vec::new();
    for (i, pkt) in packets.iter().enumerate() {
        let mut remaining = pkt.len();
        while remaining >= 255 {
            segments.push(255u8);
            remaining -= 255;
        }
        let open = continue_last && i + 1 == packets.len();
        if !open {
            segments.push(remaining as u8);
        } else if remaining > 0 {
            panic!("未结束的包长度必须是 255 的整数倍");
        }
    }

    let mut page = Vec::new();
    page.extend_from_slice(OGG_CAPTURE);
    page.push(0);
    page.push(flags.bits());
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&[0; 4]);
    page.push(segments.len() as u8);
    page.extend_from_slice(&segments);
    for pkt in packets {
        page.extend_from_slice(pkt);
    }
    let crc = page_crc(&page);
    page[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
    page
}
