//! Ogg 逻辑流状态: 按 lacing 值把页面数据重组为数据包.
//!
//! 段表中小于 255 的 lacing 值结束一个包; 页尾的 255 表示包延续到下一页.
//! 本页的粒度位置只附加到在本页内结束的最后一个包上.

use std::collections::VecDeque;

use bytes::Bytes;
use log::{debug, warn};
use tao_codec::Packet;
use tao_core::{TaoError, TaoResult};

use super::page::OggPage;

/// 单个逻辑流的重组状态
#[derive(Debug)]
pub struct OggStreamState {
    serial: u32,
    /// 跨页累积的未完成包
    partial: Vec<u8>,
    /// 正在丢弃缺少起始片段的续包
    discarding: bool,
    packets: VecDeque<Packet>,
    last_sequence: Option<u32>,
    packet_no: u64,
    eos: bool,
}

impl OggStreamState {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            partial: Vec::new(),
            discarding: false,
            packets: VecDeque::new(),
            last_sequence: None,
            packet_no: 0,
            eos: false,
        }
    }

    /// 逻辑流序列号
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// 是否已收到 EOS 页面
    pub fn is_eos(&self) -> bool {
        self.eos
    }

    /// 已重组完成, 等待取出的包数量
    pub fn packets_pending(&self) -> usize {
        self.packets.len()
    }

    /// 送入一个页面
    pub fn pagein(&mut self, page: &OggPage) -> TaoResult<()> {
        if page.serial != self.serial {
            return Err(TaoError::InvalidArgument(format!(
                "Ogg 页面 serial 不匹配: 期望 0x{:08X}, 实际 0x{:08X}",
                self.serial, page.serial
            )));
        }

        if let Some(prev) = self.last_sequence
            && page.sequence != prev.wrapping_add(1)
        {
            warn!(
                "Ogg: 流 0x{:08X} 页面序号断裂 {} -> {}, 丢弃 {} 字节残包",
                self.serial,
                prev,
                page.sequence,
                self.partial.len()
            );
            self.partial.clear();
            self.discarding = page.is_continued();
        } else if page.is_continued() && self.partial.is_empty() && !self.discarding {
            debug!("Ogg: 流 0x{:08X} 遇到无头续包, 丢弃其首个片段", self.serial);
            self.discarding = true;
        } else if !page.is_continued() && !self.partial.is_empty() {
            warn!(
                "Ogg: 流 0x{:08X} 的包未在续页中结束, 丢弃 {} 字节",
                self.serial,
                self.partial.len()
            );
            self.partial.clear();
        }
        if !page.is_continued() {
            self.discarding = false;
        }
        self.last_sequence = Some(page.sequence);

        let first_new = self.packets.len();
        let mut offset = 0usize;
        let mut packet_start = 0usize;
        for &lacing in &page.segment_table {
            let len = usize::from(lacing);
            offset += len;
            if lacing == 255 {
                continue;
            }
            if self.discarding {
                self.discarding = false;
            } else if self.partial.is_empty() {
                self.push_packet(page.body.slice(packet_start..offset));
            } else {
                self.partial.extend_from_slice(&page.body[packet_start..offset]);
                let data = Bytes::from(std::mem::take(&mut self.partial));
                self.push_packet(data);
            }
            packet_start = offset;
        }
        if packet_start < offset && !self.discarding {
            self.partial.extend_from_slice(&page.body[packet_start..offset]);
        }

        if self.packets.len() > first_new
            && let Some(last) = self.packets.back_mut()
        {
            last.granule = page.granule();
            last.eos = page.is_eos();
        }
        if page.is_eos() {
            debug!("Ogg: 流 0x{:08X} 结束", self.serial);
            self.eos = true;
        }
        Ok(())
    }

    fn push_packet(&mut self, data: Bytes) {
        let packet = Packet {
            data,
            granule: None,
            serial: self.serial,
            packet_no: self.packet_no,
            bos: self.packet_no == 0,
            eos: false,
        };
        self.packet_no += 1;
        self.packets.push_back(packet);
    }

    /// 查看下一个包但不取出
    pub fn peek_packet(&self) -> Option<&Packet> {
        self.packets.front()
    }

    /// 取出下一个包
    pub fn next_packet(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    /// 清空所有重组状态, 保留 serial
    pub fn reset(&mut self) {
        self.partial.clear();
        self.discarding = false;
        self.packets.clear();
        self.last_sequence = None;
        self.packet_no = 0;
        self.eos = false;
    }
}
