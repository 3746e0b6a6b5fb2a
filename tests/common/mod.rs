//! 集成测试共用的合成码流构造器.
//!
//! Theora 流: 1x1 宏块, 平坦量化, 每个平面只有一个直流系数的关键帧.
//! Vorbis 流: 单声道 8000 Hz, 短块 64 / 长块 128, floor1 仅两个端点的静音包.

#![allow(dead_code)]

use std::sync::Once;

use tao_ogv::core::bitwriter::{BitWriter, LsbBitWriter};
use tao_ogv::core::crc::ogg_crc32;
use tao_ogv::core::TaoResult;
use tao_ogv::format::ByteSource;

pub const BOS: u8 = 0x02;
pub const EOS: u8 = 0x04;

pub const VIDEO_SERIAL: u32 = 0x1234;
pub const AUDIO_SERIAL: u32 = 0x5678;

static LOG_INIT: Once = Once::new();

/// 测试日志, 只初始化一次
pub fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Ogg 页面写入器, 按 serial 维护页序号
#[derive(Debug, Default)]
pub struct OggWriter {
    out: Vec<u8>,
    sequences: Vec<(u32, u32)>,
}

impl OggWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&mut self, serial: u32) -> u32 {
        if let Some(entry) = self.sequences.iter_mut().find(|(s, _)| *s == serial) {
            entry.1 += 1;
            return entry.1;
        }
        self.sequences.push((serial, 0));
        0
    }

    /// 写一个页面, 所有包都在本页结束
    pub fn page(&mut self, flags: u8, granule: i64, serial: u32, packets: &[&[u8]]) -> &mut Self {
        let sequence = self.next_sequence(serial);
        let mut segments = Vec::new();
        for pkt in packets {
            segments.extend(std::iter::repeat_n(255u8, pkt.len() / 255));
            segments.push((pkt.len() % 255) as u8);
        }
        assert!(segments.len() <= 255, "单页最多 255 个段");

        let mut page = b"OggS".to_vec();
        page.push(0);
        page.push(flags);
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&serial.to_le_bytes());
        page.extend_from_slice(&sequence.to_le_bytes());
        page.extend_from_slice(&[0; 4]);
        page.push(segments.len() as u8);
        page.extend_from_slice(&segments);
        for pkt in packets {
            page.extend_from_slice(pkt);
        }
        let crc = ogg_crc32(&page);
        page[22..26].copy_from_slice(&crc.to_le_bytes());
        self.out.extend_from_slice(&page);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }
}

/// Theora identification, 版本 3.2.1, 关键帧位移 6
///
/// `pf`: 0 = 4:2:0, 2 = 4:2:2, 3 = 4:4:4
pub fn theora_ident(fps: (u32, u32), pf: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0x80, 8);
    bw.write_bytes(b"theora");
    for v in [3, 2, 1] {
        bw.write_bits(v, 8);
    }
    bw.write_bits(1, 16);
    bw.write_bits(1, 16);
    bw.write_bits(16, 24);
    bw.write_bits(16, 24);
    bw.write_bits(0, 8);
    bw.write_bits(0, 8);
    bw.write_bits(fps.0, 32);
    bw.write_bits(fps.1, 32);
    bw.write_bits(1, 24);
    bw.write_bits(1, 24);
    bw.write_bits(0, 8);
    bw.write_bits(0, 24);
    bw.write_bits(48, 6);
    bw.write_bits(6, 5);
    bw.write_bits(pf, 2);
    bw.write_bits(0, 3);
    bw.finish()
}

pub fn theora_comment() -> Vec<u8> {
    let mut pkt = vec![0x81];
    pkt.extend_from_slice(b"theora");
    pkt.extend_from_slice(&3u32.to_le_bytes());
    pkt.extend_from_slice(b"tao");
    pkt.extend_from_slice(&0u32.to_le_bytes());
    pkt
}

/// 环路滤波关闭, 平坦量化矩阵, 80 张 "0" -> EOB, "1" -> +/-3 的 Huffman 表
pub fn theora_setup() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0x82, 8);
    bw.write_bytes(b"theora");
    bw.write_bits(0, 3);
    for _ in 0..2 {
        bw.write_bits(15, 4);
        for _ in 0..64 {
            bw.write_bits(100, 16);
        }
    }
    bw.write_bits(0, 9);
    for _ in 0..64 {
        bw.write_bits(16, 8);
    }
    bw.write_bits(62, 6);
    for qti in 0..2 {
        for pli in 0..3 {
            if qti == 0 && pli == 0 {
                continue;
            }
            bw.write_bits(0, 1);
            if qti > 0 {
                bw.write_bits(0, 1);
            }
        }
    }
    for _ in 0..80 {
        bw.write_bits(0, 1);
        bw.write_bits(1, 1);
        bw.write_bits(0, 5);
        bw.write_bits(1, 1);
        bw.write_bits(13, 5);
    }
    bw.finish()
}

/// 关键帧: 每个平面第一个块直流 +3, 解码后所有采样为 134
pub fn theora_intra_frame() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 1);
    bw.write_bits(0, 1);
    bw.write_bits(10, 6);
    bw.write_bits(0, 1);
    bw.write_bits(0, 3);
    bw.write_bits(0, 8);
    bw.write_bits(0b10, 2);
    bw.write_bits(0, 3);
    bw.write_bits(0b10, 2);
    bw.write_bits(0b10, 2);
    bw.write_bits(0, 8);
    bw.write_bits(0, 3);
    bw.finish()
}

pub fn vorbis_ident() -> Vec<u8> {
    let mut v = vec![0x01];
    v.extend_from_slice(b"vorbis");
    v.extend_from_slice(&0u32.to_le_bytes());
    v.push(1);
    v.extend_from_slice(&8000u32.to_le_bytes());
    v.extend_from_slice(&0i32.to_le_bytes());
    v.extend_from_slice(&64000i32.to_le_bytes());
    v.extend_from_slice(&0i32.to_le_bytes());
    v.push((7 << 4) | 6);
    v.push(1);
    v
}

pub fn vorbis_comment() -> Vec<u8> {
    let mut v = vec![0x03];
    v.extend_from_slice(b"vorbis");
    v.extend_from_slice(&3u32.to_le_bytes());
    v.extend_from_slice(b"tao");
    v.extend_from_slice(&0u32.to_le_bytes());
    v.push(1);
    v
}

fn write_book(bw: &mut LsbBitWriter, lookup: bool) {
    bw.write_bits(0x564342, 24);
    bw.write_bits(1, 16);
    bw.write_bits(2, 24);
    bw.write_bits(0, 1);
    bw.write_bits(0, 1);
    bw.write_bits(0, 5);
    bw.write_bits(0, 5);
    if lookup {
        bw.write_bits(1, 4);
        bw.write_bits(0, 32);
        bw.write_bits((788 << 21) | 1, 32);
        bw.write_bits(0, 4);
        bw.write_bits(0, 1);
        bw.write_bits(0, 1);
        bw.write_bits(1, 1);
    } else {
        bw.write_bits(0, 4);
    }
}

/// floor1 两个端点, residue 覆盖 0 个频点 (静音)
pub fn vorbis_setup() -> Vec<u8> {
    let mut bw = LsbBitWriter::new();
    bw.write_bits(0x05, 8);
    bw.write_bytes(b"vorbis");
    bw.write_bits(1, 8);
    write_book(&mut bw, false);
    write_book(&mut bw, true);
    bw.write_bits(0, 6);
    bw.write_bits(0, 16);
    bw.write_bits(0, 6);
    bw.write_bits(1, 16);
    bw.write_bits(0, 5);
    bw.write_bits(0, 2);
    bw.write_bits(6, 4);
    bw.write_bits(0, 6);
    bw.write_bits(1, 16);
    bw.write_bits(0, 24);
    bw.write_bits(0, 24);
    bw.write_bits(31, 24);
    bw.write_bits(0, 6);
    bw.write_bits(0, 8);
    bw.write_bits(1, 3);
    bw.write_bits(0, 1);
    bw.write_bits(1, 8);
    bw.write_bits(0, 6);
    bw.write_bits(0, 16);
    bw.write_bits(0, 1);
    bw.write_bits(0, 1);
    bw.write_bits(0, 2);
    bw.write_bits(0, 8);
    bw.write_bits(0, 8);
    bw.write_bits(0, 8);
    bw.write_bits(1, 6);
    for block_flag in [0, 1] {
        bw.write_bits(block_flag, 1);
        bw.write_bits(0, 16);
        bw.write_bits(0, 16);
        bw.write_bits(0, 8);
    }
    bw.write_bits(1, 1);
    bw.finish()
}

/// 短块静音包, 除第一个外每个输出 32 个采样
pub fn vorbis_silent_packet() -> Vec<u8> {
    let mut bw = LsbBitWriter::new();
    bw.write_bits(0, 1);
    bw.write_bits(0, 1);
    bw.write_bits(1, 1);
    bw.write_bits(255, 8);
    bw.write_bits(255, 8);
    bw.finish()
}

/// 仅视频: 关键帧 + 重复帧, 10/1 fps 时显示时间为 100 ms 与 200 ms
pub fn video_only_stream(fps: (u32, u32), pf: u32) -> Vec<u8> {
    let comment = theora_comment();
    let setup = theora_setup();
    OggWriter::new()
        .page(BOS, 0, VIDEO_SERIAL, &[&theora_ident(fps, pf)])
        .page(0, 0, VIDEO_SERIAL, &[&comment, &setup])
        .page(0, 1 << 6, VIDEO_SERIAL, &[&theora_intra_frame()])
        .page(EOS, (1 << 6) + 1, VIDEO_SERIAL, &[b"".as_slice()])
        .finish()
}

/// 音视频: 两帧视频, `audio_packets` 个静音包
pub fn av_stream(audio_packets: usize) -> Vec<u8> {
    let silent = vorbis_silent_packet();
    let audio: Vec<&[u8]> = (0..audio_packets).map(|_| silent.as_slice()).collect();
    let end = 32 * (audio_packets as i64 - 1);
    let mut w = OggWriter::new();
    w.page(BOS, 0, VIDEO_SERIAL, &[&theora_ident((10, 1), 0)])
        .page(BOS, 0, AUDIO_SERIAL, &[&vorbis_ident()])
        .page(0, 0, VIDEO_SERIAL, &[&theora_comment(), &theora_setup()])
        .page(0, 0, AUDIO_SERIAL, &[&vorbis_comment(), &vorbis_setup()])
        .page(0, 1 << 6, VIDEO_SERIAL, &[&theora_intra_frame()])
        .page(EOS, end, AUDIO_SERIAL, &audio)
        .page(EOS, (1 << 6) + 1, VIDEO_SERIAL, &[b"".as_slice()]);
    w.finish()
}

/// 一直返回 0 字节但不结束的字节源
#[derive(Debug, Default)]
pub struct StalledSource {
    pub reads: u32,
}

impl ByteSource for StalledSource {
    fn is_open(&self) -> bool {
        true
    }

    fn is_at_end(&self) -> bool {
        false
    }

    fn read(&mut self, _buf: &mut [u8]) -> TaoResult<usize> {
        self.reads += 1;
        Ok(0)
    }
}
