//! 单元测试共用的合成码流与假解码器.

use std::sync::{Arc, Mutex};

use tao_codec::{AudioFrame, CodecId, CodecParameters, Decoder, Frame, Packet, VideoFrame};
use tao_core::bitwriter::BitWriter;
use tao_core::crc::ogg_crc32;
use tao_core::{PixelFormat, TaoError, TaoResult};

pub(crate) const BOS: u8 = 0x02;
pub(crate) const EOS: u8 = 0x04;

/// 单页, 每个包都在本页结束
pub(crate) fn ogg_page(flags: u8, granule: i64, serial: u32, sequence: u32, packets: &[&[u8]]) -> Vec<u8> {
    let mut segments = Vec::new();
    for pkt in packets {
        segments.extend(std::iter::repeat_n(255u8, pkt.len() / 255));
        segments.push((pkt.len() % 255) as u8);
    }
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
    page
}

/// Theora identification 头包, 1x1 宏块
pub(crate) fn theora_ident(fps: (u32, u32)) -> Vec<u8> {
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
    bw.write_bits(0, 2);
    bw.write_bits(0, 3);
    bw.finish()
}

/// Vorbis identification 头包, 立体声 1000 Hz
pub(crate) fn vorbis_ident() -> Vec<u8> {
    let mut v = vec![0x01];
    v.extend_from_slice(b"vorbis");
    v.extend_from_slice(&0u32.to_le_bytes());
    v.push(2);
    v.extend_from_slice(&1000u32.to_le_bytes());
    v.extend_from_slice(&0i32.to_le_bytes());
    v.extend_from_slice(&0i32.to_le_bytes());
    v.extend_from_slice(&0i32.to_le_bytes());
    v.push((7 << 4) | 6);
    v.push(1);
    v
}

/// 10 fps 假视频解码器: 粒度位置即帧号, 输出 2x2 帧, 亮度等于包的首字节
///
/// 首字节 0x81 视为头包形状, 0xFF 视为损坏.
pub(crate) struct FakeVideo {
    pending: Option<(i64, u8)>,
    next: i64,
    pp: Arc<Mutex<Vec<u8>>>,
}

impl FakeVideo {
    /// 返回解码器与记录后处理级别的句柄
    pub(crate) fn boxed() -> (Box<dyn Decoder>, Arc<Mutex<Vec<u8>>>) {
        let pp = Arc::new(Mutex::new(Vec::new()));
        let dec = Self {
            pending: None,
            next: 0,
            pp: Arc::clone(&pp),
        };
        (Box::new(dec), pp)
    }
}

impl Decoder for FakeVideo {
    fn codec_id(&self) -> CodecId {
        CodecId::Theora
    }
    fn name(&self) -> &str {
        "fake-video"
    }
    fn headers_ready(&self) -> bool {
        true
    }
    fn parameters(&self) -> Option<CodecParameters> {
        None
    }
    fn granule_time(&self, granule: i64) -> Option<f64> {
        (granule >= 0).then(|| granule as f64 / 10.0)
    }
    fn send_packet(&mut self, packet: &Packet) -> TaoResult<()> {
        match packet.data.first() {
            Some(0x81) => return Ok(()),
            Some(0xFF) => return Err(TaoError::InvalidData("坏包".into())),
            _ => {}
        }
        self.next = packet.granule.unwrap_or(self.next + 1);
        self.pending = Some((self.next, packet.data.first().copied().unwrap_or(16)));
        Ok(())
    }
    fn receive_frame(&mut self) -> TaoResult<Frame> {
        let (granule, luma) = self.pending.take().ok_or(TaoError::NeedMoreData)?;
        let mut frame = VideoFrame::new(2, 2, PixelFormat::Yuv420p);
        frame.data[0].fill(luma);
        frame.data[1].fill(128);
        frame.data[2].fill(128);
        frame.granule = granule;
        Ok(Frame::Video(frame))
    }
    fn flush(&mut self) {
        self.pending = None;
    }
    fn postprocess_level_max(&self) -> u8 {
        2
    }
    fn set_postprocess_level(&mut self, level: u8) {
        self.pp.lock().unwrap().push(level);
    }
}

/// 1000 Hz 立体声假音频解码器: 长度为 n 的包输出 n 个采样,
/// 左声道取首字节 / 100, 右声道取其相反数; 位置取包的粒度位置
pub(crate) struct FakeAudio {
    out: Option<AudioFrame>,
}

impl FakeAudio {
    pub(crate) fn boxed() -> Box<dyn Decoder> {
        Box::new(Self { out: None })
    }
}

impl Decoder for FakeAudio {
    fn codec_id(&self) -> CodecId {
        CodecId::Vorbis
    }
    fn name(&self) -> &str {
        "fake-audio"
    }
    fn headers_ready(&self) -> bool {
        true
    }
    fn parameters(&self) -> Option<CodecParameters> {
        None
    }
    fn granule_time(&self, granule: i64) -> Option<f64> {
        Some(granule as f64 / 1000.0)
    }
    fn send_packet(&mut self, packet: &Packet) -> TaoResult<()> {
        if packet.data.first() == Some(&0xFF) {
            return Err(TaoError::InvalidData("坏包".into()));
        }
        let n = packet.data.len();
        let value = f32::from(packet.data.first().copied().unwrap_or(0)) / 100.0;
        self.out = Some(AudioFrame {
            samples: vec![vec![value; n], vec![-value; n]],
            nb_samples: n,
            sample_rate: 1000,
            pts: packet.granule,
        });
        Ok(())
    }
    fn receive_frame(&mut self) -> TaoResult<Frame> {
        self.out.take().map(Frame::Audio).ok_or(TaoError::NeedMoreData)
    }
    fn flush(&mut self) {
        self.out = None;
    }
}
