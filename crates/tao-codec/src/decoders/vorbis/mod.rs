//! Vorbis 音频解码器.
//!
//! 完整实现 Vorbis I 解码流程:
//! - 三个头包 (identification/comment/setup) 解析与校验
//! - floor 0 / floor 1 包络, residue 0 / 1 / 2, 声道耦合
//! - 基于 FFT 的 IMDCT, 长短块窗切换与重叠相加
//! - 粒度位置跟踪, 流结束时按粒度裁剪尾部采样
//!
//! 输出为平面 f32 采样, 声道按 Vorbis 规定的顺序排列.

mod bitreader;
mod codebook;
mod floor;
mod headers;
mod imdct;
mod residue;
mod setup;
mod synthesis;

use std::collections::VecDeque;

use log::{debug, warn};
use tao_core::{TaoError, TaoResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType};
use crate::decoder::Decoder;
use crate::frame::{AudioFrame, Frame};
use crate::packet::Packet;

pub use self::headers::{VorbisComment, VorbisInfo, parse_comment, parse_identification};

use self::bitreader::{LsbBitReader, ilog};
use self::floor::{FloorData, apply_floor, decode_floor};
use self::headers::is_header_packet;
use self::imdct::Imdct;
use self::residue::decode_residue;
use self::setup::{ParsedSetup, parse_setup_packet};
use self::synthesis::{OverlapBuffer, VorbisWindows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderStage {
    Identification,
    Comment,
    Setup,
    Audio,
}

/// 音频包头: 模式与相邻块的长短
#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    mode: usize,
    long: bool,
    prev_long: bool,
    next_long: bool,
}

/// setup 之后才能建立的解码状态
struct DecodeState {
    setup: ParsedSetup,
    windows: VorbisWindows,
    imdct_short: Imdct,
    imdct_long: Imdct,
    overlap: OverlapBuffer,
}

impl DecodeState {
    fn new(info: &VorbisInfo, setup: ParsedSetup) -> Self {
        let bs0 = usize::from(info.blocksize0);
        let bs1 = usize::from(info.blocksize1);
        Self {
            setup,
            windows: VorbisWindows::new(bs0, bs1),
            imdct_short: Imdct::new(bs0),
            imdct_long: Imdct::new(bs1),
            overlap: OverlapBuffer::default(),
        }
    }

    fn read_block_header(&self, br: &mut LsbBitReader<'_>) -> TaoResult<BlockHeader> {
        if br.read_flag()? {
            return Err(TaoError::InvalidData("Vorbis 音频包首位必须为 0".into()));
        }
        let modes = &self.setup.modes;
        let mode = br.read_bits(ilog(modes.len() as u32 - 1))? as usize;
        let config = modes.get(mode).ok_or_else(|| {
            TaoError::InvalidData(format!("Vorbis mode 索引越界: {}", mode))
        })?;
        let long = config.block_flag;
        let (prev_long, next_long) = if long {
            (br.read_flag()?, br.read_flag()?)
        } else {
            (false, false)
        };
        Ok(BlockHeader {
            mode,
            long,
            prev_long,
            next_long,
        })
    }

    /// 解码一个音频包, 返回可输出的采样 (第一个块返回 None)
    fn decode_block(&mut self, data: &[u8], channels: usize) -> TaoResult<Option<Vec<Vec<f32>>>> {
        let mut br = LsbBitReader::new(data);
        let header = self.read_block_header(&mut br)?;
        let n = self.windows.blocksize(header.long);
        let n2 = n / 2;

        let setup = &self.setup;
        let mapping = &setup.mappings[usize::from(setup.modes[header.mode].mapping)];

        let mut floors = Vec::with_capacity(channels);
        for ch in 0..channels {
            let submap = usize::from(mapping.mux[ch]);
            let floor = &setup.floors[usize::from(mapping.submap_floor[submap])];
            let data = match decode_floor(&mut br, floor, &setup.codebooks) {
                Ok(d) => d,
                Err(TaoError::Eof) => FloorData::Unused,
                Err(e) => return Err(e),
            };
            floors.push(data);
        }

        // 耦合的两个声道只要有一个非静音, 两个都要解 residue
        let mut no_residue: Vec<bool> = floors.iter().map(FloorData::is_unused).collect();
        for step in &mapping.coupling {
            let (m, a) = (usize::from(step.magnitude), usize::from(step.angle));
            if !no_residue[m] || !no_residue[a] {
                no_residue[m] = false;
                no_residue[a] = false;
            }
        }

        let mut spectra = vec![vec![0.0f32; n2]; channels];
        for (submap, &residue_idx) in mapping.submap_residue.iter().enumerate() {
            let members: Vec<usize> = (0..channels)
                .filter(|&ch| usize::from(mapping.mux[ch]) == submap)
                .collect();
            let do_not_decode: Vec<bool> = members.iter().map(|&ch| no_residue[ch]).collect();
            let mut vectors: Vec<&mut [f32]> = spectra
                .iter_mut()
                .enumerate()
                .filter(|(ch, _)| usize::from(mapping.mux[*ch]) == submap)
                .map(|(_, v)| v.as_mut_slice())
                .collect();
            decode_residue(
                &mut br,
                &setup.residues[usize::from(residue_idx)],
                &setup.codebooks,
                &mut vectors,
                &do_not_decode,
            )?;
        }

        for step in mapping.coupling.iter().rev() {
            let (m, a) = (usize::from(step.magnitude), usize::from(step.angle));
            for i in 0..n2 {
                let (mag, ang) = inverse_couple(spectra[m][i], spectra[a][i]);
                spectra[m][i] = mag;
                spectra[a][i] = ang;
            }
        }

        let mut blocks = Vec::with_capacity(channels);
        for (ch, spectrum) in spectra.iter_mut().enumerate() {
            let submap = usize::from(mapping.mux[ch]);
            let floor = &setup.floors[usize::from(mapping.submap_floor[submap])];
            apply_floor(floor, &floors[ch], spectrum);

            let mut block = vec![0.0f32; n];
            if !floors[ch].is_unused() {
                let imdct = if header.long {
                    &mut self.imdct_long
                } else {
                    &mut self.imdct_short
                };
                imdct.process(spectrum, &mut block);
                self.windows
                    .apply(&mut block, header.long, header.prev_long, header.next_long);
            }
            blocks.push(block);
        }

        Ok(self.overlap.push(blocks))
    }
}

/// 幅度/角度耦合还原为两个声道
fn inverse_couple(magnitude: f32, angle: f32) -> (f32, f32) {
    if magnitude > 0.0 {
        if angle > 0.0 {
            (magnitude, magnitude - angle)
        } else {
            (magnitude + angle, magnitude)
        }
    } else if angle > 0.0 {
        (magnitude, magnitude + angle)
    } else {
        (magnitude - angle, magnitude)
    }
}

/// Vorbis 解码器
pub struct VorbisDecoder {
    stage: HeaderStage,
    info: Option<VorbisInfo>,
    comment: Option<VorbisComment>,
    state: Option<DecodeState>,
    /// 下一个输出采样的位置
    position: Option<i64>,
    pending: VecDeque<AudioFrame>,
}

impl Default for VorbisDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VorbisDecoder {
    /// 创建解码器
    pub fn new() -> Self {
        Self {
            stage: HeaderStage::Identification,
            info: None,
            comment: None,
            state: None,
            position: None,
            pending: VecDeque::new(),
        }
    }

    /// 创建 Vorbis 解码器 (工厂函数)
    pub fn create() -> TaoResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new()))
    }

    /// identification 头包信息
    pub fn info(&self) -> Option<&VorbisInfo> {
        self.info.as_ref()
    }

    /// comment 头包信息
    pub fn comment(&self) -> Option<&VorbisComment> {
        self.comment.as_ref()
    }

    fn parse_header(&mut self, data: &[u8]) -> TaoResult<()> {
        if !is_header_packet(data) {
            return Err(TaoError::InvalidArgument(
                "Vorbis 头包尚未就绪, 不能送入数据包".into(),
            ));
        }
        match self.stage {
            HeaderStage::Identification => {
                let info = parse_identification(data)?;
                debug!(
                    "Vorbis: {} Hz, {} 声道, blocksize {}/{}, 标称码率 {}",
                    info.sample_rate,
                    info.channels,
                    info.blocksize0,
                    info.blocksize1,
                    info.bitrate_nominal,
                );
                self.info = Some(info);
                self.stage = HeaderStage::Comment;
            }
            HeaderStage::Comment => {
                let comment = parse_comment(data)?;
                debug!(
                    "Vorbis vendor: {}, {} 条注释",
                    comment.vendor,
                    comment.user_comments.len()
                );
                self.comment = Some(comment);
                self.stage = HeaderStage::Setup;
            }
            HeaderStage::Setup => {
                let info = self
                    .info
                    .as_ref()
                    .ok_or_else(|| TaoError::Internal("Vorbis setup 前缺少 identification".into()))?;
                let setup = parse_setup_packet(data, info.channels)?;
                debug!(
                    "Vorbis setup: {} codebook, {} floor, {} residue, {} mapping, {} mode",
                    setup.codebooks.len(),
                    setup.floors.len(),
                    setup.residues.len(),
                    setup.mappings.len(),
                    setup.modes.len(),
                );
                self.state = Some(DecodeState::new(info, setup));
                self.stage = HeaderStage::Audio;
            }
            HeaderStage::Audio => {}
        }
        Ok(())
    }

    fn decode_audio(&mut self, packet: &Packet) -> TaoResult<()> {
        let (Some(state), Some(info)) = (self.state.as_mut(), self.info.as_ref()) else {
            return Err(TaoError::InvalidArgument("Vorbis 头包尚未就绪".into()));
        };
        let channels = usize::from(info.channels);
        let sample_rate = info.sample_rate;

        let pcm = match state.decode_block(&packet.data, channels) {
            Ok(Some(pcm)) => pcm,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Vorbis 音频包解码失败, 已跳过 (包序号 {}): {}", packet.packet_no, e);
                return Ok(());
            }
        };

        let produced = pcm.first().map_or(0, Vec::len);
        let granule = packet.granule.filter(|&g| g >= 0);
        let start = match (self.position, granule) {
            (Some(p), _) => p,
            (None, Some(g)) => (g - produced as i64).max(0),
            (None, None) => 0,
        };
        let mut keep = produced;
        if let Some(g) = granule
            && packet.eos
            && g < start + produced as i64
        {
            keep = (g - start).clamp(0, produced as i64) as usize;
            debug!("Vorbis 流结束裁剪: {} -> {} 采样", produced, keep);
        }
        self.position = Some(granule.unwrap_or(start + keep as i64));

        if keep == 0 {
            return Ok(());
        }
        let samples: Vec<Vec<f32>> = pcm
            .into_iter()
            .map(|mut ch| {
                ch.truncate(keep);
                ch
            })
            .collect();
        self.pending.push_back(AudioFrame {
            samples,
            nb_samples: keep,
            sample_rate,
            pts: Some(start),
        });
        Ok(())
    }
}

impl Decoder for VorbisDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Vorbis
    }

    fn name(&self) -> &str {
        "vorbis"
    }

    fn headers_ready(&self) -> bool {
        self.stage == HeaderStage::Audio
    }

    fn parameters(&self) -> Option<CodecParameters> {
        if !self.headers_ready() {
            return None;
        }
        let info = self.info.as_ref()?;
        Some(CodecParameters {
            codec_id: CodecId::Vorbis,
            bit_rate: info.bitrate_nominal.max(0) as u64,
            params: CodecParamsType::Audio(AudioCodecParams {
                sample_rate: info.sample_rate,
                channels: u32::from(info.channels),
                max_block_size: u32::from(info.blocksize1),
            }),
        })
    }

    fn granule_time(&self, granule: i64) -> Option<f64> {
        let info = self.info.as_ref()?;
        if granule < 0 {
            return None;
        }
        Some(granule as f64 / f64::from(info.sample_rate))
    }

    fn send_packet(&mut self, packet: &Packet) -> TaoResult<()> {
        let data = packet.data.as_ref();
        if self.stage != HeaderStage::Audio {
            return self.parse_header(data);
        }
        if data.is_empty() {
            return Ok(());
        }
        if is_header_packet(data) {
            warn!("Vorbis 头包之后又收到头包, 已跳过 (包序号 {})", packet.packet_no);
            return Ok(());
        }
        self.decode_audio(packet)
    }

    fn receive_frame(&mut self) -> TaoResult<Frame> {
        if !self.headers_ready() {
            return Err(TaoError::InvalidArgument("Vorbis 头包尚未就绪".into()));
        }
        self.pending
            .pop_front()
            .map(Frame::Audio)
            .ok_or(TaoError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.position = None;
        if let Some(state) = self.state.as_mut() {
            state.overlap.reset();
        }
    }
}
