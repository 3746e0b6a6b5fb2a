//! 头包组装.
//!
//! 流识别完成后, 从每个已识别的逻辑流依次取出恰好 3 个包送入解码器的头包阶段,
//! 解复用器没有包时再从字节源读取. 头包完成后校验帧率与像素格式.

use log::{debug, info, warn};
use tao_codec::{CodecId, CodecRegistry, Decoder, Packet};
use tao_core::{PixelFormat, Rational};
use tao_format::{ByteSource, OggDemuxer, ScanStatus};

use crate::audio::AudioDecoderState;
use crate::config::PlaybackConfig;
use crate::error::OpenError;
use crate::output::AvSessionInfo;
use crate::reader::{ChunkReader, ReadStatus};
use crate::video::VideoDecoderState;

/// 每个逻辑流的头包数量
const HEADER_PACKETS: usize = 3;

/// 头包组装结果
#[derive(Debug)]
pub struct AssembledStreams {
    pub video: Option<VideoDecoderState>,
    pub audio: Option<AudioDecoderState>,
    pub info: AvSessionInfo,
}

/// 连续空读计数
struct IdleReads {
    count: u32,
    max: u32,
}

impl IdleReads {
    fn on_status(&mut self, status: ReadStatus) -> Result<ReadStatus, OpenError> {
        match status {
            ReadStatus::Data(_) => self.count = 0,
            ReadStatus::Starved => {
                self.count += 1;
                if self.count >= self.max {
                    return Err(OpenError::TruncatedHeader(format!(
                        "字节源连续 {} 次没有返回数据",
                        self.count
                    )));
                }
            }
            ReadStatus::Exhausted => {}
        }
        Ok(status)
    }
}

/// 头包阶段的解码器
struct HeaderSlot {
    codec: CodecId,
    decoder: Box<dyn Decoder>,
    consumed: usize,
}

impl HeaderSlot {
    fn create(registry: &CodecRegistry, codec: CodecId) -> Result<Self, OpenError> {
        let decoder = registry
            .create_decoder(codec)
            .map_err(|source| OpenError::CorruptHeader { codec, source })?;
        Ok(Self {
            codec,
            decoder,
            consumed: 0,
        })
    }

    fn is_done(&self) -> bool {
        self.consumed == HEADER_PACKETS
    }

    fn feed(&mut self, packet: &Packet) -> Result<(), OpenError> {
        let codec = self.codec;
        self.decoder
            .send_packet(packet)
            .map_err(|source| OpenError::CorruptHeader { codec, source })?;
        self.consumed += 1;
        debug!("{} 头包 {}/{} 已解析", codec, self.consumed, HEADER_PACKETS);
        if self.is_done() && !self.decoder.headers_ready() {
            return Err(OpenError::CorruptHeader {
                codec,
                source: tao_core::TaoError::InvalidData(format!(
                    "{} 个头包之后解码器仍未就绪",
                    HEADER_PACKETS
                )),
            });
        }
        Ok(())
    }
}

/// 识别逻辑流并解析全部头包
pub fn assemble_headers(
    source: &mut dyn ByteSource,
    demuxer: &mut OggDemuxer,
    config: &PlaybackConfig,
) -> Result<AssembledStreams, OpenError> {
    let mut reader = ChunkReader::new(config.read_chunk_size);
    let mut idle = IdleReads {
        count: 0,
        max: config.max_idle_reads,
    };

    while demuxer.scan_headers() == ScanStatus::NeedMoreData {
        let status = reader
            .read_chunk(source, demuxer)
            .map_err(OpenError::Read)?;
        if idle.on_status(status)? == ReadStatus::Exhausted {
            break;
        }
    }
    if !demuxer.has_video() && !demuxer.has_audio() {
        return Err(OpenError::NoStreamFound);
    }

    let want_video = demuxer.has_video() && config.enable_video;
    let want_audio = demuxer.has_audio() && config.enable_audio;
    if !want_video && !want_audio {
        warn!("已识别的逻辑流均被配置禁用");
        return Err(OpenError::NoStreamFound);
    }

    let registry = CodecRegistry::with_defaults();
    let mut video = want_video
        .then(|| HeaderSlot::create(&registry, CodecId::Theora))
        .transpose()?;
    let mut audio = want_audio
        .then(|| HeaderSlot::create(&registry, CodecId::Vorbis))
        .transpose()?;

    loop {
        let mut progressed = false;
        if let Some(slot) = video.as_mut()
            && !slot.is_done()
            && let Some(packet) = demuxer.video_packet()
        {
            slot.feed(&packet)?;
            progressed = true;
        }
        if let Some(slot) = audio.as_mut()
            && !slot.is_done()
            && let Some(packet) = demuxer.audio_packet()
        {
            slot.feed(&packet)?;
            progressed = true;
        }

        let done = video.as_ref().is_none_or(HeaderSlot::is_done)
            && audio.as_ref().is_none_or(HeaderSlot::is_done);
        if done {
            break;
        }
        if progressed || demuxer.pump() > 0 {
            continue;
        }
        let status = reader
            .read_chunk(source, demuxer)
            .map_err(OpenError::Read)?;
        if idle.on_status(status)? == ReadStatus::Exhausted {
            return Err(OpenError::TruncatedHeader(format!(
                "读取 {} 字节后字节源耗尽",
                reader.total_bytes()
            )));
        }
    }

    let mut info = AvSessionInfo::default();
    let video = video.map(|slot| open_video(slot, config, &mut info)).transpose()?;
    let audio = audio.map(|slot| open_audio(slot, config, &mut info)).transpose()?;
    info!(
        "会话信息: 视频={} {}x{} @ {}, 音频={} {} Hz {} 声道",
        info.has_video,
        info.width,
        info.height,
        info.frame_rate,
        info.has_audio,
        info.sample_rate,
        info.channels
    );
    Ok(AssembledStreams { video, audio, info })
}

fn open_video(
    slot: HeaderSlot,
    config: &PlaybackConfig,
    info: &mut AvSessionInfo,
) -> Result<VideoDecoderState, OpenError> {
    let params = slot.decoder.parameters();
    let Some(v) = params.as_ref().and_then(|p| p.video()) else {
        return Err(OpenError::CorruptHeader {
            codec: slot.codec,
            source: tao_core::TaoError::Internal("视频解码器没有报告流参数".into()),
        });
    };
    let frame_rate = Rational::try_frame_rate(v.frame_rate.num, v.frame_rate.den).map_err(|_| {
        OpenError::InvalidFrameRate {
            numerator: v.frame_rate.num,
            denominator: v.frame_rate.den,
        }
    })?;
    if v.pixel_format != PixelFormat::Yuv420p {
        return Err(OpenError::UnsupportedPixelFormat(v.pixel_format));
    }
    info.has_video = true;
    info.width = v.width;
    info.height = v.height;
    info.frame_rate = frame_rate;
    Ok(VideoDecoderState::new(
        slot.decoder,
        frame_rate,
        config.post_processing,
    ))
}

fn open_audio(
    slot: HeaderSlot,
    config: &PlaybackConfig,
    info: &mut AvSessionInfo,
) -> Result<AudioDecoderState, OpenError> {
    let params = slot.decoder.parameters();
    let Some(a) = params.as_ref().and_then(|p| p.audio()) else {
        return Err(OpenError::CorruptHeader {
            codec: slot.codec,
            source: tao_core::TaoError::Internal("音频解码器没有报告流参数".into()),
        });
    };
    info.has_audio = true;
    info.sample_rate = a.sample_rate;
    info.channels = a.channels;
    let capacity = AudioDecoderState::fragment_capacity(
        config.audio_fragment_bytes,
        a.max_block_size,
        a.channels,
    );
    Ok(AudioDecoderState::new(
        slot.decoder,
        a.sample_rate,
        a.channels,
        capacity,
    ))
}
