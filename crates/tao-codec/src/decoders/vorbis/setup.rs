//! Vorbis setup 头包解析.
//!
//! setup 头包依次包含 codebook、time domain 占位、floor、residue、mapping 与 mode 配置,
//! 全部为小端位序. 所有跨表索引在这里校验, 解码阶段可以直接下标访问.

use tao_core::{TaoError, TaoResult};

use super::bitreader::{LsbBitReader, ilog};
use super::codebook::Codebook;

const CODEBOOK_SYNC: u32 = 0x564342;
/// floor1 最多 65 个 X 坐标 (含两个隐式端点)
const FLOOR1_MAX_POINTS: usize = 65;

#[derive(Debug, Clone)]
pub(crate) struct CodebookConfig {
    pub(crate) dimensions: u16,
    pub(crate) entries: u32,
    /// 每个条目的码长, 0 表示条目未使用
    pub(crate) lengths: Vec<u8>,
    pub(crate) lookup_type: u8,
    pub(crate) lookup: Option<CodebookLookupConfig>,
}

#[derive(Debug, Clone)]
pub(crate) struct CodebookLookupConfig {
    pub(crate) minimum_value: f32,
    pub(crate) delta_value: f32,
    pub(crate) sequence_p: bool,
    pub(crate) lookup_values: u32,
    pub(crate) multiplicands: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct Floor0Config {
    pub(crate) order: u8,
    pub(crate) rate: u16,
    pub(crate) bark_map_size: u16,
    pub(crate) amplitude_bits: u8,
    pub(crate) amplitude_offset: u8,
    pub(crate) books: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct Floor1Class {
    pub(crate) dimensions: u8,
    pub(crate) subclass_bits: u8,
    pub(crate) masterbook: u8,
    /// None 表示该子类不编码 Y 值
    pub(crate) subclass_books: Vec<Option<u8>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Floor1Config {
    pub(crate) partition_classes: Vec<u8>,
    pub(crate) classes: Vec<Floor1Class>,
    pub(crate) multiplier: u8,
    /// 全部 X 坐标, 前两个为 0 和 2^rangebits
    pub(crate) x_list: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) enum FloorConfig {
    Floor0(Floor0Config),
    Floor1(Floor1Config),
}

#[derive(Debug, Clone)]
pub(crate) struct ResidueConfig {
    pub(crate) residue_type: u8,
    pub(crate) begin: u32,
    pub(crate) end: u32,
    pub(crate) partition_size: u32,
    pub(crate) classifications: u8,
    pub(crate) classbook: u8,
    /// [分类][pass] -> codebook
    pub(crate) books: Vec<[Option<u8>; 8]>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CouplingStep {
    pub(crate) magnitude: u8,
    pub(crate) angle: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct MappingConfig {
    pub(crate) coupling: Vec<CouplingStep>,
    /// 声道 -> submap
    pub(crate) mux: Vec<u8>,
    pub(crate) submap_floor: Vec<u8>,
    pub(crate) submap_residue: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ModeConfig {
    pub(crate) block_flag: bool,
    pub(crate) mapping: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedSetup {
    pub(crate) codebooks: Vec<Codebook>,
    pub(crate) floors: Vec<FloorConfig>,
    pub(crate) residues: Vec<ResidueConfig>,
    pub(crate) mappings: Vec<MappingConfig>,
    pub(crate) modes: Vec<ModeConfig>,
}

pub(crate) fn parse_setup_packet(packet: &[u8], channels: u8) -> TaoResult<ParsedSetup> {
    if packet.len() < 7 || packet[0] != 0x05 || &packet[1..7] != b"vorbis" {
        return Err(TaoError::InvalidData("Vorbis setup 头包标识无效".into()));
    }

    let mut br = LsbBitReader::new(&packet[7..]);
    parse_setup_body(&mut br, channels).map_err(|e| match e {
        TaoError::Eof => TaoError::InvalidData("Vorbis setup 头包被截断".into()),
        other => other,
    })
}

fn parse_setup_body(br: &mut LsbBitReader<'_>, channels: u8) -> TaoResult<ParsedSetup> {
    let codebook_count = br.read_bits(8)? + 1;
    let mut codebooks = Vec::with_capacity(codebook_count as usize);
    for _ in 0..codebook_count {
        let config = parse_codebook(br)?;
        codebooks.push(Codebook::new(config)?);
    }

    let time_count = br.read_bits(6)? + 1;
    for _ in 0..time_count {
        if br.read_bits(16)? != 0 {
            return Err(TaoError::InvalidData(
                "Vorbis time domain transform 必须为 0".into(),
            ));
        }
    }

    let floor_count = br.read_bits(6)? + 1;
    let mut floors = Vec::with_capacity(floor_count as usize);
    for _ in 0..floor_count {
        let floor = match br.read_bits(16)? {
            0 => FloorConfig::Floor0(parse_floor0(br, &codebooks)?),
            1 => FloorConfig::Floor1(parse_floor1(br, &codebooks)?),
            other => {
                return Err(TaoError::InvalidData(format!(
                    "Vorbis floor_type 不支持: {}",
                    other
                )));
            }
        };
        floors.push(floor);
    }

    let residue_count = br.read_bits(6)? + 1;
    let mut residues = Vec::with_capacity(residue_count as usize);
    for _ in 0..residue_count {
        residues.push(parse_residue(br, &codebooks)?);
    }

    let mapping_count = br.read_bits(6)? + 1;
    let mut mappings = Vec::with_capacity(mapping_count as usize);
    for _ in 0..mapping_count {
        mappings.push(parse_mapping(br, channels, floors.len(), residues.len())?);
    }

    let mode_count = br.read_bits(6)? + 1;
    let mut modes = Vec::with_capacity(mode_count as usize);
    for _ in 0..mode_count {
        let block_flag = br.read_flag()?;
        let window_type = br.read_bits(16)?;
        let transform_type = br.read_bits(16)?;
        if window_type != 0 || transform_type != 0 {
            return Err(TaoError::InvalidData(
                "Vorbis mode window/transform 必须为 0".into(),
            ));
        }
        let mapping = br.read_bits(8)?;
        if mapping >= mapping_count {
            return Err(TaoError::InvalidData("Vorbis mode mapping 索引越界".into()));
        }
        modes.push(ModeConfig {
            block_flag,
            mapping: mapping as u8,
        });
    }

    if !br.read_flag()? {
        return Err(TaoError::InvalidData(
            "Vorbis setup 头包 framing_flag 非法".into(),
        ));
    }

    Ok(ParsedSetup {
        codebooks,
        floors,
        residues,
        mappings,
        modes,
    })
}

fn parse_codebook(br: &mut LsbBitReader<'_>) -> TaoResult<CodebookConfig> {
    let sync = br.read_bits(24)?;
    if sync != CODEBOOK_SYNC {
        return Err(TaoError::InvalidData(format!(
            "Vorbis codebook 同步字错误: 0x{sync:06X}",
        )));
    }

    let dimensions = br.read_bits(16)?;
    let entries = br.read_bits(24)?;
    if dimensions == 0 || entries == 0 {
        return Err(TaoError::InvalidData(format!(
            "Vorbis codebook 尺寸非法: dimensions={}, entries={}",
            dimensions, entries
        )));
    }

    let mut lengths = vec![0u8; entries as usize];
    if br.read_flag()? {
        // ordered: 码长递增, 每组给出条目数
        let mut current_entry = 0u32;
        let mut current_length = br.read_bits(5)? + 1;
        while current_entry < entries {
            if current_length > 32 {
                return Err(TaoError::InvalidData(
                    "Vorbis codebook ordered 码长超过 32".into(),
                ));
            }
            let left = entries - current_entry;
            let number = br.read_bits(ilog(left))?;
            if number > left {
                return Err(TaoError::InvalidData(
                    "Vorbis codebook ordered 长度组越界".into(),
                ));
            }
            let start = current_entry as usize;
            lengths[start..start + number as usize].fill(current_length as u8);
            current_entry += number;
            current_length += 1;
        }
    } else {
        let sparse = br.read_flag()?;
        for len in lengths.iter_mut() {
            let used = if sparse { br.read_flag()? } else { true };
            if used {
                *len = (br.read_bits(5)? + 1) as u8;
            }
        }
    }

    let lookup_type = br.read_bits(4)?;
    let lookup = match lookup_type {
        0 => None,
        1 | 2 => {
            let minimum_value = br.read_float32()?;
            let delta_value = br.read_float32()?;
            let value_bits = br.read_bits(4)? + 1;
            let sequence_p = br.read_flag()?;
            let lookup_values = if lookup_type == 1 {
                lookup1_values(entries, dimensions)
            } else {
                entries
                    .checked_mul(dimensions)
                    .ok_or_else(|| TaoError::InvalidData("Vorbis lookup_values 溢出".into()))?
            };
            // 每个值至少 1 位, 超过剩余位数必然截断
            if lookup_values as usize > br.bits_left() {
                return Err(TaoError::Eof);
            }
            let mut multiplicands = Vec::with_capacity(lookup_values as usize);
            for _ in 0..lookup_values {
                multiplicands.push(br.read_bits(value_bits)?);
            }
            Some(CodebookLookupConfig {
                minimum_value,
                delta_value,
                sequence_p,
                lookup_values,
                multiplicands,
            })
        }
        other => {
            return Err(TaoError::InvalidData(format!(
                "Vorbis codebook lookup_type 非法: {}",
                other,
            )));
        }
    };

    Ok(CodebookConfig {
        dimensions: dimensions as u16,
        entries,
        lengths,
        lookup_type: lookup_type as u8,
        lookup,
    })
}

fn check_book(codebooks: &[Codebook], book: u32, need_vq: bool, what: &str) -> TaoResult<u8> {
    let cb = codebooks.get(book as usize).ok_or_else(|| {
        TaoError::InvalidData(format!("Vorbis {} codebook 索引越界: {}", what, book))
    })?;
    if need_vq && !cb.has_lookup() {
        return Err(TaoError::InvalidData(format!(
            "Vorbis {} codebook {} 缺少 VQ 查找表",
            what, book
        )));
    }
    Ok(book as u8)
}

fn parse_floor0(br: &mut LsbBitReader<'_>, codebooks: &[Codebook]) -> TaoResult<Floor0Config> {
    let order = br.read_bits(8)?;
    let rate = br.read_bits(16)?;
    let bark_map_size = br.read_bits(16)?;
    let amplitude_bits = br.read_bits(6)?;
    let amplitude_offset = br.read_bits(8)?;
    if order == 0 || rate == 0 || bark_map_size == 0 {
        return Err(TaoError::InvalidData(format!(
            "Vorbis floor0 参数非法: order={}, rate={}, bark_map_size={}",
            order, rate, bark_map_size
        )));
    }
    let book_count = br.read_bits(4)? + 1;
    let mut books = Vec::with_capacity(book_count as usize);
    for _ in 0..book_count {
        let book = br.read_bits(8)?;
        books.push(check_book(codebooks, book, true, "floor0")?);
    }
    Ok(Floor0Config {
        order: order as u8,
        rate: rate as u16,
        bark_map_size: bark_map_size as u16,
        amplitude_bits: amplitude_bits as u8,
        amplitude_offset: amplitude_offset as u8,
        books,
    })
}

fn parse_floor1(br: &mut LsbBitReader<'_>, codebooks: &[Codebook]) -> TaoResult<Floor1Config> {
    let partitions = br.read_bits(5)?;
    let mut partition_classes = Vec::with_capacity(partitions as usize);
    for _ in 0..partitions {
        partition_classes.push(br.read_bits(4)? as u8);
    }

    let class_count = partition_classes.iter().copied().max().map_or(0, |m| m + 1);
    let mut classes = Vec::with_capacity(class_count as usize);
    for _ in 0..class_count {
        let dimensions = (br.read_bits(3)? + 1) as u8;
        let subclass_bits = br.read_bits(2)? as u8;
        let masterbook = if subclass_bits > 0 {
            check_book(codebooks, br.read_bits(8)?, false, "floor1 master")?
        } else {
            0
        };
        let mut subclass_books = Vec::with_capacity(1 << subclass_bits);
        for _ in 0..(1u32 << subclass_bits) {
            // 存储值减 1, 0 表示不使用
            let raw = br.read_bits(8)?;
            subclass_books.push(if raw == 0 {
                None
            } else {
                Some(check_book(codebooks, raw - 1, false, "floor1 subclass")?)
            });
        }
        classes.push(Floor1Class {
            dimensions,
            subclass_bits,
            masterbook,
            subclass_books,
        });
    }

    let multiplier = (br.read_bits(2)? + 1) as u8;
    let range_bits = br.read_bits(4)?;
    let mut x_list = vec![0u32, 1u32 << range_bits];
    for &class in &partition_classes {
        for _ in 0..classes[class as usize].dimensions {
            x_list.push(br.read_bits(range_bits)?);
            if x_list.len() > FLOOR1_MAX_POINTS {
                return Err(TaoError::InvalidData(
                    "Vorbis floor1 X 坐标数超过 65".into(),
                ));
            }
        }
    }

    let mut sorted = x_list.clone();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(TaoError::InvalidData("Vorbis floor1 X 坐标重复".into()));
    }

    Ok(Floor1Config {
        partition_classes,
        classes,
        multiplier,
        x_list,
    })
}

fn parse_residue(br: &mut LsbBitReader<'_>, codebooks: &[Codebook]) -> TaoResult<ResidueConfig> {
    let residue_type = br.read_bits(16)?;
    if residue_type > 2 {
        return Err(TaoError::InvalidData(format!(
            "Vorbis residue_type 不支持: {}",
            residue_type,
        )));
    }
    let begin = br.read_bits(24)?;
    let end = br.read_bits(24)?;
    let partition_size = br.read_bits(24)? + 1;
    let classifications = br.read_bits(6)? + 1;
    let classbook = check_book(codebooks, br.read_bits(8)?, false, "residue class")?;

    let mut cascades = Vec::with_capacity(classifications as usize);
    for _ in 0..classifications {
        let low_bits = br.read_bits(3)?;
        let high_bits = if br.read_flag()? { br.read_bits(5)? } else { 0 };
        cascades.push((high_bits << 3) | low_bits);
    }

    let mut books = Vec::with_capacity(cascades.len());
    for cascade in cascades {
        let mut passes = [None; 8];
        for (pass, slot) in passes.iter_mut().enumerate() {
            if cascade & (1 << pass) != 0 {
                *slot = Some(check_book(codebooks, br.read_bits(8)?, true, "residue")?);
            }
        }
        books.push(passes);
    }

    Ok(ResidueConfig {
        residue_type: residue_type as u8,
        begin,
        end,
        partition_size,
        classifications: classifications as u8,
        classbook,
        books,
    })
}

fn parse_mapping(
    br: &mut LsbBitReader<'_>,
    channels: u8,
    floor_count: usize,
    residue_count: usize,
) -> TaoResult<MappingConfig> {
    let mapping_type = br.read_bits(16)?;
    if mapping_type != 0 {
        return Err(TaoError::InvalidData(format!(
            "Vorbis mapping_type 不支持: {}",
            mapping_type,
        )));
    }

    let submaps = if br.read_flag()? {
        br.read_bits(4)? + 1
    } else {
        1
    };

    let mut coupling = Vec::new();
    if br.read_flag()? {
        let steps = br.read_bits(8)? + 1;
        let ch_bits = ilog(u32::from(channels) - 1);
        for _ in 0..steps {
            let magnitude = br.read_bits(ch_bits)?;
            let angle = br.read_bits(ch_bits)?;
            if magnitude == angle
                || magnitude >= u32::from(channels)
                || angle >= u32::from(channels)
            {
                return Err(TaoError::InvalidData(format!(
                    "Vorbis coupling 参数非法: magnitude={}, angle={}",
                    magnitude, angle
                )));
            }
            coupling.push(CouplingStep {
                magnitude: magnitude as u8,
                angle: angle as u8,
            });
        }
    }

    if br.read_bits(2)? != 0 {
        return Err(TaoError::InvalidData(
            "Vorbis mapping reserved bits 必须为 0".into(),
        ));
    }

    let mut mux = vec![0u8; usize::from(channels)];
    if submaps > 1 {
        for slot in mux.iter_mut() {
            let value = br.read_bits(4)?;
            if value >= submaps {
                return Err(TaoError::InvalidData("Vorbis mapping mux 值越界".into()));
            }
            *slot = value as u8;
        }
    }

    let mut submap_floor = Vec::with_capacity(submaps as usize);
    let mut submap_residue = Vec::with_capacity(submaps as usize);
    for _ in 0..submaps {
        let _time_submap = br.read_bits(8)?;
        let floor = br.read_bits(8)?;
        let residue = br.read_bits(8)?;
        if floor as usize >= floor_count || residue as usize >= residue_count {
            return Err(TaoError::InvalidData(
                "Vorbis mapping floor/residue 索引越界".into(),
            ));
        }
        submap_floor.push(floor as u8);
        submap_residue.push(residue as u8);
    }

    Ok(MappingConfig {
        coupling,
        mux,
        submap_floor,
        submap_residue,
    })
}

/// 满足 v^dimensions <= entries 的最大 v
pub(crate) fn lookup1_values(entries: u32, dimensions: u32) -> u32 {
    let mut lo = 0u32;
    let mut hi = entries;
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if pow_le(mid, dimensions, entries) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

fn pow_le(base: u32, exp: u32, limit: u32) -> bool {
    let mut out = 1u64;
    for _ in 0..exp {
        out *= u64::from(base);
        if out > u64::from(limit) {
            return false;
        }
    }
    true
}
