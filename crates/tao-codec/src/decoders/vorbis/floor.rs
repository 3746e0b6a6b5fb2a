//! Vorbis floor: 频谱包络的解码与合成.
//!
//! 解码分两步: 先从位流读出每声道的 floor 参数 (`decode_floor`),
//! 等 residue 与声道耦合完成后, 再把包络曲线乘到频谱上 (`apply_floor`).

use std::f32::consts::PI;
use std::sync::OnceLock;

use tao_core::TaoResult;

use super::bitreader::{LsbBitReader, ilog};
use super::codebook::Codebook;
use super::setup::{Floor0Config, Floor1Config, FloorConfig};

const FLOOR1_RANGES: [i32; 4] = [256, 128, 86, 64];

/// 一个声道本包的 floor 参数
#[derive(Debug, Clone)]
pub(crate) enum FloorData {
    /// 本声道本包静音
    Unused,
    Floor0 { amplitude: u32, coefficients: Vec<f32> },
    Floor1 { y: Vec<i32> },
}

impl FloorData {
    pub(crate) fn is_unused(&self) -> bool {
        matches!(self, FloorData::Unused)
    }
}

/// 读取一个声道的 floor 参数
///
/// 数据不足时返回 `TaoError::Eof`, 调用方按未使用处理.
pub(crate) fn decode_floor(
    br: &mut LsbBitReader<'_>,
    floor: &FloorConfig,
    codebooks: &[Codebook],
) -> TaoResult<FloorData> {
    match floor {
        FloorConfig::Floor0(cfg) => decode_floor0(br, cfg, codebooks),
        FloorConfig::Floor1(cfg) => decode_floor1(br, cfg, codebooks),
    }
}

fn decode_floor0(
    br: &mut LsbBitReader<'_>,
    cfg: &Floor0Config,
    codebooks: &[Codebook],
) -> TaoResult<FloorData> {
    let amplitude = br.read_bits(u32::from(cfg.amplitude_bits))?;
    if amplitude == 0 {
        return Ok(FloorData::Unused);
    }
    let book_number = br.read_bits(ilog(cfg.books.len() as u32))? as usize;
    let Some(&book) = cfg.books.get(book_number) else {
        return Ok(FloorData::Unused);
    };
    let book = &codebooks[usize::from(book)];

    let order = usize::from(cfg.order);
    let mut coefficients = Vec::with_capacity(order + book.dimensions());
    let mut last = 0.0f32;
    while coefficients.len() < order {
        let vector = book.decode_vector(br)?;
        for &v in vector {
            coefficients.push(v + last);
        }
        last = coefficients.last().copied().unwrap_or(0.0);
    }
    coefficients.truncate(order);
    Ok(FloorData::Floor0 {
        amplitude,
        coefficients,
    })
}

fn decode_floor1(
    br: &mut LsbBitReader<'_>,
    cfg: &Floor1Config,
    codebooks: &[Codebook],
) -> TaoResult<FloorData> {
    if !br.read_flag()? {
        return Ok(FloorData::Unused);
    }

    let range = FLOOR1_RANGES[usize::from(cfg.multiplier - 1)];
    let range_bits = ilog(range as u32 - 1);
    let mut y = Vec::with_capacity(cfg.x_list.len());
    y.push(br.read_bits(range_bits)? as i32);
    y.push(br.read_bits(range_bits)? as i32);

    for &class_idx in &cfg.partition_classes {
        let class = &cfg.classes[usize::from(class_idx)];
        let csub = (1u32 << class.subclass_bits) - 1;
        let mut cval = if class.subclass_bits > 0 {
            codebooks[usize::from(class.masterbook)].decode_scalar(br)?
        } else {
            0
        };
        for _ in 0..class.dimensions {
            let book = class.subclass_books[(cval & csub) as usize];
            cval >>= class.subclass_bits;
            y.push(match book {
                Some(b) => codebooks[usize::from(b)].decode_scalar(br)? as i32,
                None => 0,
            });
        }
    }
    Ok(FloorData::Floor1 { y })
}

/// 把 floor 曲线乘到频谱上, 未使用的 floor 把频谱清零
pub(crate) fn apply_floor(floor: &FloorConfig, data: &FloorData, spectrum: &mut [f32]) {
    match (floor, data) {
        (FloorConfig::Floor0(cfg), FloorData::Floor0 {
            amplitude,
            coefficients,
        }) => apply_floor0(cfg, *amplitude, coefficients, spectrum),
        (FloorConfig::Floor1(cfg), FloorData::Floor1 { y }) => apply_floor1(cfg, y, spectrum),
        _ => spectrum.fill(0.0),
    }
}

fn bark(x: f32) -> f32 {
    13.1 * (0.00074 * x).atan() + 2.24 * (0.000_000_018_5 * x * x).atan() + 0.0001 * x
}

fn apply_floor0(cfg: &Floor0Config, amplitude: u32, coefficients: &[f32], spectrum: &mut [f32]) {
    let n = spectrum.len();
    let rate = f32::from(cfg.rate);
    let bark_size = f32::from(cfg.bark_map_size);
    let bark_max = i32::from(cfg.bark_map_size) - 1;
    let scale = bark_size / bark(0.5 * rate);
    let map: Vec<i32> = (0..n)
        .map(|i| {
            let b = (bark(rate * i as f32 / (2.0 * n as f32)) * scale).floor() as i32;
            b.min(bark_max)
        })
        .collect();

    let cos_coef: Vec<f32> = coefficients.iter().map(|c| c.cos()).collect();
    let order = cos_coef.len();
    let amp_max = ((1u64 << cfg.amplitude_bits) - 1) as f32;
    let amp_offset = f32::from(cfg.amplitude_offset);

    let mut i = 0usize;
    while i < n {
        let omega = PI * map[i] as f32 / bark_size;
        let cos_w = omega.cos();
        let mut p = 1.0f32;
        let mut q = 1.0f32;
        for (j, &c) in cos_coef.iter().enumerate() {
            let d = 4.0 * (c - cos_w) * (c - cos_w);
            if j % 2 == 1 {
                p *= d;
            } else {
                q *= d;
            }
        }
        if order % 2 == 1 {
            p *= 1.0 - cos_w * cos_w;
            q *= 0.25;
        } else {
            p *= (1.0 - cos_w) / 2.0;
            q *= (1.0 + cos_w) / 2.0;
        }

        let value = (0.115_129_25
            * (amplitude as f32 * amp_offset / (amp_max * (p + q).sqrt()) - amp_offset))
            .exp();
        let bark_idx = map[i];
        while i < n && map[i] == bark_idx {
            spectrum[i] *= value;
            i += 1;
        }
    }
}

/// floor1 的 dB -> 线性幅度表, 第 i 项为 1.0649863^(i - 255)
fn inverse_db_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = 1.064_986_3f64.powi(i as i32 - 255) as f32;
        }
        table
    })
}

fn low_neighbor(x_list: &[u32], idx: usize) -> usize {
    let x = x_list[idx];
    let mut best = 0usize;
    for (n, &v) in x_list.iter().enumerate().take(idx) {
        if v < x && (v > x_list[best] || x_list[best] >= x) {
            best = n;
        }
    }
    best
}

fn high_neighbor(x_list: &[u32], idx: usize) -> usize {
    let x = x_list[idx];
    let mut best = 1usize;
    for (n, &v) in x_list.iter().enumerate().take(idx) {
        if v > x && (v < x_list[best] || x_list[best] <= x) {
            best = n;
        }
    }
    best
}

fn render_point(x0: i32, y0: i32, x1: i32, y1: i32, x: i32) -> i32 {
    let dy = y1 - y0;
    let adx = x1 - x0;
    if adx == 0 {
        return y0;
    }
    let off = dy.abs() * (x - x0) / adx;
    if dy < 0 { y0 - off } else { y0 + off }
}

/// 在 [x0, x1) 上按整数 Bresenham 画线
fn render_line(x0: i32, y0: i32, x1: i32, y1: i32, out: &mut [i32]) {
    let dy = y1 - y0;
    let adx = x1 - x0;
    if adx <= 0 {
        return;
    }
    let base = dy / adx;
    let sy = if dy < 0 { base - 1 } else { base + 1 };
    let ady = dy.abs() - base.abs() * adx;
    let mut y = y0;
    let mut err = 0;
    if let Some(v) = out.get_mut(x0 as usize) {
        *v = y;
    }
    for x in (x0 + 1)..x1 {
        let Some(v) = out.get_mut(x as usize) else {
            break;
        };
        err += ady;
        if err >= adx {
            err -= adx;
            y += sy;
        } else {
            y += base;
        }
        *v = y;
    }
}

/// 由读出的 Y 值预测并还原各点的最终幅度, 返回 (final_y, step2)
fn synthesize_amplitudes(cfg: &Floor1Config, y: &[i32]) -> (Vec<i32>, Vec<bool>) {
    let range = FLOOR1_RANGES[usize::from(cfg.multiplier - 1)];
    let count = cfg.x_list.len().min(y.len());
    let mut final_y = vec![0i32; count];
    let mut step2 = vec![false; count];
    final_y[0] = y[0];
    final_y[1] = y[1];
    step2[0] = true;
    step2[1] = true;

    for i in 2..count {
        let low = low_neighbor(&cfg.x_list, i);
        let high = high_neighbor(&cfg.x_list, i);
        let predicted = render_point(
            cfg.x_list[low] as i32,
            final_y[low],
            cfg.x_list[high] as i32,
            final_y[high],
            cfg.x_list[i] as i32,
        );
        let val = y[i];
        let high_room = range - predicted;
        let low_room = predicted;
        let room = high_room.min(low_room) * 2;
        if val == 0 {
            final_y[i] = predicted;
            continue;
        }
        step2[low] = true;
        step2[high] = true;
        step2[i] = true;
        final_y[i] = if val >= room {
            if high_room > low_room {
                val - low_room + predicted
            } else {
                predicted - val + high_room - 1
            }
        } else if val % 2 == 1 {
            predicted - (val + 1) / 2
        } else {
            predicted + val / 2
        };
    }
    (final_y, step2)
}

fn apply_floor1(cfg: &Floor1Config, y: &[i32], spectrum: &mut [f32]) {
    let n = spectrum.len();
    let multiplier = i32::from(cfg.multiplier);
    let (final_y, step2) = synthesize_amplitudes(cfg, y);

    let mut order: Vec<usize> = (0..final_y.len()).collect();
    order.sort_by_key(|&i| cfg.x_list[i]);

    let mut curve = vec![0i32; n];
    let mut lx = 0i32;
    let mut ly = final_y[order[0]] * multiplier;
    let mut hx = 0i32;
    let mut hy = ly;
    for &i in order.iter().skip(1) {
        if step2[i] {
            hy = final_y[i] * multiplier;
            hx = cfg.x_list[i] as i32;
            render_line(lx, ly, hx, hy, &mut curve);
            lx = hx;
            ly = hy;
        }
    }
    if (hx as usize) < n {
        render_line(hx, hy, n as i32, hy, &mut curve);
    }

    let table = inverse_db_table();
    for (s, &c) in spectrum.iter_mut().zip(&curve) {
        *s *= table[c.clamp(0, 255) as usize];
    }
}
