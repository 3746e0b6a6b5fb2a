//! Vorbis residue 解码 (type 0 / 1 / 2).
//!
//! 分区分类号由 classbook 读出, 每个 pass 按分类选择 VQ codebook 把向量累加到频谱.
//! 包尾截断不算错误: 已解码部分保留, 其余保持为 0.

use tao_core::{TaoError, TaoResult};

use super::bitreader::LsbBitReader;
use super::codebook::Codebook;
use super::setup::ResidueConfig;

/// 解码一个 submap 的 residue
///
/// `vectors` 为参与该 submap 的声道频谱 (长度均为 n), 调用前应已清零.
/// `do_not_decode[i]` 为 true 的声道不读取数据.
pub(crate) fn decode_residue(
    br: &mut LsbBitReader<'_>,
    cfg: &ResidueConfig,
    codebooks: &[Codebook],
    vectors: &mut [&mut [f32]],
    do_not_decode: &[bool],
) -> TaoResult<()> {
    let result = if cfg.residue_type == 2 {
        decode_type2(br, cfg, codebooks, vectors, do_not_decode)
    } else {
        decode_partitions(br, cfg, codebooks, vectors, do_not_decode)
    };
    match result {
        Err(TaoError::Eof) => Ok(()),
        other => other,
    }
}

/// type 2: 所有声道交织为一个向量按 type 1 解码, 再拆回各声道
fn decode_type2(
    br: &mut LsbBitReader<'_>,
    cfg: &ResidueConfig,
    codebooks: &[Codebook],
    vectors: &mut [&mut [f32]],
    do_not_decode: &[bool],
) -> TaoResult<()> {
    if do_not_decode.iter().all(|&d| d) {
        return Ok(());
    }
    let ch = vectors.len();
    let n = vectors.first().map_or(0, |v| v.len());
    let mut interleaved = vec![0.0f32; n * ch];
    let result = {
        let mut single: [&mut [f32]; 1] = [interleaved.as_mut_slice()];
        decode_partitions(br, cfg, codebooks, &mut single, &[false])
    };
    for (i, frame) in interleaved.chunks_exact(ch).enumerate() {
        for (v, &s) in vectors.iter_mut().zip(frame) {
            v[i] = s;
        }
    }
    result
}

fn decode_partitions(
    br: &mut LsbBitReader<'_>,
    cfg: &ResidueConfig,
    codebooks: &[Codebook],
    vectors: &mut [&mut [f32]],
    do_not_decode: &[bool],
) -> TaoResult<()> {
    let actual_size = vectors.first().map_or(0, |v| v.len());
    let begin = (cfg.begin as usize).min(actual_size);
    let end = (cfg.end as usize).min(actual_size);
    let psize = cfg.partition_size as usize;
    let partitions = end.saturating_sub(begin) / psize;
    if partitions == 0 {
        return Ok(());
    }

    let classbook = &codebooks[usize::from(cfg.classbook)];
    let classwords = classbook.dimensions();
    let class_count = u32::from(cfg.classifications);
    let mut classes = vec![vec![0u8; partitions + classwords]; vectors.len()];

    for pass in 0..8 {
        let mut partition = 0usize;
        while partition < partitions {
            if pass == 0 {
                for (ch, class_row) in classes.iter_mut().enumerate() {
                    if do_not_decode[ch] {
                        continue;
                    }
                    let mut temp = classbook.decode_scalar(br)?;
                    for slot in class_row[partition..partition + classwords].iter_mut().rev() {
                        *slot = (temp % class_count) as u8;
                        temp /= class_count;
                    }
                }
            }

            for _ in 0..classwords {
                if partition >= partitions {
                    break;
                }
                for (ch, vector) in vectors.iter_mut().enumerate() {
                    if do_not_decode[ch] {
                        continue;
                    }
                    let class = usize::from(classes[ch][partition]);
                    let Some(book) = cfg.books[class][pass] else {
                        continue;
                    };
                    let book = &codebooks[usize::from(book)];
                    let offset = begin + partition * psize;
                    let target = &mut vector[offset..offset + psize];
                    if cfg.residue_type == 0 {
                        decode_interleaved_partition(br, book, target)?;
                    } else {
                        decode_sequential_partition(br, book, target)?;
                    }
                }
                partition += 1;
            }
        }
    }
    Ok(())
}

/// type 0: 每个向量的各维按步长 psize/dims 分散写入
fn decode_interleaved_partition(
    br: &mut LsbBitReader<'_>,
    book: &Codebook,
    target: &mut [f32],
) -> TaoResult<()> {
    let dims = book.dimensions();
    let step = target.len() / dims;
    for i in 0..step {
        let vector = book.decode_vector(br)?;
        for (j, &v) in vector.iter().enumerate() {
            target[i + j * step] += v;
        }
    }
    Ok(())
}

/// type 1 / 2: 向量各维顺序写入
fn decode_sequential_partition(
    br: &mut LsbBitReader<'_>,
    book: &Codebook,
    target: &mut [f32],
) -> TaoResult<()> {
    let mut i = 0usize;
    while i < target.len() {
        let vector = book.decode_vector(br)?;
        for &v in vector {
            if i >= target.len() {
                break;
            }
            target[i] += v;
            i += 1;
        }
    }
    Ok(())
}
