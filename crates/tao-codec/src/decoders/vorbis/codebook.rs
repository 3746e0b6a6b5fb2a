//! Vorbis codebook: 码长表构建 Huffman 树, 查找表展开为 VQ 向量.

use tao_core::{TaoError, TaoResult};

use super::bitreader::LsbBitReader;
use super::setup::{CodebookConfig, CodebookLookupConfig};

/// 展开后的 VQ 表上限 (浮点数个数)
const MAX_VQ_VALUES: usize = 1 << 24;

const LEAF: u32 = 0x8000_0000;

#[derive(Debug, Clone)]
pub(crate) struct CodebookHuffman {
    /// 每个内部节点的两个子节点: 0 为空, 最高位置位为叶子
    nodes: Vec<[u32; 2]>,
}

impl CodebookHuffman {
    /// 按 Vorbis 规则为码长表分配码字并建树
    ///
    /// 码字按条目顺序取当前长度下最小的可用值, 高位先出现在位流中.
    pub(crate) fn from_lengths(lengths: &[u8]) -> TaoResult<Self> {
        let used: Vec<usize> = (0..lengths.len()).filter(|&i| lengths[i] > 0).collect();
        // 没有可用条目的 codebook 允许存在, 但不能用于解码
        if used.is_empty() {
            return Ok(Self {
                nodes: vec![[0, 0]],
            });
        }

        // 只有一个条目时读 1 位, 两个分支都指向该条目
        if used.len() == 1 {
            let leaf = LEAF | used[0] as u32;
            return Ok(Self {
                nodes: vec![[leaf, leaf]],
            });
        }

        let mut nodes = vec![[0u32; 2]];
        let mut marker = [0u64; 33];
        for &sym in &used {
            let len = usize::from(lengths[sym]);
            if len > 32 {
                return Err(TaoError::InvalidData(format!(
                    "Vorbis codebook 码长超过 32: {}",
                    len
                )));
            }
            let mut entry = marker[len];
            if entry >> len != 0 {
                return Err(TaoError::InvalidData(
                    "Vorbis codebook Huffman 长度表过度指定".into(),
                ));
            }
            insert_code(&mut nodes, entry, len, sym as u32)?;

            for j in (1..=len).rev() {
                if marker[j] & 1 != 0 {
                    marker[j] = if j == 1 {
                        marker[1] + 1
                    } else {
                        marker[j - 1] << 1
                    };
                    break;
                }
                marker[j] += 1;
            }
            for j in len + 1..33 {
                if marker[j] >> 1 != entry {
                    break;
                }
                entry = marker[j];
                marker[j] = marker[j - 1] << 1;
            }
        }
        Ok(Self { nodes })
    }

    pub(crate) fn decode_symbol(&self, br: &mut LsbBitReader<'_>) -> TaoResult<u32> {
        let mut node = 0usize;
        loop {
            let bit = br.read_bits(1)? as usize;
            let next = self.nodes[node][bit];
            if next & LEAF != 0 {
                return Ok(next & !LEAF);
            }
            if next == 0 {
                return Err(TaoError::InvalidData(
                    "Vorbis codebook 码字不存在".into(),
                ));
            }
            node = next as usize;
        }
    }
}

fn insert_code(nodes: &mut Vec<[u32; 2]>, code: u64, len: usize, sym: u32) -> TaoResult<()> {
    let mut node = 0usize;
    for depth in (0..len).rev() {
        let bit = ((code >> depth) & 1) as usize;
        let child = nodes[node][bit];
        if child & LEAF != 0 {
            return Err(TaoError::InvalidData(
                "Vorbis codebook 码字前缀冲突".into(),
            ));
        }
        if depth == 0 {
            if child != 0 {
                return Err(TaoError::InvalidData(
                    "Vorbis codebook 码字前缀冲突".into(),
                ));
            }
            nodes[node][bit] = LEAF | sym;
            return Ok(());
        }
        node = if child == 0 {
            nodes.push([0, 0]);
            let idx = nodes.len() - 1;
            nodes[node][bit] = idx as u32;
            idx
        } else {
            child as usize
        };
    }
    Ok(())
}

/// 解析完成的 codebook
#[derive(Debug, Clone)]
pub(crate) struct Codebook {
    dimensions: usize,
    entries: u32,
    huffman: CodebookHuffman,
    /// entries * dimensions 个展开值, lookup_type 0 时为空
    vq: Option<Vec<f32>>,
}

impl Codebook {
    pub(crate) fn new(config: CodebookConfig) -> TaoResult<Self> {
        let huffman = CodebookHuffman::from_lengths(&config.lengths)?;
        let dimensions = usize::from(config.dimensions);
        let vq = match &config.lookup {
            Some(lookup) => Some(unpack_vq(&config, lookup)?),
            None => None,
        };
        Ok(Self {
            dimensions,
            entries: config.entries,
            huffman,
            vq,
        })
    }

    pub(crate) fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub(crate) fn entries(&self) -> u32 {
        self.entries
    }

    pub(crate) fn has_lookup(&self) -> bool {
        self.vq.is_some()
    }

    /// 读取一个条目号
    pub(crate) fn decode_scalar(&self, br: &mut LsbBitReader<'_>) -> TaoResult<u32> {
        self.huffman.decode_symbol(br)
    }

    /// 读取一个条目并返回其 VQ 向量
    pub(crate) fn decode_vector(&self, br: &mut LsbBitReader<'_>) -> TaoResult<&[f32]> {
        let vq = self.vq.as_ref().ok_or_else(|| {
            TaoError::InvalidData("Vorbis 向量 codebook 缺少 value mapping".into())
        })?;
        let sym = self.decode_scalar(br)? as usize;
        let start = sym * self.dimensions;
        vq.get(start..start + self.dimensions)
            .ok_or_else(|| TaoError::InvalidData("Vorbis codebook 符号超出 entries".into()))
    }
}

fn unpack_vq(config: &CodebookConfig, lookup: &CodebookLookupConfig) -> TaoResult<Vec<f32>> {
    let dims = usize::from(config.dimensions);
    let entries = config.entries as usize;
    let total = entries
        .checked_mul(dims)
        .filter(|&t| t <= MAX_VQ_VALUES)
        .ok_or_else(|| TaoError::InvalidData("Vorbis codebook VQ 表过大".into()))?;
    if lookup.lookup_values == 0 {
        return Err(TaoError::InvalidData(
            "Vorbis codebook lookup_values 为 0".into(),
        ));
    }

    let values = lookup.lookup_values as u64;
    let mut out = Vec::with_capacity(total);
    for entry in 0..entries {
        let mut last = 0.0f32;
        let mut divisor = 1u64;
        for i in 0..dims {
            let offset = if config.lookup_type == 1 {
                let off = (entry as u64 / divisor) % values;
                divisor = divisor.saturating_mul(values);
                off as usize
            } else {
                entry * dims + i
            };
            let mul = lookup.multiplicands.get(offset).copied().ok_or_else(|| {
                TaoError::InvalidData("Vorbis codebook multiplicand 越界".into())
            })?;
            let v = mul as f32 * lookup.delta_value + lookup.minimum_value + last;
            if lookup.sequence_p {
                last = v;
            }
            out.push(v);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bits(h: &CodebookHuffman, bits: u32) -> u32 {
        let buf = bits.to_le_bytes();
        let mut br = LsbBitReader::new(&buf);
        h.decode_symbol(&mut br).expect("解码失败")
    }

    #[test]
    fn test_huffman_构建与解码() {
        let h = CodebookHuffman::from_lengths(&[1, 2, 2]).expect("构建失败");
        let data = [0b0001_1010u8];
        let mut br = LsbBitReader::new(&data);
        assert_eq!(h.decode_symbol(&mut br).unwrap(), 0);
        assert_eq!(h.decode_symbol(&mut br).unwrap(), 1);
        assert_eq!(h.decode_symbol(&mut br).unwrap(), 2);
    }

    #[test]
    fn test_huffman_码字分配顺序() {
        // 码字: 00, 0100, 0101, 0110, 0111, 10, 110, 111 (位流中高位在前)
        let h = CodebookHuffman::from_lengths(&[2, 4, 4, 4, 4, 2, 3, 3]).expect("构建失败");
        assert_eq!(decode_bits(&h, 0b00), 0);
        assert_eq!(decode_bits(&h, 0b0010), 1);
        assert_eq!(decode_bits(&h, 0b1010), 2);
        assert_eq!(decode_bits(&h, 0b0110), 3);
        assert_eq!(decode_bits(&h, 0b1110), 4);
        assert_eq!(decode_bits(&h, 0b01), 5);
        assert_eq!(decode_bits(&h, 0b011), 6);
        assert_eq!(decode_bits(&h, 0b111), 7);
    }

    #[test]
    fn test_huffman_单条目与稀疏() {
        let h = CodebookHuffman::from_lengths(&[0, 0, 3, 0]).unwrap();
        let data = [0b10u8];
        let mut br = LsbBitReader::new(&data);
        assert_eq!(h.decode_symbol(&mut br).unwrap(), 2);
        assert_eq!(h.decode_symbol(&mut br).unwrap(), 2);
        assert_eq!(br.bits_left(), 6);

        let h = CodebookHuffman::from_lengths(&[1, 0, 1]).unwrap();
        assert_eq!(decode_bits(&h, 1), 2);
    }

    #[test]
    fn test_huffman_过度指定() {
        assert!(CodebookHuffman::from_lengths(&[1, 1, 1]).is_err());
        assert!(CodebookHuffman::from_lengths(&[1, 2, 2, 2]).is_err());
        let empty = CodebookHuffman::from_lengths(&[0, 0]).unwrap();
        assert!(empty.decode_symbol(&mut LsbBitReader::new(&[0])).is_err());
    }

    #[test]
    fn test_huffman_欠指定时缺失码字报错() {
        // 只有 0 和 10, 码字 11 不存在
        let h = CodebookHuffman::from_lengths(&[1, 2]).unwrap();
        assert!(matches!(
            h.decode_symbol(&mut LsbBitReader::new(&[0b11])),
            Err(TaoError::InvalidData(_))
        ));
    }

    fn lookup_config(lookup_type: u8, sequence_p: bool, mults: Vec<u32>, values: u32) -> CodebookConfig {
        CodebookConfig {
            dimensions: 2,
            entries: 4,
            lengths: vec![2, 2, 2, 2],
            lookup_type,
            lookup: Some(CodebookLookupConfig {
                minimum_value: -1.0,
                delta_value: 1.0,
                sequence_p,
                lookup_values: values,
                multiplicands: mults,
            }),
        }
    }

    #[test]
    fn test_vq_lookup1_展开() {
        let book = Codebook::new(lookup_config(1, false, vec![0, 2], 2)).unwrap();
        let vq = book.vq.as_ref().unwrap();
        // 条目 1: 第 0 维取 (1 % 2) = 1, 第 1 维取 (1 / 2 % 2) = 0
        assert_eq!(&vq[2..4], &[1.0, -1.0]);
        assert_eq!(&vq[6..8], &[1.0, 1.0]);
        assert_eq!(book.dimensions(), 2);
        assert_eq!(book.entries(), 4);
    }

    #[test]
    fn test_vq_lookup2_序列累加() {
        let mults = vec![1, 1, 2, 3, 0, 0, 4, 4];
        let book = Codebook::new(lookup_config(2, true, mults, 8)).unwrap();
        let vq = book.vq.as_ref().unwrap();
        assert_eq!(&vq[0..2], &[0.0, 0.0]);
        assert_eq!(&vq[2..4], &[1.0, 3.0]);
        // 码字 "11" 对应条目 3
        let mut br = LsbBitReader::new(&[0b11]);
        assert_eq!(book.decode_vector(&mut br).unwrap(), &[3.0, 6.0]);
    }
}
