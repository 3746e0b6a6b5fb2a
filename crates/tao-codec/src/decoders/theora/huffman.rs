//! DCT token Huffman 树.
//!
//! setup 头包以前序遍历方式描述每棵树: 位 0 表示内部节点, 位 1 表示叶子,
//! 叶子后跟 5 位 token 值.

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

/// 码字最大长度
const MAX_DEPTH: u32 = 32;
/// 每棵树最多叶子数 (token 取值 0..32)
const MAX_LEAVES: usize = 32;

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf(u8),
    /// 子节点下标: (位 0, 位 1)
    Branch(u16, u16),
}

/// 一棵 Huffman 树
#[derive(Debug, Clone)]
pub(crate) struct HuffmanTable {
    nodes: Vec<Node>,
}

impl HuffmanTable {
    /// 从 setup 头包读取一棵树
    pub(crate) fn read(br: &mut BitReader) -> TaoResult<Self> {
        let mut table = Self { nodes: Vec::new() };
        let mut leaves = 0usize;
        table.read_node(br, 0, &mut leaves)?;
        Ok(table)
    }

    fn read_node(&mut self, br: &mut BitReader, depth: u32, leaves: &mut usize) -> TaoResult<u16> {
        let short = |_| TaoError::InvalidData("Theora Huffman 树数据不足".into());
        let idx = self.nodes.len();
        if br.read_bit().map_err(short)? == 1 {
            *leaves += 1;
            if *leaves > MAX_LEAVES {
                return Err(TaoError::InvalidData("Theora Huffman 树叶子过多".into()));
            }
            let token = br.read_bits(5).map_err(short)? as u8;
            self.nodes.push(Node::Leaf(token));
        } else {
            if depth >= MAX_DEPTH {
                return Err(TaoError::InvalidData("Theora Huffman 树深度超过 32".into()));
            }
            self.nodes.push(Node::Branch(0, 0));
            let zero = self.read_node(br, depth + 1, leaves)?;
            let one = self.read_node(br, depth + 1, leaves)?;
            self.nodes[idx] = Node::Branch(zero, one);
        }
        Ok(idx as u16)
    }

    /// 解码一个 token
    ///
    /// 根节点即叶子时码长为 0, 不消耗任何位.
    pub(crate) fn decode(&self, br: &mut BitReader) -> u8 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                Node::Leaf(token) => return token,
                Node::Branch(zero, one) => {
                    idx = if br.read_bit_padded() == 0 {
                        usize::from(zero)
                    } else {
                        usize::from(one)
                    };
                }
            }
        }
    }
}
