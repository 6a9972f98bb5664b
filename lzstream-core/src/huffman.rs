//! Canonical Huffman decoding trees.
//!
//! Both DEFLATE and LHA transmit Huffman codes as a table of code lengths.
//! [`HuffmanTree::from_lengths`] rebuilds the canonical code (RFC 1951
//! Section 3.2.2) and stores it as a binary trie in an arena. Decoding walks
//! the trie one bit at a time through [`HuffmanTree::walk`], which can stop
//! in the middle of a code when the input runs dry and pick up again later
//! from the saved [`WalkPosition`].
//!
//! Codes are inserted most-significant bit first. That is the order in which
//! both formats emit code bits, independent of how they pack bits into bytes.

use crate::bitstream::BitSource;
use crate::error::{LzError, Result};

/// Maximum code length that fits the code arithmetic below.
pub const MAX_SUPPORTED_CODE_LENGTH: u8 = 24;

/// Index of a node in the arena.
type NodeId = u32;

const ROOT: NodeId = 0;

/// A trie node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    /// Decoded symbol.
    Leaf(u16),
    /// Children for bit 0 and bit 1. A missing child is an invalid code.
    Branch([Option<NodeId>; 2]),
}

/// Position of an in-progress walk.
///
/// The default position is the root of whatever tree it is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkPosition(NodeId);

impl WalkPosition {
    /// Whether no bits of the current code have been consumed yet.
    pub fn is_at_root(&self) -> bool {
        self.0 == ROOT
    }
}

/// A Huffman decoding trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
}

impl HuffmanTree {
    /// Build a tree from canonical code lengths.
    ///
    /// `lengths[symbol]` is the code length of `symbol`, 0 meaning unused.
    ///
    /// - Lengths above `max_code_length` and over-subscribed tables are
    ///   rejected.
    /// - Incomplete tables are accepted; walking into a missing branch fails.
    /// - A table with no used symbol gives a tree that rejects every code.
    /// - A table whose only used symbol has length 1 gives
    ///   [`HuffmanTree::single_bit`].
    pub fn from_lengths(lengths: &[u8], max_code_length: u8) -> Result<Self> {
        if max_code_length == 0 || max_code_length > MAX_SUPPORTED_CODE_LENGTH {
            return Err(LzError::invalid_parameter(format!(
                "maximum code length {} outside 1..={}",
                max_code_length, MAX_SUPPORTED_CODE_LENGTH
            )));
        }
        if lengths.len() > usize::from(u16::MAX) {
            return Err(LzError::invalid_parameter("alphabet too large"));
        }

        let max = usize::from(max_code_length);
        let mut bl_count = vec![0u32; max + 1];
        let mut used = 0usize;
        let mut last_used = 0usize;
        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            if len > max_code_length {
                return Err(LzError::invalid_code_lengths(format!(
                    "code length {} exceeds maximum {}",
                    len, max_code_length
                )));
            }
            bl_count[usize::from(len)] += 1;
            used += 1;
            last_used = symbol;
        }

        match used {
            0 => return Ok(Self::empty()),
            1 if lengths[last_used] == 1 => return Ok(Self::single_bit(last_used as u16)),
            _ => {}
        }

        // Kraft check: the remaining code space may never go negative.
        let mut left: i64 = 1;
        for &count in &bl_count[1..] {
            left = (left << 1) - i64::from(count);
            if left < 0 {
                return Err(LzError::invalid_code_lengths("over-subscribed code"));
            }
        }

        let mut next_code = vec![0u32; max + 1];
        let mut code = 0u32;
        for bits in 1..=max {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }

        let mut tree = Self {
            nodes: Vec::with_capacity(used * 2),
        };
        tree.nodes.push(Node::Branch([None, None]));

        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let code = next_code[usize::from(len)];
            next_code[usize::from(len)] += 1;
            tree.insert(code, len, symbol as u16)?;
        }

        Ok(tree)
    }

    /// A tree whose root is the leaf `value`.
    ///
    /// Walking it yields `value` without consuming any bits.
    pub fn single(value: u16) -> Self {
        Self {
            nodes: vec![Node::Leaf(value)],
        }
    }

    /// A single-symbol tree that still consumes one bit per symbol.
    ///
    /// Both branches of the root lead to `value`.
    pub fn single_bit(value: u16) -> Self {
        Self {
            nodes: vec![Node::Branch([Some(1), Some(1)]), Node::Leaf(value)],
        }
    }

    fn empty() -> Self {
        Self {
            nodes: vec![Node::Branch([None, None])],
        }
    }

    /// Insert `code` of `len` bits, walking from the most significant bit.
    fn insert(&mut self, code: u32, len: u8, value: u16) -> Result<()> {
        let mut node = ROOT;
        for shift in (0..len).rev() {
            let bit = ((code >> shift) & 1) as usize;
            let Node::Branch(children) = self.nodes[node as usize] else {
                return Err(LzError::invalid_code_lengths("code is prefixed by another"));
            };
            let is_last = shift == 0;

            node = match children[bit] {
                Some(_) if is_last => {
                    return Err(LzError::invalid_code_lengths("duplicate code"));
                }
                Some(child) => child,
                None => {
                    let child = self.nodes.len() as NodeId;
                    self.nodes.push(if is_last {
                        Node::Leaf(value)
                    } else {
                        Node::Branch([None, None])
                    });
                    if let Node::Branch(children) = &mut self.nodes[node as usize] {
                        children[bit] = Some(child);
                    }
                    child
                }
            };
        }
        Ok(())
    }

    /// Decode one symbol, resuming from `position`.
    ///
    /// Returns `Ok(Some(symbol))` and resets `position` to the root once a
    /// leaf is reached. Returns `Ok(None)` if `bits` ran dry; `position` then
    /// records how far the walk got so the next call continues from there.
    /// Fails if the bits lead to a missing branch.
    #[inline]
    pub fn walk<B: BitSource + ?Sized>(
        &self,
        position: &mut WalkPosition,
        bits: &mut B,
    ) -> Result<Option<u16>> {
        let mut node = position.0;
        loop {
            match self.nodes[node as usize] {
                Node::Leaf(value) => {
                    *position = WalkPosition::default();
                    return Ok(Some(value));
                }
                Node::Branch(children) => {
                    let Some(bit) = bits.try_read_bit()? else {
                        position.0 = node;
                        return Ok(None);
                    };
                    match children[usize::from(bit)] {
                        Some(child) => node = child,
                        None => {
                            *position = WalkPosition::default();
                            return Err(LzError::invalid_huffman(bits.bit_position()));
                        }
                    }
                }
            }
        }
    }

    /// Number of distinct leaves (decodable symbols).
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    /// Whether the tree decodes no symbol at all.
    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }
}
