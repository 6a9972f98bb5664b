//! Code tables for DEFLATE (RFC 1951) and Deflate64.
//!
//! Deflate64 keeps the DEFLATE block structure and changes three table
//! entries: length symbol 285 takes 16 extra bits over base 3, and distance
//! codes 30 and 31 become valid, reaching back up to 64 KiB.

use lzstream_core::huffman::HuffmanTree;
use std::sync::OnceLock;

/// Longest code in any DEFLATE Huffman table.
pub const MAX_CODE_LENGTH: u8 = 15;

/// Longest code in the code-length alphabet (lengths are sent in 3 bits).
pub const MAX_CODE_LENGTH_CODE_LENGTH: u8 = 7;

/// Number of symbols in the code-length alphabet.
pub const CODE_LENGTH_CODES: usize = 19;

/// Largest HLIT a dynamic block may declare.
pub const MAX_LITLEN_CODES: usize = 286;

/// End-of-block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Order of code length codes in dynamic block header.
///
/// Code length codes are transmitted in this order (RFC 1951 Section 3.2.7).
pub const CODE_LENGTH_ORDER: [usize; CODE_LENGTH_CODES] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Length code base values (RFC 1951 Section 3.2.5).
///
/// For length codes 257-285, this gives the base length value.
/// Extra bits are added to get the final length.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // 257-264: 0 extra bits
    11, 13, 15, 17, // 265-268: 1 extra bit
    19, 23, 27, 31, // 269-272: 2 extra bits
    35, 43, 51, 59, // 273-276: 3 extra bits
    67, 83, 99, 115, // 277-280: 4 extra bits
    131, 163, 195, 227, // 281-284: 5 extra bits
    258, // 285: 0 extra bits (Deflate64: base 3, 16 extra bits)
];

/// Number of extra bits for length codes 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, // 257-264
    1, 1, 1, 1, // 265-268
    2, 2, 2, 2, // 269-272
    3, 3, 3, 3, // 273-276
    4, 4, 4, 4, // 277-280
    5, 5, 5, 5, // 281-284
    0, // 285
];

/// Distance code base values.
///
/// Codes 0-29 are RFC 1951 Section 3.2.5; codes 30-31 exist only in
/// Deflate64.
pub const DISTANCE_BASE: [u32; 32] = [
    1, 2, 3, 4, // 0-3: 0 extra bits
    5, 7, // 4-5: 1 extra bit
    9, 13, // 6-7: 2 extra bits
    17, 25, // 8-9: 3 extra bits
    33, 49, // 10-11: 4 extra bits
    65, 97, // 12-13: 5 extra bits
    129, 193, // 14-15: 6 extra bits
    257, 385, // 16-17: 7 extra bits
    513, 769, // 18-19: 8 extra bits
    1025, 1537, // 20-21: 9 extra bits
    2049, 3073, // 22-23: 10 extra bits
    4097, 6145, // 24-25: 11 extra bits
    8193, 12289, // 26-27: 12 extra bits
    16385, 24577, // 28-29: 13 extra bits
    32769, 49153, // 30-31: 14 extra bits (Deflate64)
];

/// Number of extra bits for distance codes 0-31.
pub const DISTANCE_EXTRA_BITS: [u8; 32] = [
    0, 0, 0, 0, // 0-3
    1, 1, // 4-5
    2, 2, // 6-7
    3, 3, // 8-9
    4, 4, // 10-11
    5, 5, // 12-13
    6, 6, // 14-15
    7, 7, // 16-17
    8, 8, // 18-19
    9, 9, // 20-21
    10, 10, // 22-23
    11, 11, // 24-25
    12, 12, // 26-27
    13, 13, // 28-29
    14, 14, // 30-31
];

/// Which member of the DEFLATE family a stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeflateVariant {
    /// RFC 1951 DEFLATE, 32 KiB window.
    #[default]
    Deflate,
    /// Deflate64 ("enhanced deflate", ZIP method 9), 64 KiB window.
    Deflate64,
}

impl DeflateVariant {
    /// Base-2 logarithm of the window size.
    pub fn window_bits(self) -> u8 {
        match self {
            Self::Deflate => 15,
            Self::Deflate64 => 16,
        }
    }

    /// Largest HDIST a dynamic block may declare.
    pub fn max_distance_codes(self) -> usize {
        match self {
            Self::Deflate => 30,
            Self::Deflate64 => 32,
        }
    }

    /// Base length and extra-bit count for a length symbol (257-285).
    ///
    /// Returns `None` for symbols that carry no length.
    pub fn length_code(self, symbol: u16) -> Option<(u32, u8)> {
        match (self, symbol) {
            (Self::Deflate64, 285) => Some((3, 16)),
            (_, 257..=285) => {
                let index = usize::from(symbol - 257);
                Some((u32::from(LENGTH_BASE[index]), LENGTH_EXTRA_BITS[index]))
            }
            _ => None,
        }
    }

    /// Base distance and extra-bit count for a distance code.
    ///
    /// Returns `None` for codes this variant does not define.
    pub fn distance_code(self, code: u16) -> Option<(u32, u8)> {
        let index = usize::from(code);
        if index >= self.max_distance_codes() {
            return None;
        }
        Some((DISTANCE_BASE[index], DISTANCE_EXTRA_BITS[index]))
    }

    /// Short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Deflate => "deflate",
            Self::Deflate64 => "deflate64",
        }
    }
}

impl std::fmt::Display for DeflateVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fixed literal/length code lengths (RFC 1951 Section 3.2.6).
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
pub fn fixed_litlen_lengths() -> [u8; 288] {
    let mut lengths = [8u8; 288];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Fixed distance code lengths (RFC 1951 Section 3.2.6).
///
/// All 32 codes use 5 bits. Codes 30 and 31 only decode under Deflate64.
pub fn fixed_distance_lengths() -> [u8; 32] {
    [5u8; 32]
}

/// Get the fixed literal/length Huffman tree.
///
/// This tree is cached after first construction.
pub fn fixed_litlen_tree() -> &'static HuffmanTree {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();

    TREE.get_or_init(|| {
        HuffmanTree::from_lengths(&fixed_litlen_lengths(), MAX_CODE_LENGTH)
            .expect("Fixed litlen tree construction should never fail")
    })
}

/// Get the fixed distance Huffman tree.
///
/// This tree is cached after first construction.
pub fn fixed_distance_tree() -> &'static HuffmanTree {
    static TREE: OnceLock<HuffmanTree> = OnceLock::new();

    TREE.get_or_init(|| {
        HuffmanTree::from_lengths(&fixed_distance_lengths(), MAX_CODE_LENGTH)
            .expect("Fixed distance tree construction should never fail")
    })
}
