//! LHA compression method definitions.
//!
//! The static-Huffman LHA methods (lh4-lh7) share one block format and
//! differ only in dictionary size and in the width of the distance-table
//! count field. [`LhaParams`] carries those two numbers; [`LhaMethod`]
//! provides the standard presets.

use lzstream_core::error::{LzError, Result};

/// LHA constants for decoding.
pub mod constants {
    /// Number of literal/length codes (256 literals + lengths 3..=256).
    pub const NC: usize = 510;
    /// Number of code-length codes.
    pub const NT: usize = 19;
    /// Width of the code-length table count field.
    pub const TBIT: u8 = 5;
    /// Width of the literal/length table count field.
    pub const CBIT: u8 = 9;
    /// Longest Huffman code in any LHA table.
    pub const MAX_CODE_LENGTH: u8 = 16;
    /// Literal/length symbol minus this is the match length.
    pub const LENGTH_OFFSET: u16 = 253;
    /// Smallest distance alphabet any method uses.
    pub const MIN_DISTANCE_CODES: usize = 14;
}

/// Validated LHA stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LhaParams {
    dictionary_bits: u8,
    distance_bits: u8,
}

impl LhaParams {
    /// Create parameters for a dictionary of `1 << dictionary_bits` bytes
    /// whose distance-table count field is `distance_bits` wide.
    ///
    /// `dictionary_bits` must be in 10..=16, `distance_bits` in 4..=5, and
    /// the distance alphabet must fit in the count field.
    pub fn new(dictionary_bits: u8, distance_bits: u8) -> Result<Self> {
        if !(10..=16).contains(&dictionary_bits) {
            return Err(LzError::invalid_parameter(format!(
                "dictionary bits {} outside 10..=16",
                dictionary_bits
            )));
        }
        if !(4..=5).contains(&distance_bits) {
            return Err(LzError::invalid_parameter(format!(
                "distance bits {} outside 4..=5",
                distance_bits
            )));
        }

        let params = Self {
            dictionary_bits,
            distance_bits,
        };
        if params.distance_codes() >= 1 << distance_bits {
            return Err(LzError::invalid_parameter(format!(
                "{} distance codes do not fit a {}-bit count",
                params.distance_codes(),
                distance_bits
            )));
        }
        Ok(params)
    }

    /// Log2 of the dictionary size.
    pub fn dictionary_bits(&self) -> u8 {
        self.dictionary_bits
    }

    /// Width of the distance-table count field.
    pub fn distance_bits(&self) -> u8 {
        self.distance_bits
    }

    /// Dictionary (sliding window) size in bytes.
    pub fn window_size(&self) -> usize {
        1 << self.dictionary_bits
    }

    /// Size of the distance alphabet (`np`).
    pub fn distance_codes(&self) -> usize {
        (usize::from(self.dictionary_bits) + 1).max(constants::MIN_DISTANCE_CODES)
    }
}

impl From<LhaMethod> for LhaParams {
    fn from(method: LhaMethod) -> Self {
        method.params()
    }
}

/// LHA compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LhaMethod {
    /// lh4: 4KB window, static Huffman.
    Lh4,
    /// lh5: 8KB window, static Huffman (most common).
    #[default]
    Lh5,
    /// lh6: 32KB window, static Huffman.
    Lh6,
    /// lh7: 64KB window, static Huffman.
    Lh7,
}

impl LhaMethod {
    /// Parse method from the 5-byte method ID string.
    pub fn from_id(id: &[u8]) -> Option<Self> {
        match id {
            b"-lh4-" => Some(Self::Lh4),
            b"-lh5-" => Some(Self::Lh5),
            b"-lh6-" => Some(Self::Lh6),
            b"-lh7-" => Some(Self::Lh7),
            _ => None,
        }
    }

    /// Get the method ID string.
    pub fn id(&self) -> &'static [u8; 5] {
        match self {
            Self::Lh4 => b"-lh4-",
            Self::Lh5 => b"-lh5-",
            Self::Lh6 => b"-lh6-",
            Self::Lh7 => b"-lh7-",
        }
    }

    /// Stream parameters of this method.
    pub fn params(&self) -> LhaParams {
        let (dictionary_bits, distance_bits) = match self {
            Self::Lh4 => (12, 4),
            Self::Lh5 => (13, 4),
            Self::Lh6 => (15, 5),
            Self::Lh7 => (16, 5),
        };
        LhaParams {
            dictionary_bits,
            distance_bits,
        }
    }

    /// Get the sliding window size in bytes.
    pub fn window_size(&self) -> usize {
        self.params().window_size()
    }

    /// Get the method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lh4 => "lh4",
            Self::Lh5 => "lh5",
            Self::Lh6 => "lh6",
            Self::Lh7 => "lh7",
        }
    }
}

impl std::fmt::Display for LhaMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
