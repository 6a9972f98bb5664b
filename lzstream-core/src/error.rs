//! Error types for lzstream decoders.
//!
//! Every decoder in the workspace reports failures through [`LzError`].
//! Errors fall into three groups:
//!
//! - **Format errors**: the compressed stream violates the format.
//! - **Truncation**: the source ended while more bits were required.
//! - **I/O errors**: the source itself failed.
//!
//! A source that merely has no bytes available right now is not an error;
//! decoders surface it as a short (possibly empty) `produce` result.
//! All errors are fatal to the decoding session.

use std::io;
use thiserror::Error;

/// The main error type for lzstream operations.
#[derive(Debug, Error)]
pub enum LzError {
    /// I/O error from the underlying source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// DEFLATE block type 3 (reserved).
    #[error("Invalid block type {block_type}")]
    InvalidBlockType {
        /// The block type read from the header.
        block_type: u8,
    },

    /// A Huffman walk reached a branch with no child.
    #[error("Invalid Huffman code at bit position {bit_position}")]
    InvalidHuffmanCode {
        /// Bit position where the invalid code was found.
        bit_position: u64,
    },

    /// Stored block LEN does not match the complement of NLEN.
    #[error("Stored block length mismatch: LEN={len:#06x}, NLEN={nlen:#06x}")]
    StoredLengthMismatch {
        /// LEN field.
        len: u16,
        /// NLEN field.
        nlen: u16,
    },

    /// Back-reference reaching before the start of the produced output.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: usize,
        /// Bytes of history currently available.
        history_size: usize,
    },

    /// Code-length repeat symbol with no previous length to repeat.
    #[error("Repeat of previous code length with no previous length")]
    RepeatWithoutPrevious,

    /// Code-length table does not describe a usable prefix code.
    #[error("Invalid code lengths: {message}")]
    InvalidCodeLengths {
        /// Description of the problem.
        message: String,
    },

    /// Any other structural violation of the stream.
    #[error("Corrupted data at bit position {bit_position}: {message}")]
    CorruptedData {
        /// Bit position where corruption was detected.
        bit_position: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Rejected decoder configuration.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the rejected value.
        message: String,
    },

    /// The source reached its end while the stream required more bits.
    #[error("Unexpected end of input at bit position {bit_position}")]
    UnexpectedEof {
        /// Bit position at which more input was required.
        bit_position: u64,
    },

    /// The decoder was used again after a fatal error.
    #[error("Decoder used after a previous fatal error")]
    Poisoned,
}

/// Result type alias for lzstream operations.
pub type Result<T> = std::result::Result<T, LzError>;

impl LzError {
    /// Create an invalid block type error.
    pub fn invalid_block_type(block_type: u8) -> Self {
        Self::InvalidBlockType { block_type }
    }

    /// Create an invalid Huffman code error.
    pub fn invalid_huffman(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Create a stored length mismatch error.
    pub fn stored_length_mismatch(len: u16, nlen: u16) -> Self {
        Self::StoredLengthMismatch { len, nlen }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create an invalid code lengths error.
    pub fn invalid_code_lengths(message: impl Into<String>) -> Self {
        Self::InvalidCodeLengths {
            message: message.into(),
        }
    }

    /// Create a corrupted data error.
    pub fn corrupted(bit_position: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            bit_position,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create an unexpected EOF (truncation) error.
    pub fn unexpected_eof(bit_position: u64) -> Self {
        Self::UnexpectedEof { bit_position }
    }

    /// Whether this error means the compressed data is malformed.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBlockType { .. }
                | Self::InvalidHuffmanCode { .. }
                | Self::StoredLengthMismatch { .. }
                | Self::InvalidDistance { .. }
                | Self::RepeatWithoutPrevious
                | Self::InvalidCodeLengths { .. }
                | Self::CorruptedData { .. }
        )
    }

    /// Whether this error means the input ended too early.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

impl From<LzError> for io::Error {
    fn from(err: LzError) -> Self {
        match err {
            LzError::Io(e) => e,
            LzError::UnexpectedEof { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            LzError::InvalidParameter { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            LzError::Poisoned => io::Error::other(err),
            _ => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}
