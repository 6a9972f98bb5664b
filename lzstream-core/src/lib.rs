//! # lzstream Core
//!
//! Core components shared by the lzstream decoders.
//!
//! - [`bitstream`]: non-blocking, resumable bit reader (LSB- or MSB-first)
//! - [`huffman`]: canonical Huffman trie with a resumable walk
//! - [`window`]: sliding window for back-references
//! - [`traits`]: the [`Decompressor`] trait and its `io::Read` adapter
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Codec                                                   │
//! │     InflateStream (DEFLATE, Deflate64), LhaStream (LZH) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Core (this crate)                                       │
//! │     BitReader, HuffmanTree, SlidingWindow               │
//! ├─────────────────────────────────────────────────────────┤
//! │ Source                                                  │
//! │     any std::io::Read, blocking or non-blocking         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use lzstream_core::bitstream::{BitOrder, BitReader};
//! use lzstream_core::huffman::{HuffmanTree, WalkPosition};
//! use std::io::Cursor;
//!
//! // Codes: symbol 0 = "0", symbol 1 = "10", symbol 2 = "11"
//! let tree = HuffmanTree::from_lengths(&[1, 2, 2], 15).unwrap();
//! let mut reader = BitReader::new(Cursor::new(vec![0b0000_0110]), BitOrder::LsbFirst);
//! let mut pos = WalkPosition::default();
//!
//! assert_eq!(tree.walk(&mut pos, &mut reader).unwrap(), Some(0));
//! assert_eq!(tree.walk(&mut pos, &mut reader).unwrap(), Some(2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod error;
pub mod huffman;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use bitstream::{BitOrder, BitReader, BitSource};
pub use error::{LzError, Result};
pub use huffman::{HuffmanTree, WalkPosition};
pub use traits::{DecompressReader, Decompressor};
pub use window::SlidingWindow;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitOrder, BitReader, BitSource};
    pub use crate::error::{LzError, Result};
    pub use crate::huffman::{HuffmanTree, WalkPosition};
    pub use crate::traits::{DecompressReader, Decompressor};
    pub use crate::window::SlidingWindow;
}
