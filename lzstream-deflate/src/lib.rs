//! # lzstream Deflate
//!
//! Resumable, non-blocking decompression of the DEFLATE format (RFC 1951)
//! and its Deflate64 variant.
//!
//! ## Features
//!
//! - All DEFLATE block types
//!   - Stored (uncompressed) blocks
//!   - Fixed Huffman codes
//!   - Dynamic Huffman codes
//! - Deflate64: 64 KiB window, 16-bit extra length for symbol 285,
//!   distance codes 30 and 31
//! - Input from any [`std::io::Read`]; a source returning
//!   [`std::io::ErrorKind::WouldBlock`] suspends decoding instead of failing
//! - Output into caller buffers of any size, including one byte at a time
//!
//! ## Example
//!
//! ```rust
//! use lzstream_deflate::{InflateStream, inflate};
//! use std::io::Cursor;
//!
//! // A stored block holding "ABC"
//! let compressed = [0x01, 0x03, 0x00, 0xFC, 0xFF, b'A', b'B', b'C'];
//! assert_eq!(inflate(&compressed).unwrap(), b"ABC");
//!
//! // The same stream, pulled two bytes at a time
//! let mut stream = InflateStream::new(Cursor::new(compressed));
//! let mut buf = [0u8; 2];
//! let mut out = Vec::new();
//! while !stream.is_finished() {
//!     let n = stream.produce(&mut buf).unwrap();
//!     out.extend_from_slice(&buf[..n]);
//! }
//! assert_eq!(out, b"ABC");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod inflate;
pub mod tables;

// Re-exports
pub use inflate::{InflateConfig, InflateStream, inflate, inflate64};
pub use tables::DeflateVariant;
