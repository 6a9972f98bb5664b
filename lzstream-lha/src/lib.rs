//! # lzstream LHA
//!
//! Resumable, non-blocking decompression of LHA static-Huffman streams
//! (`-lh4-` through `-lh7-`).
//!
//! ## Features
//!
//! - All four standard methods via [`LhaMethod`], or custom dictionary and
//!   distance-table sizes via [`LhaParams`]
//! - Input from any [`std::io::Read`]; a source returning
//!   [`std::io::ErrorKind::WouldBlock`] suspends decoding instead of failing
//! - Output into caller buffers of any size
//!
//! The caller supplies the uncompressed size from the archive header; it is
//! the only end-of-stream marker.
//!
//! ## Example
//!
//! ```rust
//! use lzstream_lha::{LhaMethod, decode_lha};
//!
//! // One block of three symbols whose literal table holds only 'Z'.
//! let compressed = [0x00, 0x03, 0x00, 0x00, 0x05, 0xA0, 0x00];
//! assert_eq!(decode_lha(&compressed, LhaMethod::Lh5, 3).unwrap(), b"ZZZ");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod methods;
pub mod stream;

// Re-exports
pub use methods::{LhaMethod, LhaParams};
pub use stream::{LhaStream, decode_lha};
