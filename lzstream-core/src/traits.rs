//! Core traits for streaming decompression.
//!
//! Every decoder in the workspace pulls compressed bytes from its own source
//! and pushes decompressed bytes into caller-supplied buffers through
//! [`Decompressor::produce`]. [`DecompressReader`] turns any decoder into a
//! plain [`Read`] implementation.

use crate::error::Result;
use std::io::{self, Read};

/// Chunk size used by [`Decompressor::drain_into`].
const DRAIN_CHUNK: usize = 32768;

/// A pull-based, non-blocking decompressor.
pub trait Decompressor {
    /// Decompress into `output`, returning the number of bytes written.
    ///
    /// Returns fewer bytes than requested (possibly zero) when the source
    /// has nothing more available right now. All decoding state is kept, so
    /// a later call continues where this one stopped. Returns `Ok(0)` once
    /// [`is_finished`](Self::is_finished) is true.
    fn produce(&mut self, output: &mut [u8]) -> Result<usize>;

    /// Whether the logical end of the compressed stream has been reached.
    fn is_finished(&self) -> bool;

    /// Total number of bytes produced so far.
    fn total_out(&self) -> u64;

    /// Append everything that can be produced right now to `out`.
    ///
    /// Stops at the end of the stream or when the source would block.
    /// Returns the number of bytes appended.
    fn drain_into(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        let mut buffer = vec![0u8; DRAIN_CHUNK];

        while !self.is_finished() {
            let produced = self.produce(&mut buffer)?;
            if produced == 0 {
                break;
            }
            out.extend_from_slice(&buffer[..produced]);
        }

        Ok(out.len() - start)
    }
}

impl<D: Decompressor + ?Sized> Decompressor for Box<D> {
    fn produce(&mut self, output: &mut [u8]) -> Result<usize> {
        (**self).produce(output)
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn total_out(&self) -> u64 {
        (**self).total_out()
    }
}

/// Adapts a [`Decompressor`] to [`std::io::Read`].
///
/// - Decompressed bytes are returned as usual.
/// - `Ok(0)` means the end of the compressed stream.
/// - [`io::ErrorKind::WouldBlock`] means the source has no input right now.
/// - Decoder errors map to `InvalidData` or `UnexpectedEof`.
#[derive(Debug)]
pub struct DecompressReader<D> {
    inner: D,
}

impl<D: Decompressor> DecompressReader<D> {
    /// Wrap a decoder.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Get a reference to the wrapped decoder.
    pub fn get_ref(&self) -> &D {
        &self.inner
    }

    /// Get a mutable reference to the wrapped decoder.
    pub fn get_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    /// Unwrap the decoder.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Decompressor> Read for DecompressReader<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.inner.is_finished() {
            return Ok(0);
        }

        let produced = self.inner.produce(buf)?;
        if produced == 0 && !self.inner.is_finished() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        Ok(produced)
    }
}
