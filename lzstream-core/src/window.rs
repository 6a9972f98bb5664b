//! Sliding window (dictionary) for LZ77/LZSS back-references.
//!
//! The window keeps the most recent `capacity` bytes of output. A
//! back-reference copies `length` bytes starting `distance` bytes behind the
//! write cursor. When `distance < length` the copy reads bytes it has just
//! written, which produces repeating patterns, so copies always go one byte
//! at a time.
//!
//! # Sizes
//!
//! - DEFLATE: 32 KB
//! - Deflate64: 64 KB
//! - LHA lh4/lh5/lh6/lh7: 4/8/32/64 KB

use crate::error::{LzError, Result};

/// A power-of-two ring buffer holding decompression history.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    /// The underlying buffer.
    buffer: Box<[u8]>,
    /// Next write position.
    position: usize,
    /// Number of valid history bytes (up to capacity).
    filled: usize,
    /// Mask for modulo-capacity indexing.
    mask: usize,
}

impl SlidingWindow {
    /// Create a window of `capacity` bytes.
    ///
    /// Fails unless `capacity` is a non-zero power of two.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(LzError::invalid_parameter(format!(
                "window size must be a power of 2, got {}",
                capacity
            )));
        }

        Ok(Self::with_bits(capacity.trailing_zeros() as u8))
    }

    /// Create a window of `1 << bits` bytes.
    pub fn with_bits(bits: u8) -> Self {
        let capacity = 1usize << bits;
        Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            position: 0,
            filled: 0,
            mask: capacity - 1,
        }
    }

    /// Append one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.filled < self.buffer.len() {
            self.filled += 1;
        }
    }

    /// Append a run of bytes.
    pub fn push_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Check that `distance` reaches into valid history.
    pub fn check_distance(&self, distance: usize) -> Result<()> {
        if distance == 0 || distance > self.filled {
            return Err(LzError::invalid_distance(distance, self.filled));
        }
        Ok(())
    }

    /// Continue a back-reference copy into `out`.
    ///
    /// Copies `min(remaining, out.len())` bytes from `distance` back, writing
    /// each into both the window and `out`, and returns the count. Calling
    /// again with the reduced `remaining` continues the same copy, because
    /// the source position moves along with the write cursor.
    pub fn copy_match(&mut self, distance: usize, remaining: usize, out: &mut [u8]) -> Result<usize> {
        self.check_distance(distance)?;

        let count = remaining.min(out.len());
        let mut src = self.position.wrapping_sub(distance) & self.mask;
        for slot in &mut out[..count] {
            let byte = self.buffer[src];
            *slot = byte;
            self.push(byte);
            src = (src + 1) & self.mask;
        }
        Ok(count)
    }
}
