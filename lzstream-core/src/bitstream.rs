//! Resumable bit-level input for streaming decoders.
//!
//! [`BitReader`] wraps any [`Read`] source and hands out bits from an
//! accumulator that is refilled from a batch buffer. It never blocks: when
//! the source reports [`io::ErrorKind::WouldBlock`], every read method
//! returns `Ok(None)` and leaves the accumulator untouched, so the very same
//! call can be retried later without losing or repeating a bit.
//!
//! # Bit Ordering
//!
//! DEFLATE packs bits LSB-first within each byte, LHA packs them MSB-first.
//! The order is chosen per reader with [`BitOrder`]. Multi-bit values are
//! assembled in the format's natural way: for LSB-first the first bit read
//! lands in the least significant position, for MSB-first it lands in the
//! most significant position.
//!
//! # Example
//!
//! ```
//! use lzstream_core::bitstream::{BitOrder, BitReader};
//! use std::io::Cursor;
//!
//! let mut reader = BitReader::new(Cursor::new(vec![0xAB, 0xCD]), BitOrder::LsbFirst);
//! assert_eq!(reader.try_read_bits(4).unwrap(), Some(0xB));
//! assert_eq!(reader.try_read_bits(12).unwrap(), Some(0xCDA));
//! ```

use crate::error::{LzError, Result};
use std::io::{self, Read};

/// Default size of the batch buffer between the source and the accumulator.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 4096;

/// Order in which bits are taken from each input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Least significant bit first (DEFLATE).
    #[default]
    LsbFirst,
    /// Most significant bit first (LHA).
    MsbFirst,
}

/// A source of single bits that may temporarily run dry.
///
/// This is the seam between the Huffman walker and the input side of a
/// decoder.
pub trait BitSource {
    /// Read one bit, or `Ok(None)` if no input is available right now.
    fn try_read_bit(&mut self) -> Result<Option<bool>>;

    /// Number of bits consumed so far (for error reporting).
    fn bit_position(&self) -> u64;
}

/// A non-blocking bit reader over a byte source.
#[derive(Debug)]
pub struct BitReader<R> {
    /// Underlying source.
    source: R,
    /// Bit order within bytes.
    order: BitOrder,
    /// Batch buffer for source reads.
    input: Box<[u8]>,
    /// Read cursor into `input`.
    input_pos: usize,
    /// Number of valid bytes in `input`.
    input_len: usize,
    /// Bit accumulator.
    buffer: u64,
    /// Number of valid bits in the accumulator.
    bits_in_buffer: u8,
    /// Total bits consumed.
    total_bits_read: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a new reader with the default batch buffer size.
    pub fn new(source: R, order: BitOrder) -> Self {
        Self::with_capacity(source, order, DEFAULT_INPUT_BUFFER_SIZE)
    }

    /// Create a new reader with a batch buffer of `capacity` bytes
    /// (at least one).
    pub fn with_capacity(source: R, order: BitOrder, capacity: usize) -> Self {
        Self {
            source,
            order,
            input: vec![0; capacity.max(1)].into_boxed_slice(),
            input_pos: 0,
            input_len: 0,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_read: 0,
        }
    }

    /// Get a reference to the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Get a mutable reference to the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Total number of bits consumed so far.
    pub fn bit_position(&self) -> u64 {
        self.total_bits_read
    }

    /// Whether the read position sits on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.bits_in_buffer % 8 == 0
    }

    /// Refill the batch buffer. Returns `false` if the source would block.
    fn refill(&mut self) -> Result<bool> {
        loop {
            match self.source.read(&mut self.input) {
                Ok(0) => {
                    return Err(LzError::unexpected_eof(
                        self.total_bits_read + u64::from(self.bits_in_buffer),
                    ));
                }
                Ok(n) => {
                    self.input_pos = 0;
                    self.input_len = n;
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.input_pos == self.input_len && !self.refill()? {
            return Ok(None);
        }
        let byte = self.input[self.input_pos];
        self.input_pos += 1;
        Ok(Some(byte))
    }

    /// Ensure at least `count` bits are in the accumulator.
    /// Returns `false` (keeping what was gathered) if the source would block.
    fn fill(&mut self, count: u8) -> Result<bool> {
        while self.bits_in_buffer < count {
            let Some(byte) = self.next_byte()? else {
                return Ok(false);
            };
            match self.order {
                BitOrder::LsbFirst => self.buffer |= u64::from(byte) << self.bits_in_buffer,
                BitOrder::MsbFirst => self.buffer = (self.buffer << 8) | u64::from(byte),
            }
            self.bits_in_buffer += 8;
        }
        Ok(true)
    }

    /// Remove `count` bits from a sufficiently filled accumulator.
    fn take(&mut self, count: u8) -> u32 {
        debug_assert!(count <= self.bits_in_buffer);
        let mask = (1u64 << count) - 1;
        let value = match self.order {
            BitOrder::LsbFirst => {
                let value = self.buffer & mask;
                self.buffer >>= count;
                value
            }
            BitOrder::MsbFirst => {
                let rest = self.bits_in_buffer - count;
                let value = (self.buffer >> rest) & mask;
                self.buffer &= (1u64 << rest) - 1;
                value
            }
        };
        self.bits_in_buffer -= count;
        self.total_bits_read += u64::from(count);
        value as u32
    }

    /// Read up to 32 bits.
    ///
    /// Returns `Ok(None)` if the source cannot supply enough bits right now.
    /// Nothing is consumed in that case. Fails with
    /// [`LzError::UnexpectedEof`] if the source has ended.
    #[inline]
    pub fn try_read_bits(&mut self, count: u8) -> Result<Option<u32>> {
        debug_assert!(count <= 32, "Cannot read more than 32 bits at once");

        if count == 0 {
            return Ok(Some(0));
        }
        if !self.fill(count)? {
            return Ok(None);
        }
        Ok(Some(self.take(count)))
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let remainder = self.bits_in_buffer % 8;
        if remainder == 0 {
            return;
        }
        match self.order {
            BitOrder::LsbFirst => self.buffer >>= remainder,
            BitOrder::MsbFirst => {
                self.buffer &= (1u64 << (self.bits_in_buffer - remainder)) - 1;
            }
        }
        self.bits_in_buffer -= remainder;
        self.total_bits_read += u64::from(remainder);
    }

    /// Copy whole bytes into `dst`. The reader must be byte-aligned.
    ///
    /// Copies as many bytes as are available without blocking, up to
    /// `dst.len()`. Returns `Ok(None)` if not a single byte is available.
    pub fn try_read_aligned(&mut self, dst: &mut [u8]) -> Result<Option<usize>> {
        debug_assert!(self.is_byte_aligned(), "aligned read on unaligned reader");

        let mut copied = 0;
        while self.bits_in_buffer >= 8 && copied < dst.len() {
            dst[copied] = self.take(8) as u8;
            copied += 1;
        }

        while copied < dst.len() {
            if self.input_pos == self.input_len {
                if copied > 0 {
                    break;
                }
                if !self.refill()? {
                    return Ok(None);
                }
            }
            let count = (self.input_len - self.input_pos).min(dst.len() - copied);
            dst[copied..copied + count]
                .copy_from_slice(&self.input[self.input_pos..self.input_pos + count]);
            self.input_pos += count;
            copied += count;
            self.total_bits_read += count as u64 * 8;
        }

        Ok(Some(copied))
    }

    /// Consume the reader, returning the source and every buffered byte that
    /// was read from it but not consumed as bits.
    ///
    /// Bits of a partially consumed byte are discarded.
    pub fn into_parts(mut self) -> (R, Vec<u8>) {
        self.align_to_byte();
        let mut rest = Vec::with_capacity(
            usize::from(self.bits_in_buffer / 8) + (self.input_len - self.input_pos),
        );
        while self.bits_in_buffer >= 8 {
            rest.push(self.take(8) as u8);
        }
        rest.extend_from_slice(&self.input[self.input_pos..self.input_len]);
        (self.source, rest)
    }
}

impl<R: Read> BitSource for BitReader<R> {
    #[inline]
    fn try_read_bit(&mut self) -> Result<Option<bool>> {
        Ok(self.try_read_bits(1)?.map(|bit| bit != 0))
    }

    fn bit_position(&self) -> u64 {
        self.total_bits_read
    }
}
