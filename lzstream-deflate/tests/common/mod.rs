//! Helpers shared by the inflate integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use lzstream_deflate::InflateStream;
use std::io::{self, Read, Write};

/// Packs bits LSB-first, the way DEFLATE does.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_count: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_count % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (self.bit_count % 8);
        }
        self.bit_count += 1;
    }

    /// Write a number, least significant bit first (header fields, extra bits).
    pub fn bits(&mut self, value: u32, count: u8) -> &mut Self {
        for i in 0..count {
            self.push_bit((value >> i) & 1 == 1);
        }
        self
    }

    /// Write a Huffman code, most significant bit first.
    pub fn code(&mut self, (code, len): (u32, u8)) -> &mut Self {
        for shift in (0..len).rev() {
            self.push_bit((code >> shift) & 1 == 1);
        }
        self
    }

    /// Pad to a byte boundary with zero bits.
    pub fn align(&mut self) -> &mut Self {
        while self.bit_count % 8 != 0 {
            self.push_bit(false);
        }
        self
    }

    /// Append whole bytes. The writer must be aligned.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        assert_eq!(self.bit_count % 8, 0);
        self.bytes.extend_from_slice(data);
        self.bit_count += data.len() * 8;
        self
    }

    /// A complete stored block.
    pub fn stored_block(&mut self, last: bool, data: &[u8]) -> &mut Self {
        let len = data.len() as u16;
        self.bits(u32::from(last), 1).bits(0, 2).align();
        self.bits(u32::from(len), 16).bits(u32::from(!len), 16);
        self.bytes(data)
    }

    pub fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// Canonical (code, length) pairs for a code-length table (RFC 1951 3.2.2).
pub fn canonical_codes(lengths: &[u8]) -> Vec<(u32, u8)> {
    let max = lengths.iter().copied().max().unwrap_or(0) as usize;
    let mut bl_count = vec![0u32; max + 1];
    for &len in lengths {
        if len > 0 {
            bl_count[len as usize] += 1;
        }
    }
    let mut next_code = vec![0u32; max + 2];
    let mut code = 0;
    for bits in 1..=max {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }
    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return (0, 0);
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            (code, len)
        })
        .collect()
}

/// Fixed literal/length code for `symbol` (RFC 1951 3.2.6).
pub fn fixed_litlen(symbol: u16) -> (u32, u8) {
    let symbol = u32::from(symbol);
    match symbol {
        0..=143 => (0b0011_0000 + symbol, 8),
        144..=255 => (0b1_1001_0000 + symbol - 144, 9),
        256..=279 => (symbol - 256, 7),
        _ => (0b1100_0000 + symbol - 280, 8),
    }
}

/// Fixed distance code (5 bits).
pub fn fixed_distance(code: u16) -> (u32, u8) {
    (u32::from(code), 5)
}

/// Compress with zlib's raw DEFLATE encoder.
pub fn compress(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Deterministic test data: text-like with a few noisy stretches.
pub fn sample_data(size: usize) -> Vec<u8> {
    let text = b"The quick brown fox jumps over the lazy dog. \
                 Pack my box with five dozen liquor jugs. ";
    let mut seed: u64 = 0x1234_5678_9ABC_DEF0;
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        if seed >> 60 == 0 {
            for _ in 0..64 {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                data.push((seed >> 33) as u8);
            }
        } else {
            let start = (seed >> 40) as usize % text.len();
            data.extend_from_slice(&text[start..]);
        }
    }
    data.truncate(size);
    data
}

/// Pseudo-random bytes.
pub fn noise(size: usize, mut seed: u64) -> Vec<u8> {
    (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            (seed >> 33) as u8
        })
        .collect()
}

/// A source that hands out at most `chunk` bytes and then reports
/// `WouldBlock` before every further read.
pub struct Trickle {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    blocked: bool,
}

impl Trickle {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk: chunk.max(1),
            blocked: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.blocked {
            self.blocked = true;
            return Err(io::ErrorKind::WouldBlock.into());
        }
        self.blocked = false;
        let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Pump `stream` with an output buffer of `out_size` until it finishes.
pub fn pump<R: Read>(stream: &mut InflateStream<R>, out_size: usize) -> lzstream_core::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; out_size];
    let mut idle = 0;
    while !stream.is_finished() {
        let n = stream.produce(&mut buf)?;
        out.extend_from_slice(&buf[..n]);
        idle = if n == 0 { idle + 1 } else { 0 };
        assert!(idle < 1_000_000, "decoder made no progress");
    }
    Ok(out)
}
