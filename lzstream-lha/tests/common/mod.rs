//! Helpers shared by the LHA integration tests: an MSB-first bit writer and
//! a small static-Huffman LHA encoder.

#![allow(dead_code)]

use lzstream_lha::{LhaParams, LhaStream};
use std::collections::HashMap;
use std::io::{self, Read};

/// Packs bits MSB-first, the way LHA does.
#[derive(Default)]
pub struct MsbWriter {
    bytes: Vec<u8>,
    bit_count: usize,
}

impl MsbWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_count % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> (self.bit_count % 8);
        }
        self.bit_count += 1;
    }

    /// Write the low `count` bits of `value`, most significant first.
    pub fn bits(&mut self, value: u32, count: u8) -> &mut Self {
        for shift in (0..count).rev() {
            self.push_bit((value >> shift) & 1 == 1);
        }
        self
    }

    /// Write a (code, length) pair.
    pub fn code(&mut self, (code, len): (u32, u8)) -> &mut Self {
        self.bits(code, len)
    }

    /// Bytes written so far, the last one zero-padded.
    pub fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// Canonical (code, length) pairs for a code-length table.
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

/// Write a code-length or distance table in its "explicit lengths" form:
/// count, 3-bit lengths with unary extension, and (for the code-length
/// table) the zero-skip after the third entry.
pub fn write_length_table(w: &mut MsbWriter, lengths: &[u8], count_bits: u8, skip_field: bool) {
    let count = lengths.iter().rposition(|&len| len > 0).map_or(0, |i| i + 1);
    w.bits(count as u32, count_bits);
    let mut i = 0;
    while i < count {
        let len = lengths[i];
        if len < 7 {
            w.bits(u32::from(len), 3);
        } else {
            w.bits(7, 3);
            for _ in 7..len {
                w.bits(1, 1);
            }
            w.bits(0, 1);
        }
        i += 1;
        if skip_field && i == 3 {
            let start = i;
            while i < 6 && i < lengths.len() && lengths[i] == 0 {
                i += 1;
            }
            w.bits((i - start) as u32, 2);
        }
    }
}

/// One LZSS token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    Match { length: usize, distance: usize },
}

/// Expand tokens directly (the reference the decoder is checked against).
pub fn expand(tokens: &[Token]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for token in tokens {
        match *token {
            Token::Literal(byte) => out.push(byte),
            Token::Match { length, distance } => {
                for _ in 0..length {
                    out.push(out[out.len() - distance]);
                }
            }
        }
    }
    out
}

/// Greedy LZSS parse using the most recent occurrence of each 3-byte prefix.
pub fn tokenize(data: &[u8], window_size: usize) -> Vec<Token> {
    let mut last_seen: HashMap<[u8; 3], usize> = HashMap::new();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let mut length = 0;
        let mut distance = 0;
        if i + 3 <= data.len() {
            let key = [data[i], data[i + 1], data[i + 2]];
            if let Some(&prev) = last_seen.get(&key) {
                if i - prev <= window_size {
                    let max = (data.len() - i).min(256);
                    let mut len = 0;
                    while len < max && data[prev + len] == data[i + len] {
                        len += 1;
                    }
                    length = len;
                    distance = i - prev;
                }
            }
        }

        let advance = if length >= 3 {
            tokens.push(Token::Match { length, distance });
            length
        } else {
            tokens.push(Token::Literal(data[i]));
            1
        };
        for pos in i..i + advance {
            if pos + 3 <= data.len() {
                last_seen.insert([data[pos], data[pos + 1], data[pos + 2]], pos);
            }
        }
        i += advance;
    }
    tokens
}

/// How the encoder assigns code lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Every used symbol gets the same length.
    Flat,
    /// Lengths 1, 2, 3, ... so that long (extended) lengths appear.
    Skewed,
}

fn assign_lengths(freq: &[u32], shape: Shape) -> Vec<u8> {
    let used: Vec<usize> = (0..freq.len()).filter(|&s| freq[s] > 0).collect();
    let mut lengths = vec![0u8; freq.len()];
    let n = used.len();
    if shape == Shape::Skewed && (2..=17).contains(&n) {
        for (rank, &symbol) in used.iter().enumerate() {
            lengths[symbol] = (rank + 1).min(n - 1) as u8;
        }
    } else {
        let len = (usize::BITS - (n.max(2) - 1).leading_zeros()) as u8;
        for &symbol in &used {
            lengths[symbol] = len;
        }
    }
    lengths
}

/// Distance symbol and extra bits for a match distance.
pub fn distance_symbol(distance: usize) -> (usize, u32, u8) {
    let offset = distance - 1;
    if offset <= 1 {
        (offset, 0, 0)
    } else {
        let p = (usize::BITS - offset.leading_zeros()) as usize;
        (p, (offset - (1 << (p - 1))) as u32, (p - 1) as u8)
    }
}

fn litlen_symbol(token: &Token) -> usize {
    match *token {
        Token::Literal(byte) => usize::from(byte),
        Token::Match { length, .. } => length + 253,
    }
}

/// Encode one block holding `tokens`.
pub fn write_block(w: &mut MsbWriter, tokens: &[Token], params: LhaParams, shape: Shape) {
    let np = params.distance_codes();
    let pbit = params.distance_bits();

    let mut litlen_freq = vec![0u32; 510];
    let mut distance_freq = vec![0u32; np];
    for token in tokens {
        litlen_freq[litlen_symbol(token)] += 1;
        if let Token::Match { distance, .. } = *token {
            distance_freq[distance_symbol(distance).0] += 1;
        }
    }

    w.bits(tokens.len() as u32, 16);

    let litlen_used: Vec<usize> = (0..510).filter(|&s| litlen_freq[s] > 0).collect();
    let litlen_codes = if litlen_used.len() == 1 {
        w.bits(0, 5).bits(0, 5);
        w.bits(0, 9).bits(litlen_used[0] as u32, 9);
        vec![(0, 0); 510]
    } else {
        let lengths = assign_lengths(&litlen_freq, shape);
        write_litlen_table(w, &lengths, shape);
        canonical_codes(&lengths)
    };

    let distance_used: Vec<usize> = (0..np).filter(|&s| distance_freq[s] > 0).collect();
    let distance_codes = if distance_used.len() <= 1 {
        let single = distance_used.first().copied().unwrap_or(0);
        w.bits(0, pbit).bits(single as u32, pbit);
        vec![(0, 0); np]
    } else {
        let lengths = assign_lengths(&distance_freq, shape);
        write_length_table(w, &lengths, pbit, false);
        canonical_codes(&lengths)
    };

    for token in tokens {
        w.code(litlen_codes[litlen_symbol(token)]);
        if let Token::Match { distance, .. } = *token {
            let (p, extra, extra_bits) = distance_symbol(distance);
            w.code(distance_codes[p]);
            w.bits(extra, extra_bits);
        }
    }
}

/// Write the code-length table followed by the run-length coded
/// literal/length lengths.
fn write_litlen_table(w: &mut MsbWriter, lengths: &[u8], shape: Shape) {
    let count = lengths.iter().rposition(|&len| len > 0).map_or(0, |i| i + 1);

    // (code-length symbol, extra value, extra bits)
    let mut symbols: Vec<(usize, u32, u8)> = Vec::new();
    let mut i = 0;
    while i < count {
        if lengths[i] != 0 {
            symbols.push((usize::from(lengths[i]) + 2, 0, 0));
            i += 1;
            continue;
        }
        let run = lengths[i..count].iter().take_while(|&&len| len == 0).count();
        match run {
            1 | 2 => symbols.extend(std::iter::repeat_n((0, 0, 0), run)),
            3..=18 => symbols.push((1, (run - 3) as u32, 4)),
            19 => {
                symbols.push((0, 0, 0));
                symbols.push((1, 15, 4));
            }
            _ => symbols.push((2, (run - 20) as u32, 9)),
        }
        i += run;
    }

    let mut cl_freq = vec![0u32; 19];
    for &(symbol, _, _) in &symbols {
        cl_freq[symbol] += 1;
    }
    let cl_used: Vec<usize> = (0..19).filter(|&s| cl_freq[s] > 0).collect();
    let cl_codes = if cl_used.len() == 1 {
        w.bits(0, 5).bits(cl_used[0] as u32, 5);
        vec![(0, 0); 19]
    } else {
        let cl_lengths = assign_lengths(&cl_freq, shape);
        write_length_table(w, &cl_lengths, 5, true);
        canonical_codes(&cl_lengths)
    };

    w.bits(count as u32, 9);
    for (symbol, extra, extra_bits) in symbols {
        w.code(cl_codes[symbol]);
        w.bits(extra, extra_bits);
    }
}

/// Encode `data` as a complete LHA stream, `block_tokens` tokens per block.
pub fn encode(data: &[u8], params: LhaParams, shape: Shape, block_tokens: usize) -> Vec<u8> {
    let tokens = tokenize(data, params.window_size());
    let mut w = MsbWriter::new();
    for block in tokens.chunks(block_tokens.clamp(1, 0xFFFF)) {
        write_block(&mut w, block, params, shape);
    }
    w.finish()
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
pub fn pump<R: Read>(stream: &mut LhaStream<R>, out_size: usize) -> lzstream_core::Result<Vec<u8>> {
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
