//! DEFLATE decompression (inflate).
//!
//! [`InflateStream`] decodes RFC 1951 bit streams (and Deflate64) from any
//! [`Read`] source without ever blocking. It supports all three block types:
//! - Type 0: Stored (uncompressed)
//! - Type 1: Fixed Huffman codes
//! - Type 2: Dynamic Huffman codes
//!
//! Decoding is an explicit state machine. Each state carries exactly what it
//! needs to continue, so a `produce` call can stop anywhere (between blocks,
//! halfway through a dynamic table, inside a Huffman code, during a
//! back-reference copy) when the source runs dry, and the next call picks up
//! at the same bit.

use crate::tables::{
    CODE_LENGTH_CODES, CODE_LENGTH_ORDER, DeflateVariant, END_OF_BLOCK, MAX_CODE_LENGTH,
    MAX_CODE_LENGTH_CODE_LENGTH, MAX_LITLEN_CODES, fixed_distance_tree, fixed_litlen_tree,
};
use lzstream_core::bitstream::{BitOrder, BitReader, DEFAULT_INPUT_BUFFER_SIZE};
use lzstream_core::error::{LzError, Result};
use lzstream_core::huffman::{HuffmanTree, WalkPosition};
use lzstream_core::traits::Decompressor;
use lzstream_core::window::SlidingWindow;
use std::io::{Cursor, Read};
use tracing::{debug, trace};

/// Decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflateConfig {
    /// DEFLATE or Deflate64.
    pub variant: DeflateVariant,
    /// Size of the batch buffer between the source and the bit reader.
    pub input_buffer_size: usize,
}

impl Default for InflateConfig {
    fn default() -> Self {
        Self {
            variant: DeflateVariant::Deflate,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
        }
    }
}

impl InflateConfig {
    /// Configuration for Deflate64 streams.
    pub fn deflate64() -> Self {
        Self {
            variant: DeflateVariant::Deflate64,
            ..Self::default()
        }
    }

    /// Set the input batch buffer size.
    pub fn with_input_buffer_size(mut self, size: usize) -> Self {
        self.input_buffer_size = size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.input_buffer_size == 0 {
            return Err(LzError::invalid_parameter("input buffer size must be non-zero"));
        }
        Ok(())
    }
}

/// HLIT/HDIST/HCLEN of a dynamic block, already biased.
#[derive(Debug, Clone, Copy)]
struct DynamicCounts {
    litlen: usize,
    distance: usize,
    code_length: usize,
}

impl DynamicCounts {
    fn total(&self) -> usize {
        self.litlen + self.distance
    }
}

/// Progress through the run-length coded literal/length + distance lengths.
#[derive(Debug)]
struct CodeLengthProgress {
    counts: DynamicCounts,
    tree: HuffmanTree,
    walk: WalkPosition,
    lengths: Vec<u8>,
    /// Repeat symbol (16, 17 or 18) whose extra bits are still unread.
    pending_repeat: Option<u16>,
}

#[derive(Debug)]
struct DynamicTrees {
    litlen: HuffmanTree,
    distance: HuffmanTree,
}

/// The tree pair active for the current Huffman block.
#[derive(Debug)]
enum BlockTrees {
    Fixed,
    Dynamic(Box<DynamicTrees>),
}

impl BlockTrees {
    fn litlen(&self) -> &HuffmanTree {
        match self {
            Self::Fixed => fixed_litlen_tree(),
            Self::Dynamic(trees) => &trees.litlen,
        }
    }

    fn distance(&self) -> &HuffmanTree {
        match self {
            Self::Fixed => fixed_distance_tree(),
            Self::Dynamic(trees) => &trees.distance,
        }
    }
}

/// Where symbol decoding inside a Huffman block stands.
#[derive(Debug, Clone, Copy)]
enum SymbolStep {
    LitLen { walk: WalkPosition },
    LengthExtra { base: u32, extra_bits: u8 },
    Distance { length: u32, walk: WalkPosition },
    DistanceExtra { length: u32, base: u32, extra_bits: u8 },
    Copy { distance: usize, remaining: usize },
}

impl SymbolStep {
    fn start() -> Self {
        Self::LitLen {
            walk: WalkPosition::default(),
        }
    }
}

#[derive(Debug)]
enum State {
    BlockHeader,
    StoredHeader,
    Stored {
        remaining: u16,
    },
    DynamicCounts,
    CodeLengthLengths {
        counts: DynamicCounts,
        read: usize,
        lengths: [u8; CODE_LENGTH_CODES],
    },
    CodeLengths(Box<CodeLengthProgress>),
    Huffman {
        trees: BlockTrees,
        step: SymbolStep,
    },
    End,
}

/// Outcome of one state-machine step.
enum Flow {
    /// Advanced, writing this many bytes to the front of the output.
    Continue(usize),
    /// The source has nothing more right now.
    Blocked,
    /// Logical end of the stream.
    Finished,
}

/// Streaming DEFLATE / Deflate64 decompressor.
#[derive(Debug)]
pub struct InflateStream<R> {
    /// Bit input (LSB-first).
    reader: BitReader<R>,
    /// Back-reference history.
    window: SlidingWindow,
    /// Table variant.
    variant: DeflateVariant,
    /// Current state.
    state: State,
    /// Whether the current block is the last one.
    final_block: bool,
    /// Bytes produced so far.
    total_out: u64,
    /// Set after a fatal error.
    poisoned: bool,
}

impl<R: Read> InflateStream<R> {
    /// Create a DEFLATE decompressor reading from `source`.
    pub fn new(source: R) -> Self {
        Self::build(source, InflateConfig::default())
    }

    /// Create a Deflate64 decompressor reading from `source`.
    pub fn deflate64(source: R) -> Self {
        Self::build(source, InflateConfig::deflate64())
    }

    /// Create a decompressor with an explicit configuration.
    pub fn with_config(source: R, config: InflateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: R, config: InflateConfig) -> Self {
        Self {
            reader: BitReader::with_capacity(source, BitOrder::LsbFirst, config.input_buffer_size),
            window: SlidingWindow::with_bits(config.variant.window_bits()),
            variant: config.variant,
            state: State::BlockHeader,
            final_block: false,
            total_out: 0,
            poisoned: false,
        }
    }

    /// The table variant in use.
    pub fn variant(&self) -> DeflateVariant {
        self.variant
    }

    /// Whether the end of the final block has been reached.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::End)
    }

    /// Total bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Number of compressed bits consumed so far.
    pub fn total_in_bits(&self) -> u64 {
        self.reader.bit_position()
    }

    /// Get a reference to the underlying source.
    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    /// Get a mutable reference to the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    /// Consume the decoder, returning the source and the input bytes that
    /// were read from it but not consumed by the compressed stream.
    ///
    /// After the stream is finished these are the bytes that follow the
    /// compressed data.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        self.reader.into_parts()
    }

    /// Decompress into `output`, returning the number of bytes written.
    ///
    /// Never blocks. Returns fewer bytes than requested (possibly zero)
    /// if the source has no more input right now; call again once it does.
    /// Any error is fatal and later calls fail with [`LzError::Poisoned`].
    pub fn produce(&mut self, output: &mut [u8]) -> Result<usize> {
        if self.poisoned {
            return Err(LzError::Poisoned);
        }

        match self.fill(output) {
            Ok(written) => {
                self.total_out += written as u64;
                Ok(written)
            }
            Err(err) => {
                debug!(
                    error = %err,
                    bit_position = self.reader.bit_position(),
                    "inflate failed"
                );
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn fill(&mut self, output: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        while written < output.len() {
            match self.step(&mut output[written..])? {
                Flow::Continue(n) => written += n,
                Flow::Blocked | Flow::Finished => break,
            }
        }
        Ok(written)
    }

    fn end_block(&mut self) {
        self.state = if self.final_block {
            debug!(
                bit_position = self.reader.bit_position(),
                "end of deflate stream"
            );
            State::End
        } else {
            State::BlockHeader
        };
    }

    /// Run the state machine until it blocks, ends, fills `out`, or changes
    /// state. `out` is never empty.
    fn step(&mut self, out: &mut [u8]) -> Result<Flow> {
        match &mut self.state {
            State::BlockHeader => {
                let Some(header) = self.reader.try_read_bits(3)? else {
                    return Ok(Flow::Blocked);
                };
                self.final_block = header & 1 == 1;
                let block_type = (header >> 1) as u8;
                debug!(
                    final_block = self.final_block,
                    block_type,
                    bit_position = self.reader.bit_position(),
                    "block header"
                );

                self.state = match block_type {
                    0 => State::StoredHeader,
                    1 => State::Huffman {
                        trees: BlockTrees::Fixed,
                        step: SymbolStep::start(),
                    },
                    2 => State::DynamicCounts,
                    _ => return Err(LzError::invalid_block_type(block_type)),
                };
                Ok(Flow::Continue(0))
            }

            State::StoredHeader => {
                self.reader.align_to_byte();
                let Some(fields) = self.reader.try_read_bits(32)? else {
                    return Ok(Flow::Blocked);
                };
                let len = (fields & 0xFFFF) as u16;
                let nlen = (fields >> 16) as u16;
                if len != !nlen {
                    return Err(LzError::stored_length_mismatch(len, nlen));
                }

                trace!(len, "stored block");
                if len == 0 {
                    self.end_block();
                } else {
                    self.state = State::Stored { remaining: len };
                }
                Ok(Flow::Continue(0))
            }

            State::Stored { remaining } => {
                let want = usize::from(*remaining).min(out.len());
                let Some(n) = self.reader.try_read_aligned(&mut out[..want])? else {
                    return Ok(Flow::Blocked);
                };
                self.window.push_slice(&out[..n]);
                *remaining -= n as u16;
                if *remaining == 0 {
                    self.end_block();
                }
                Ok(Flow::Continue(n))
            }

            State::DynamicCounts => {
                let Some(fields) = self.reader.try_read_bits(14)? else {
                    return Ok(Flow::Blocked);
                };
                let counts = DynamicCounts {
                    litlen: (fields & 0x1F) as usize + 257,
                    distance: ((fields >> 5) & 0x1F) as usize + 1,
                    code_length: ((fields >> 10) & 0xF) as usize + 4,
                };

                if counts.litlen > MAX_LITLEN_CODES {
                    return Err(LzError::corrupted(
                        self.reader.bit_position(),
                        format!("too many literal/length codes: {}", counts.litlen),
                    ));
                }
                if counts.distance > self.variant.max_distance_codes() {
                    return Err(LzError::corrupted(
                        self.reader.bit_position(),
                        format!("too many distance codes: {}", counts.distance),
                    ));
                }

                self.state = State::CodeLengthLengths {
                    counts,
                    read: 0,
                    lengths: [0; CODE_LENGTH_CODES],
                };
                Ok(Flow::Continue(0))
            }

            State::CodeLengthLengths {
                counts,
                read,
                lengths,
            } => {
                while *read < counts.code_length {
                    let Some(len) = self.reader.try_read_bits(3)? else {
                        return Ok(Flow::Blocked);
                    };
                    lengths[CODE_LENGTH_ORDER[*read]] = len as u8;
                    *read += 1;
                }

                let counts = *counts;
                let tree = HuffmanTree::from_lengths(&lengths[..], MAX_CODE_LENGTH_CODE_LENGTH)?;
                self.state = State::CodeLengths(Box::new(CodeLengthProgress {
                    counts,
                    tree,
                    walk: WalkPosition::default(),
                    lengths: Vec::with_capacity(counts.total()),
                    pending_repeat: None,
                }));
                Ok(Flow::Continue(0))
            }

            State::CodeLengths(progress) => {
                let total = progress.counts.total();
                while progress.lengths.len() < total {
                    if let Some(symbol) = progress.pending_repeat {
                        let (extra_bits, base, value) = match symbol {
                            16 => (2, 3, progress.lengths.last().copied()),
                            17 => (3, 3, Some(0)),
                            _ => (7, 11, Some(0)),
                        };
                        let Some(extra) = self.reader.try_read_bits(extra_bits)? else {
                            return Ok(Flow::Blocked);
                        };
                        let value = value.ok_or(LzError::RepeatWithoutPrevious)?;
                        let count = base + extra as usize;
                        if progress.lengths.len() + count > total {
                            return Err(LzError::invalid_code_lengths(format!(
                                "repeat of {} overflows {} code lengths",
                                count, total
                            )));
                        }
                        progress
                            .lengths
                            .resize(progress.lengths.len() + count, value);
                        progress.pending_repeat = None;
                        continue;
                    }

                    let Some(symbol) = progress
                        .tree
                        .walk(&mut progress.walk, &mut self.reader)?
                    else {
                        return Ok(Flow::Blocked);
                    };
                    match symbol {
                        0..=15 => progress.lengths.push(symbol as u8),
                        16 if progress.lengths.is_empty() => {
                            return Err(LzError::RepeatWithoutPrevious);
                        }
                        16..=18 => progress.pending_repeat = Some(symbol),
                        _ => return Err(LzError::invalid_huffman(self.reader.bit_position())),
                    }
                }

                let (litlen_lengths, distance_lengths) =
                    progress.lengths.split_at(progress.counts.litlen);
                if litlen_lengths[usize::from(END_OF_BLOCK)] == 0 {
                    return Err(LzError::invalid_code_lengths("missing end-of-block code"));
                }
                let trees = DynamicTrees {
                    litlen: HuffmanTree::from_lengths(litlen_lengths, MAX_CODE_LENGTH)?,
                    distance: HuffmanTree::from_lengths(distance_lengths, MAX_CODE_LENGTH)?,
                };
                debug!(
                    litlen_codes = trees.litlen.leaf_count(),
                    distance_codes = trees.distance.leaf_count(),
                    "dynamic tables built"
                );

                self.state = State::Huffman {
                    trees: BlockTrees::Dynamic(Box::new(trees)),
                    step: SymbolStep::start(),
                };
                Ok(Flow::Continue(0))
            }

            State::Huffman { trees, step } => {
                let mut written = 0;
                loop {
                    match step {
                        SymbolStep::LitLen { walk } => {
                            let Some(symbol) = trees.litlen().walk(walk, &mut self.reader)? else {
                                return Ok(blocked_after(written));
                            };

                            if symbol < END_OF_BLOCK {
                                out[written] = symbol as u8;
                                self.window.push(symbol as u8);
                                written += 1;
                                if written == out.len() {
                                    return Ok(Flow::Continue(written));
                                }
                            } else if symbol == END_OF_BLOCK {
                                self.end_block();
                                return Ok(Flow::Continue(written));
                            } else {
                                let (base, extra_bits) =
                                    self.variant.length_code(symbol).ok_or_else(|| {
                                        LzError::corrupted(
                                            self.reader.bit_position(),
                                            format!("invalid literal/length symbol {}", symbol),
                                        )
                                    })?;
                                *step = SymbolStep::LengthExtra { base, extra_bits };
                            }
                        }

                        SymbolStep::LengthExtra { base, extra_bits } => {
                            let Some(extra) = self.reader.try_read_bits(*extra_bits)? else {
                                return Ok(blocked_after(written));
                            };
                            *step = SymbolStep::Distance {
                                length: *base + extra,
                                walk: WalkPosition::default(),
                            };
                        }

                        SymbolStep::Distance { length, walk } => {
                            let Some(code) = trees.distance().walk(walk, &mut self.reader)? else {
                                return Ok(blocked_after(written));
                            };
                            let (base, extra_bits) =
                                self.variant.distance_code(code).ok_or_else(|| {
                                    LzError::corrupted(
                                        self.reader.bit_position(),
                                        format!("invalid distance code {}", code),
                                    )
                                })?;
                            *step = SymbolStep::DistanceExtra {
                                length: *length,
                                base,
                                extra_bits,
                            };
                        }

                        SymbolStep::DistanceExtra {
                            length,
                            base,
                            extra_bits,
                        } => {
                            let Some(extra) = self.reader.try_read_bits(*extra_bits)? else {
                                return Ok(blocked_after(written));
                            };
                            let distance = (*base + extra) as usize;
                            self.window.check_distance(distance)?;
                            *step = SymbolStep::Copy {
                                distance,
                                remaining: *length as usize,
                            };
                        }

                        SymbolStep::Copy {
                            distance,
                            remaining,
                        } => {
                            let n =
                                self.window
                                    .copy_match(*distance, *remaining, &mut out[written..])?;
                            written += n;
                            *remaining -= n;
                            if *remaining == 0 {
                                *step = SymbolStep::start();
                            }
                            if written == out.len() {
                                return Ok(Flow::Continue(written));
                            }
                        }
                    }
                }
            }

            State::End => Ok(Flow::Finished),
        }
    }
}

fn blocked_after(written: usize) -> Flow {
    if written > 0 {
        Flow::Continue(written)
    } else {
        Flow::Blocked
    }
}

impl<R: Read> Decompressor for InflateStream<R> {
    fn produce(&mut self, output: &mut [u8]) -> Result<usize> {
        InflateStream::produce(self, output)
    }

    fn is_finished(&self) -> bool {
        InflateStream::is_finished(self)
    }

    fn total_out(&self) -> u64 {
        InflateStream::total_out(self)
    }
}

fn inflate_with(data: &[u8], config: InflateConfig) -> Result<Vec<u8>> {
    let mut stream = InflateStream::with_config(Cursor::new(data), config)?;
    let mut output = Vec::new();
    stream.drain_into(&mut output)?;

    if !stream.is_finished() {
        return Err(LzError::unexpected_eof(stream.total_in_bits()));
    }
    Ok(output)
}

/// Decompress a complete DEFLATE stream held in memory.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    inflate_with(data, InflateConfig::default())
}

/// Decompress a complete Deflate64 stream held in memory.
pub fn inflate64(data: &[u8]) -> Result<Vec<u8>> {
    inflate_with(data, InflateConfig::deflate64())
}
