//! Streaming LHA (lh4-lh7) decompression.
//!
//! Each block starts with a 16-bit symbol count and three Huffman tables
//! (code lengths, literals/lengths, distances), followed by that many
//! symbols. Bits are packed MSB-first. The container records the
//! uncompressed size, which is the only end marker: decoding stops as soon
//! as that many bytes have been produced.
//!
//! [`LhaStream`] decodes from any [`Read`] source without blocking and can
//! suspend at any bit, including inside a table or a Huffman code.

use crate::methods::constants::{CBIT, LENGTH_OFFSET, MAX_CODE_LENGTH, NC, NT, TBIT};
use crate::methods::{LhaMethod, LhaParams};
use lzstream_core::bitstream::{BitOrder, BitReader, DEFAULT_INPUT_BUFFER_SIZE};
use lzstream_core::error::{LzError, Result};
use lzstream_core::huffman::{HuffmanTree, WalkPosition};
use lzstream_core::traits::Decompressor;
use lzstream_core::window::SlidingWindow;
use std::io::{Cursor, Read};
use tracing::{debug, trace};

/// A 3-bit length field holding this value continues in unary.
const EXTENDED_LENGTH: u8 = 7;

/// Which of the two `pt`-style tables is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthTableKind {
    CodeLength,
    Distance,
}

#[derive(Debug)]
enum LengthTableStep {
    Count,
    Single,
    Lengths {
        count: usize,
        lengths: Vec<u8>,
        /// A length of 7 or more whose unary tail is still being read.
        extending: Option<u8>,
        /// The 2-bit zero-skip after the third code-length length is due.
        skip_due: bool,
    },
}

/// Reader for the code-length and distance tables, which share a layout:
/// a count, then 3-bit lengths with a unary extension.
#[derive(Debug)]
struct LengthTable {
    kind: LengthTableKind,
    alphabet: usize,
    count_bits: u8,
    step: LengthTableStep,
}

impl LengthTable {
    fn code_lengths() -> Self {
        Self {
            kind: LengthTableKind::CodeLength,
            alphabet: NT,
            count_bits: TBIT,
            step: LengthTableStep::Count,
        }
    }

    fn distances(params: &LhaParams) -> Self {
        Self {
            kind: LengthTableKind::Distance,
            alphabet: params.distance_codes(),
            count_bits: params.distance_bits(),
            step: LengthTableStep::Count,
        }
    }

    /// Continue reading; `Ok(Some(tree))` once the table is complete.
    fn read<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<Option<HuffmanTree>> {
        loop {
            match &mut self.step {
                LengthTableStep::Count => {
                    let Some(count) = reader.try_read_bits(self.count_bits)? else {
                        return Ok(None);
                    };
                    let count = count as usize;
                    if count > self.alphabet {
                        return Err(LzError::corrupted(
                            reader.bit_position(),
                            format!("{:?} table count {} exceeds {}", self.kind, count, self.alphabet),
                        ));
                    }
                    self.step = if count == 0 {
                        LengthTableStep::Single
                    } else {
                        LengthTableStep::Lengths {
                            count,
                            lengths: Vec::with_capacity(self.alphabet),
                            extending: None,
                            skip_due: false,
                        }
                    };
                }

                LengthTableStep::Single => {
                    let Some(value) = reader.try_read_bits(self.count_bits)? else {
                        return Ok(None);
                    };
                    if value as usize >= self.alphabet {
                        return Err(LzError::corrupted(
                            reader.bit_position(),
                            format!("{:?} table single code {} out of range", self.kind, value),
                        ));
                    }
                    return Ok(Some(HuffmanTree::single(value as u16)));
                }

                LengthTableStep::Lengths {
                    count,
                    lengths,
                    extending,
                    skip_due,
                } => {
                    loop {
                        if *skip_due {
                            let Some(skip) = reader.try_read_bits(2)? else {
                                return Ok(None);
                            };
                            let zeros = (skip as usize).min(self.alphabet - lengths.len());
                            lengths.resize(lengths.len() + zeros, 0);
                            *skip_due = false;
                            continue;
                        }
                        if lengths.len() >= *count {
                            break;
                        }

                        let len = match *extending {
                            Some(len) => {
                                let Some(bit) = reader.try_read_bits(1)? else {
                                    return Ok(None);
                                };
                                if bit == 0 {
                                    *extending = None;
                                    len
                                } else if len == MAX_CODE_LENGTH {
                                    return Err(LzError::invalid_code_lengths(format!(
                                        "{:?} code length exceeds {}",
                                        self.kind, MAX_CODE_LENGTH
                                    )));
                                } else {
                                    *extending = Some(len + 1);
                                    continue;
                                }
                            }
                            None => {
                                let Some(len) = reader.try_read_bits(3)? else {
                                    return Ok(None);
                                };
                                let len = len as u8;
                                if len == EXTENDED_LENGTH {
                                    *extending = Some(len);
                                    continue;
                                }
                                len
                            }
                        };

                        lengths.push(len);
                        if self.kind == LengthTableKind::CodeLength && lengths.len() == 3 {
                            *skip_due = true;
                        }
                    }

                    lengths.resize(self.alphabet, 0);
                    return HuffmanTree::from_lengths(lengths, MAX_CODE_LENGTH).map(Some);
                }
            }
        }
    }
}

#[derive(Debug)]
enum LitLenStep {
    Count,
    Single,
    Lengths {
        count: usize,
        lengths: Vec<u8>,
        walk: WalkPosition,
        /// Zero-run symbol (1 or 2) whose extra bits are still unread.
        pending_run: Option<u16>,
    },
}

/// Reader for the literal/length table, whose lengths are coded with the
/// code-length tree.
#[derive(Debug)]
struct LitLenTable {
    step: LitLenStep,
}

impl LitLenTable {
    fn new() -> Self {
        Self {
            step: LitLenStep::Count,
        }
    }

    fn read<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
        code_lengths: &HuffmanTree,
    ) -> Result<Option<HuffmanTree>> {
        loop {
            match &mut self.step {
                LitLenStep::Count => {
                    let Some(count) = reader.try_read_bits(CBIT)? else {
                        return Ok(None);
                    };
                    let count = count as usize;
                    if count > NC {
                        return Err(LzError::corrupted(
                            reader.bit_position(),
                            format!("too many literal/length codes: {}", count),
                        ));
                    }
                    self.step = if count == 0 {
                        LitLenStep::Single
                    } else {
                        LitLenStep::Lengths {
                            count,
                            lengths: Vec::with_capacity(NC),
                            walk: WalkPosition::default(),
                            pending_run: None,
                        }
                    };
                }

                LitLenStep::Single => {
                    let Some(value) = reader.try_read_bits(CBIT)? else {
                        return Ok(None);
                    };
                    if value as usize >= NC {
                        return Err(LzError::corrupted(
                            reader.bit_position(),
                            format!("literal/length single code {} out of range", value),
                        ));
                    }
                    return Ok(Some(HuffmanTree::single(value as u16)));
                }

                LitLenStep::Lengths {
                    count,
                    lengths,
                    walk,
                    pending_run,
                } => {
                    while lengths.len() < *count {
                        if let Some(symbol) = *pending_run {
                            let (extra_bits, base) = if symbol == 1 { (4, 3) } else { (9, 20) };
                            let Some(extra) = reader.try_read_bits(extra_bits)? else {
                                return Ok(None);
                            };
                            let zeros = base + extra as usize;
                            if lengths.len() + zeros > *count {
                                return Err(LzError::invalid_code_lengths(format!(
                                    "zero run of {} overflows {} code lengths",
                                    zeros, count
                                )));
                            }
                            lengths.resize(lengths.len() + zeros, 0);
                            *pending_run = None;
                            continue;
                        }

                        let Some(symbol) = code_lengths.walk(walk, reader)? else {
                            return Ok(None);
                        };
                        match symbol {
                            0 => lengths.push(0),
                            1 | 2 => *pending_run = Some(symbol),
                            _ => lengths.push((symbol - 2) as u8),
                        }
                    }

                    lengths.resize(NC, 0);
                    return HuffmanTree::from_lengths(lengths, MAX_CODE_LENGTH).map(Some);
                }
            }
        }
    }
}

#[derive(Debug)]
struct BlockTrees {
    litlen: HuffmanTree,
    distance: HuffmanTree,
}

/// Where symbol decoding inside a block stands.
#[derive(Debug, Clone, Copy)]
enum SymbolStep {
    LitLen { walk: WalkPosition },
    Distance { length: usize, walk: WalkPosition },
    DistanceExtra { length: usize, extra_bits: u8 },
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
    CodeLengthTable(LengthTable),
    LitLenTable {
        code_lengths: HuffmanTree,
        table: LitLenTable,
    },
    DistanceTable {
        litlen: HuffmanTree,
        table: LengthTable,
    },
    Symbols {
        trees: Box<BlockTrees>,
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
    /// The declared size has been produced.
    Finished,
}

/// Streaming LHA decompressor.
#[derive(Debug)]
pub struct LhaStream<R> {
    /// Bit input (MSB-first).
    reader: BitReader<R>,
    /// Back-reference history.
    window: SlidingWindow,
    /// Dictionary and distance-table parameters.
    params: LhaParams,
    /// Current state.
    state: State,
    /// Symbols left in the current block.
    block_remaining: u16,
    /// Declared uncompressed size.
    uncompressed_size: u64,
    /// Bytes produced so far.
    total_out: u64,
    /// Set after a fatal error.
    poisoned: bool,
}

impl<R: Read> LhaStream<R> {
    /// Create a decompressor for a stream of `method` that expands to
    /// `uncompressed_size` bytes.
    pub fn new(source: R, method: LhaMethod, uncompressed_size: u64) -> Result<Self> {
        Self::with_params(source, method.params(), uncompressed_size)
    }

    /// Create a decompressor with explicit parameters.
    pub fn with_params(source: R, params: LhaParams, uncompressed_size: u64) -> Result<Self> {
        Self::with_input_buffer_size(source, params, uncompressed_size, DEFAULT_INPUT_BUFFER_SIZE)
    }

    /// Create a decompressor with explicit parameters and input batch size.
    pub fn with_input_buffer_size(
        source: R,
        params: LhaParams,
        uncompressed_size: u64,
        input_buffer_size: usize,
    ) -> Result<Self> {
        if input_buffer_size == 0 {
            return Err(LzError::invalid_parameter("input buffer size must be non-zero"));
        }

        let state = if uncompressed_size == 0 {
            State::End
        } else {
            State::BlockHeader
        };
        Ok(Self {
            reader: BitReader::with_capacity(source, BitOrder::MsbFirst, input_buffer_size),
            window: SlidingWindow::new(params.window_size())?,
            params,
            state,
            block_remaining: 0,
            uncompressed_size,
            total_out: 0,
            poisoned: false,
        })
    }

    /// The stream parameters.
    pub fn params(&self) -> LhaParams {
        self.params
    }

    /// Whether the declared uncompressed size has been produced.
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

    /// Consume the decoder, returning the source and the input bytes read
    /// from it but not yet consumed.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        self.reader.into_parts()
    }

    /// Decompress into `output`, returning the number of bytes written.
    ///
    /// Never blocks; a short (or zero) count means the source has nothing
    /// more right now. Any error is fatal and later calls fail with
    /// [`LzError::Poisoned`].
    pub fn produce(&mut self, output: &mut [u8]) -> Result<usize> {
        if self.poisoned {
            return Err(LzError::Poisoned);
        }

        let mut written = 0;
        let result = loop {
            if written == output.len() {
                break Ok(());
            }
            match self.step(&mut output[written..]) {
                Ok(Flow::Continue(n)) => {
                    written += n;
                    self.total_out += n as u64;
                }
                Ok(Flow::Blocked | Flow::Finished) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        match result {
            Ok(()) => Ok(written),
            Err(err) => {
                debug!(
                    error = %err,
                    bit_position = self.reader.bit_position(),
                    total_out = self.total_out,
                    "lha decode failed"
                );
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn finish(&mut self) {
        debug!(
            bit_position = self.reader.bit_position(),
            total_out = self.total_out,
            "end of lha stream"
        );
        self.state = State::End;
    }

    /// Advance until the state changes, the source blocks or `out` is full.
    /// `out` is never empty.
    fn step(&mut self, out: &mut [u8]) -> Result<Flow> {
        match &mut self.state {
            State::BlockHeader => {
                let Some(symbols) = self.reader.try_read_bits(16)? else {
                    return Ok(Flow::Blocked);
                };
                if symbols == 0 {
                    return Err(LzError::corrupted(
                        self.reader.bit_position(),
                        "block with zero symbols",
                    ));
                }
                debug!(
                    symbols,
                    bit_position = self.reader.bit_position(),
                    "block header"
                );
                self.block_remaining = symbols as u16;
                self.state = State::CodeLengthTable(LengthTable::code_lengths());
                Ok(Flow::Continue(0))
            }

            State::CodeLengthTable(table) => {
                let Some(code_lengths) = table.read(&mut self.reader)? else {
                    return Ok(Flow::Blocked);
                };
                self.state = State::LitLenTable {
                    code_lengths,
                    table: LitLenTable::new(),
                };
                Ok(Flow::Continue(0))
            }

            State::LitLenTable {
                code_lengths,
                table,
            } => {
                let Some(litlen) = table.read(&mut self.reader, code_lengths)? else {
                    return Ok(Flow::Blocked);
                };
                self.state = State::DistanceTable {
                    litlen,
                    table: LengthTable::distances(&self.params),
                };
                Ok(Flow::Continue(0))
            }

            State::DistanceTable { table, .. } => {
                let Some(distance) = table.read(&mut self.reader)? else {
                    return Ok(Flow::Blocked);
                };
                if let State::DistanceTable { litlen, .. } =
                    std::mem::replace(&mut self.state, State::BlockHeader)
                {
                    debug!(
                        litlen_codes = litlen.leaf_count(),
                        distance_codes = distance.leaf_count(),
                        "block tables built"
                    );
                    self.state = State::Symbols {
                        trees: Box::new(BlockTrees { litlen, distance }),
                        step: SymbolStep::start(),
                    };
                }
                Ok(Flow::Continue(0))
            }

            State::Symbols { trees, step } => {
                let mut written = 0;
                loop {
                    match step {
                        SymbolStep::LitLen { walk } => {
                            let produced = self.total_out + written as u64;
                            if walk.is_at_root() {
                                if produced == self.uncompressed_size {
                                    self.finish();
                                    return Ok(Flow::Continue(written));
                                }
                                if self.block_remaining == 0 {
                                    trace!(produced, "block exhausted");
                                    self.state = State::BlockHeader;
                                    return Ok(Flow::Continue(written));
                                }
                            }

                            let Some(symbol) = trees.litlen.walk(walk, &mut self.reader)? else {
                                return Ok(blocked_after(written));
                            };
                            self.block_remaining -= 1;

                            if symbol < 256 {
                                out[written] = symbol as u8;
                                self.window.push(symbol as u8);
                                written += 1;
                                if written == out.len() {
                                    return Ok(Flow::Continue(written));
                                }
                            } else {
                                let length = usize::from(symbol - LENGTH_OFFSET);
                                if produced + length as u64 > self.uncompressed_size {
                                    return Err(LzError::corrupted(
                                        self.reader.bit_position(),
                                        format!(
                                            "match of {} bytes runs past the uncompressed size {}",
                                            length, self.uncompressed_size
                                        ),
                                    ));
                                }
                                *step = SymbolStep::Distance {
                                    length,
                                    walk: WalkPosition::default(),
                                };
                            }
                        }

                        SymbolStep::Distance { length, walk } => {
                            let Some(code) = trees.distance.walk(walk, &mut self.reader)? else {
                                return Ok(blocked_after(written));
                            };
                            let length = *length;
                            if code <= 1 {
                                let distance = usize::from(code) + 1;
                                self.window.check_distance(distance)?;
                                *step = SymbolStep::Copy {
                                    distance,
                                    remaining: length,
                                };
                            } else {
                                *step = SymbolStep::DistanceExtra {
                                    length,
                                    extra_bits: (code - 1) as u8,
                                };
                            }
                        }

                        SymbolStep::DistanceExtra { length, extra_bits } => {
                            let Some(extra) = self.reader.try_read_bits(*extra_bits)? else {
                                return Ok(blocked_after(written));
                            };
                            let offset = (1usize << *extra_bits) + extra as usize;
                            let distance = offset + 1;
                            self.window.check_distance(distance)?;
                            *step = SymbolStep::Copy {
                                distance,
                                remaining: *length,
                            };
                        }

                        SymbolStep::Copy {
                            distance,
                            remaining,
                        } => {
                            let n = self
                                .window
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

impl<R: Read> Decompressor for LhaStream<R> {
    fn produce(&mut self, output: &mut [u8]) -> Result<usize> {
        LhaStream::produce(self, output)
    }

    fn is_finished(&self) -> bool {
        LhaStream::is_finished(self)
    }

    fn total_out(&self) -> u64 {
        LhaStream::total_out(self)
    }
}

/// Decompress a complete LHA stream held in memory.
pub fn decode_lha(data: &[u8], method: LhaMethod, uncompressed_size: u64) -> Result<Vec<u8>> {
    let mut stream = LhaStream::new(Cursor::new(data), method, uncompressed_size)?;
    let mut output = Vec::with_capacity(uncompressed_size.min(1 << 24) as usize);
    stream.drain_into(&mut output)?;

    if !stream.is_finished() {
        return Err(LzError::unexpected_eof(stream.total_in_bits()));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream_reads_nothing() {
        let mut stream = LhaStream::new(Cursor::new(Vec::new()), LhaMethod::Lh5, 0).unwrap();
        assert!(stream.is_finished());
        assert_eq!(stream.produce(&mut [0u8; 8]).unwrap(), 0);
        assert_eq!(stream.total_in_bits(), 0);
    }

    #[test]
    fn test_zero_symbol_block() {
        let err = decode_lha(&[0x00, 0x00], LhaMethod::Lh5, 4).unwrap_err();
        assert!(matches!(err, LzError::CorruptedData { .. }));
    }

    #[test]
    fn test_single_trees_need_no_symbol_bits() {
        // 3 symbols; code lengths: single 0; litlen: single 'Z'; distances: single 0.
        // 16 + 5+5 + 9+9 + 4+4 = 52 bits, padded to 7 bytes.
        let bytes = [0x00, 0x03, 0x00, 0x00, 0x05, 0xA0, 0x00];

        let out = decode_lha(&bytes, LhaMethod::Lh5, 3).unwrap();
        assert_eq!(out, b"ZZZ");
    }

    #[test]
    fn test_copy_filling_output_then_literal() {
        // 4 symbols: 'A', 'B', <length 4, distance 2>, 'X'.
        // Code lengths 2 and 4 get 1-bit codes; 'A', 'B', 'X' and 257 get
        // 2-bit codes; the distance table is a single code 1.
        let bytes = [
            0x00, 0x04, 0x28, 0x04, 0x06, 0x04, 0x16, 0xE0, 0xAC, 0x94, 0x80, 0x8F, 0x00,
        ];
        let mut stream = LhaStream::new(Cursor::new(bytes), LhaMethod::Lh5, 7).unwrap();
        let mut buf = [0u8; 6];

        assert_eq!(stream.produce(&mut buf).unwrap(), 6);
        assert_eq!(&buf, b"ABABAB");
        assert_eq!(stream.produce(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'X');
        assert!(stream.is_finished());
        assert_eq!(stream.total_out(), 7);
        assert_eq!(decode_lha(&bytes, LhaMethod::Lh5, 7).unwrap(), b"ABABABX");
    }

    #[test]
    fn test_truncated_stream() {
        let err = decode_lha(&[0x00], LhaMethod::Lh5, 4).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_poisoned_after_error() {
        let mut stream = LhaStream::new(Cursor::new(vec![0x00, 0x00]), LhaMethod::Lh6, 1).unwrap();
        let mut out = [0u8; 4];
        assert!(stream.produce(&mut out).unwrap_err().is_format_error());
        assert!(matches!(
            stream.produce(&mut out).unwrap_err(),
            LzError::Poisoned
        ));
    }

    #[test]
    fn test_zero_input_buffer_rejected() {
        let err = LhaStream::with_input_buffer_size(
            Cursor::new(Vec::new()),
            LhaMethod::Lh5.params(),
            1,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, LzError::InvalidParameter { .. }));
    }
}
