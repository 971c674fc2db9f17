// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Word-level reading and writing for tapes.
//!
//! Writers never grow: a [`SliceWriter`] targets a caller-owned buffer with fixed capacity, and
//! a [`CountingSink`] only measures. Both go through [`WordSink`] so the encoder has one code path
//! for sizing and for emitting.

use core::fmt;

use crate::opcode::WORD_SIZE;

/// A tape word could not be written because the buffer is full.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Full;

impl fmt::Display for Full {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tape buffer is full")
    }
}

impl core::error::Error for Full {}

/// A word read failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadError {
    /// The input length is not a whole number of words.
    Misaligned {
        /// Input length in bytes.
        len: usize,
    },
    /// The input ended before the expected word.
    UnexpectedEnd {
        /// Word index that was requested.
        word: usize,
    },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned { len } => {
                write!(f, "tape length {len} is not a multiple of {WORD_SIZE}")
            }
            Self::UnexpectedEnd { word } => write!(f, "tape ended before word {word}"),
        }
    }
}

impl core::error::Error for ReadError {}

/// Destination for encoded words.
pub trait WordSink {
    /// Appends one word.
    fn push(&mut self, w: u64) -> Result<(), Full>;

    /// Returns the number of bytes written so far.
    fn len_bytes(&self) -> usize;

    /// Appends a blob as packed little-endian words, zero-filling the final partial word.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Full> {
        for chunk in bytes.chunks(WORD_SIZE) {
            self.push(pack_word(chunk))?;
        }
        Ok(())
    }
}

/// Packs up to 8 bytes into a word with the first byte least significant.
#[must_use]
pub fn pack_word(chunk: &[u8]) -> u64 {
    let mut b = [0_u8; WORD_SIZE];
    let n = chunk.len().min(WORD_SIZE);
    b[..n].copy_from_slice(&chunk[..n]);
    u64::from_le_bytes(b)
}

/// Writes words into a fixed-capacity caller buffer.
#[derive(Debug)]
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> SliceWriter<'a> {
    /// Creates a writer at the start of `buf`. Trailing bytes short of a full word are unused.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Returns the buffer capacity in bytes, rounded down to whole words.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len() - self.buf.len() % WORD_SIZE
    }

    /// Overwrites the first word with `w`, if the buffer holds at least one word.
    pub fn stamp_first(&mut self, w: u64) {
        if let Some(first) = self.buf.get_mut(..WORD_SIZE) {
            first.copy_from_slice(&w.to_le_bytes());
        }
    }
}

impl WordSink for SliceWriter<'_> {
    #[inline]
    fn push(&mut self, w: u64) -> Result<(), Full> {
        let end = self.offset + WORD_SIZE;
        let dst = self.buf.get_mut(self.offset..end).ok_or(Full)?;
        dst.copy_from_slice(&w.to_le_bytes());
        self.offset = end;
        Ok(())
    }

    fn len_bytes(&self) -> usize {
        self.offset
    }
}

/// Counts words without storing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountingSink {
    words: usize,
}

impl CountingSink {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WordSink for CountingSink {
    #[inline]
    fn push(&mut self, _w: u64) -> Result<(), Full> {
        self.words += 1;
        Ok(())
    }

    fn len_bytes(&self) -> usize {
        self.words * WORD_SIZE
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Full> {
        self.words += crate::opcode::data_words(bytes.len());
        Ok(())
    }
}

/// A bounds-checked reader over tape words.
#[derive(Clone, Debug)]
pub struct WordReader<'a> {
    bytes: &'a [u8],
    word: usize,
}

impl<'a> WordReader<'a> {
    /// Creates a reader over `bytes`, which must be a whole number of words.
    pub fn new(bytes: &'a [u8]) -> Result<Self, ReadError> {
        if bytes.len() % WORD_SIZE != 0 {
            return Err(ReadError::Misaligned { len: bytes.len() });
        }
        Ok(Self { bytes, word: 0 })
    }

    /// Returns the index of the next word to be read.
    #[must_use]
    pub fn position(&self) -> usize {
        self.word
    }

    /// Returns the number of unread words.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() / WORD_SIZE - self.word
    }

    /// Reads one word.
    pub fn read(&mut self) -> Result<u64, ReadError> {
        let start = self.word * WORD_SIZE;
        let b = self
            .bytes
            .get(start..start + WORD_SIZE)
            .ok_or(ReadError::UnexpectedEnd { word: self.word })?;
        self.word += 1;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads `n` words, failing before consuming anything if fewer remain.
    pub fn read_n(&mut self, n: usize) -> Result<impl Iterator<Item = u64> + use<'a>, ReadError> {
        if n > self.remaining() {
            return Err(ReadError::UnexpectedEnd {
                word: self.word + self.remaining(),
            });
        }
        let bytes = self.bytes;
        let start = self.word * WORD_SIZE;
        let span = &bytes[start..start + n * WORD_SIZE];
        self.word += n;
        Ok(span.chunks_exact(WORD_SIZE).map(pack_word))
    }
}
