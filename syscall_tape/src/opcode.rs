// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Word values shared by the tape encoder and decoder.
//!
//! A tape is a stream of little-endian `u64` words. The leading word of every instruction is
//! either one of the reserved instruction words below or a syscall id (a call instruction). The
//! leading word of every argument encoding is an [`ArgTag`].

/// Size in bytes of one tape word.
pub const WORD_SIZE: usize = 8;

/// Default tape buffer size handed to the executor.
pub const EXEC_BUFFER_SIZE: usize = 2 << 20;

/// Terminal sentinel. Always the final word of a well-formed tape.
pub const INSTR_EOF: u64 = u64::MAX;
/// Stage an argument encoding at an absolute address.
pub const INSTR_COPYIN: u64 = u64::MAX - 1;
/// Written over the first word of a buffer whose encode failed.
pub const INSTR_POISON: u64 = u64::MAX - 2;

/// Lowest word reserved for instructions. Syscall ids must be strictly below this value.
pub const RESERVED_INSTR_BASE: u64 = u64::MAX - 15;

/// Scalar argument encoding tag.
pub const ARG_CONST: u64 = 0;
/// Deferred reference to an earlier call's output slot.
pub const ARG_RESULT: u64 = 1;
/// Byte blob argument encoding tag.
pub const ARG_DATA: u64 = 2;

/// The leading word of an instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstrWord {
    /// [`INSTR_EOF`].
    Eof,
    /// [`INSTR_COPYIN`].
    CopyIn,
    /// [`INSTR_POISON`].
    Poison,
    /// A reserved word with no assigned meaning.
    Reserved(u64),
    /// A syscall id.
    Call(u64),
}

impl InstrWord {
    /// Classifies a leading instruction word.
    #[must_use]
    pub const fn from_word(w: u64) -> Self {
        match w {
            INSTR_EOF => Self::Eof,
            INSTR_COPYIN => Self::CopyIn,
            INSTR_POISON => Self::Poison,
            w if w >= RESERVED_INSTR_BASE => Self::Reserved(w),
            w => Self::Call(w),
        }
    }

    /// Returns the raw word value.
    #[must_use]
    pub const fn word(self) -> u64 {
        match self {
            Self::Eof => INSTR_EOF,
            Self::CopyIn => INSTR_COPYIN,
            Self::Poison => INSTR_POISON,
            Self::Reserved(w) | Self::Call(w) => w,
        }
    }
}

/// The leading word of an argument encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgTag {
    /// [`ARG_CONST`]: `[tag, size, value, bit_offset, bit_len]`.
    Const,
    /// [`ARG_RESULT`]: `[tag, size, slot, default]`.
    Result,
    /// [`ARG_DATA`]: `[tag, size, words...]`.
    Data,
}

impl ArgTag {
    /// Returns the tag word value.
    #[must_use]
    pub const fn word(self) -> u64 {
        match self {
            Self::Const => ARG_CONST,
            Self::Result => ARG_RESULT,
            Self::Data => ARG_DATA,
        }
    }

    /// Parses a tag word.
    #[must_use]
    pub const fn from_word(w: u64) -> Option<Self> {
        match w {
            ARG_CONST => Some(Self::Const),
            ARG_RESULT => Some(Self::Result),
            ARG_DATA => Some(Self::Data),
            _ => None,
        }
    }

    /// Number of operand words following the tag, for fixed-shape encodings.
    ///
    /// Data encodings have a variable tail and report only their `size` word here.
    #[must_use]
    pub const fn fixed_operands(self) -> usize {
        match self {
            Self::Const => 4,
            Self::Result => 3,
            Self::Data => 1,
        }
    }
}

/// Number of words needed to carry `len` bytes of blob data.
#[must_use]
pub const fn data_words(len: usize) -> usize {
    len.div_ceil(WORD_SIZE)
}

/// Returns `true` for the scalar widths an executor can store in one access.
#[must_use]
pub const fn is_scalar_size(size: u64) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}
