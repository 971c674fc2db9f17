// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tape decoder.
//!
//! [`decode_instructions`] parses the raw instruction stream and needs no catalog.
//! [`decode`] additionally resolves every call id against a [`CallTable`] and checks the
//! structural rules an executor relies on.

use alloc::vec::Vec;
use core::fmt;

use crate::catalog::{CallDesc, CallTable};
use crate::format::{ReadError, WordReader};
use crate::opcode::{ArgTag, InstrWord, data_words, is_scalar_size};
use crate::program::CallId;

/// One decoded argument encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgEncoding {
    /// Scalar, already in storage byte order.
    Const {
        /// Field width in bytes.
        size: u64,
        /// Stored value.
        value: u64,
        /// First bit of a bit-field.
        bit_offset: u64,
        /// Bit-field length, `0` for whole-byte fields.
        bit_len: u64,
    },
    /// Blob of `size` bytes packed into little-endian words.
    Data {
        /// Blob length in bytes.
        size: u64,
        /// Packed words; bytes past `size` in the final word are padding.
        words: Vec<u64>,
    },
    /// Deferred reference to an earlier call's result.
    Result {
        /// Handle width in bytes.
        size: u64,
        /// Producing call position.
        slot: u64,
        /// Value used if the producer did not yield a handle.
        default: u64,
    },
}

impl ArgEncoding {
    /// Returns the blob bytes of a data encoding, without padding.
    #[must_use]
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        let Self::Data { size, words } = self else {
            return None;
        };
        let len = usize::try_from(*size).ok()?;
        let mut out: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        out.truncate(len);
        Some(out)
    }
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapeInstr {
    /// Stage `arg` at absolute address `addr`.
    CopyIn {
        /// Destination address.
        addr: u64,
        /// Staged value.
        arg: ArgEncoding,
    },
    /// Invoke syscall `id`.
    Call {
        /// Syscall id.
        id: CallId,
        /// Inline arguments.
        args: Vec<ArgEncoding>,
    },
    /// End of tape.
    Eof,
}

/// A decoded call bound to its descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExecCall<'a> {
    /// Catalog descriptor of the invoked syscall.
    pub meta: &'a CallDesc,
    /// Position of the call in the tape, which is also its result slot.
    pub index: usize,
}

/// A decoded program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecProg<'a> {
    /// Calls in tape order.
    pub calls: Vec<ExecCall<'a>>,
    /// Number of result slots the executor must reserve.
    pub num_vars: usize,
}

/// Decoding failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Input is not a whole number of words.
    Misaligned {
        /// Input length in bytes.
        len: usize,
    },
    /// An instruction or argument is cut off.
    Truncated {
        /// Word index that was missing.
        word: usize,
    },
    /// No [`INSTR_EOF`](crate::opcode::INSTR_EOF) before the end of input.
    MissingEof,
    /// Words follow the [`INSTR_EOF`](crate::opcode::INSTR_EOF).
    TrailingWords {
        /// Number of extra words.
        count: usize,
    },
    /// The tape was poisoned by a failed encode.
    Poisoned {
        /// Word index of the poison word.
        at: usize,
    },
    /// A reserved instruction word with no meaning.
    ReservedInstr {
        /// Word index.
        at: usize,
        /// The word.
        word: u64,
    },
    /// An argument tag that is not `CONST`, `RESULT` or `DATA`.
    UnknownArgTag {
        /// Word index.
        at: usize,
        /// The tag word.
        tag: u64,
    },
    /// A scalar width other than 1, 2, 4 or 8.
    InvalidScalarSize {
        /// Word index of the argument.
        at: usize,
        /// The width.
        size: u64,
    },
    /// A bit-field that does not fit in its field.
    BitFieldRange {
        /// Word index of the argument.
        at: usize,
    },
    /// A call id absent from the catalog.
    UnknownCallId {
        /// Call position.
        call: usize,
        /// The id.
        id: CallId,
    },
    /// A call's argument count disagrees with its descriptor.
    ArgCountMismatch {
        /// Call position.
        call: usize,
        /// Descriptor argument count.
        expected: usize,
        /// Encoded argument count.
        actual: usize,
    },
    /// A result reference to a slot that is not an earlier call.
    ResultSlot {
        /// Position of the call the reference belongs to.
        call: usize,
        /// The referenced slot.
        slot: u64,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned { len } => write!(f, "tape length {len} is not word aligned"),
            Self::Truncated { word } => write!(f, "tape truncated at word {word}"),
            Self::MissingEof => write!(f, "tape has no eof"),
            Self::TrailingWords { count } => write!(f, "{count} words after eof"),
            Self::Poisoned { at } => write!(f, "poisoned tape (word {at})"),
            Self::ReservedInstr { at, word } => {
                write!(f, "reserved instruction 0x{word:016x} at word {at}")
            }
            Self::UnknownArgTag { at, tag } => write!(f, "unknown argument tag {tag} at word {at}"),
            Self::InvalidScalarSize { at, size } => {
                write!(f, "invalid scalar size {size} at word {at}")
            }
            Self::BitFieldRange { at } => write!(f, "bit-field out of range at word {at}"),
            Self::UnknownCallId { call, id } => write!(f, "call {call}: unknown syscall id {}", id.0),
            Self::ArgCountMismatch {
                call,
                expected,
                actual,
            } => write!(f, "call {call}: expected {expected} arguments, got {actual}"),
            Self::ResultSlot { call, slot } => {
                write!(f, "call {call}: result slot {slot} does not precede it")
            }
        }
    }
}

impl core::error::Error for DecodeError {}

impl From<ReadError> for DecodeError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Misaligned { len } => Self::Misaligned { len },
            ReadError::UnexpectedEnd { word } => Self::Truncated { word },
        }
    }
}

fn read_arg(r: &mut WordReader<'_>) -> Result<ArgEncoding, DecodeError> {
    let at = r.position();
    let tag = r.read()?;
    let tag = ArgTag::from_word(tag).ok_or(DecodeError::UnknownArgTag { at, tag })?;
    match tag {
        ArgTag::Const => {
            let mut ops = r.read_n(tag.fixed_operands())?;
            let mut next = || ops.next().unwrap_or(0);
            let (size, value, bit_offset, bit_len) = (next(), next(), next(), next());
            if !is_scalar_size(size) {
                return Err(DecodeError::InvalidScalarSize { at, size });
            }
            if bit_len != 0 && bit_offset.checked_add(bit_len).is_none_or(|e| e > size * 8) {
                return Err(DecodeError::BitFieldRange { at });
            }
            Ok(ArgEncoding::Const {
                size,
                value,
                bit_offset,
                bit_len,
            })
        }
        ArgTag::Result => {
            let mut ops = r.read_n(tag.fixed_operands())?;
            let mut next = || ops.next().unwrap_or(0);
            let (size, slot, default) = (next(), next(), next());
            if !is_scalar_size(size) {
                return Err(DecodeError::InvalidScalarSize { at, size });
            }
            Ok(ArgEncoding::Result {
                size,
                slot,
                default,
            })
        }
        ArgTag::Data => {
            let size = r.read()?;
            let n = usize::try_from(size)
                .ok()
                .map(data_words)
                .filter(|&n| n <= r.remaining())
                .ok_or(DecodeError::Truncated {
                    word: r.position() + r.remaining(),
                })?;
            let words = r.read_n(n)?.collect();
            Ok(ArgEncoding::Data { size, words })
        }
    }
}

/// A decoded instruction with its word position in the tape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedInstr {
    /// Index of the instruction's leading word.
    pub word: usize,
    /// The instruction.
    pub instr: TapeInstr,
}

/// Parses the raw instruction stream, ending with [`TapeInstr::Eof`].
///
/// Fails on misaligned or truncated input, unknown tags, reserved or poison words, a missing
/// terminator, and anything following it.
pub fn decode_instructions(bytes: &[u8]) -> Result<Vec<TapeInstr>, DecodeError> {
    Ok(decode_positioned(bytes)?
        .into_iter()
        .map(|d| d.instr)
        .collect())
}

/// Like [`decode_instructions`], keeping each instruction's word position.
pub fn decode_positioned(bytes: &[u8]) -> Result<Vec<DecodedInstr>, DecodeError> {
    match decode_prefix(bytes) {
        (out, None) => Ok(out),
        (_, Some(e)) => Err(e),
    }
}

/// Parses as far as the tape is well formed.
///
/// Returns every instruction decoded before the first fault, and the fault itself if there is
/// one. A partially read instruction is not included.
pub fn decode_prefix(bytes: &[u8]) -> (Vec<DecodedInstr>, Option<DecodeError>) {
    let mut out = Vec::new();
    let err = match WordReader::new(bytes) {
        Ok(mut r) => parse_into(&mut r, &mut out).err(),
        Err(e) => Some(e.into()),
    };
    (out, err)
}

fn parse_into(r: &mut WordReader<'_>, out: &mut Vec<DecodedInstr>) -> Result<(), DecodeError> {
    loop {
        if r.remaining() == 0 {
            return Err(DecodeError::MissingEof);
        }
        let at = r.position();
        let instr = match InstrWord::from_word(r.read()?) {
            InstrWord::Eof => {
                out.push(DecodedInstr {
                    word: at,
                    instr: TapeInstr::Eof,
                });
                if r.remaining() != 0 {
                    return Err(DecodeError::TrailingWords {
                        count: r.remaining(),
                    });
                }
                return Ok(());
            }
            InstrWord::CopyIn => {
                let addr = r.read()?;
                let arg = read_arg(r)?;
                TapeInstr::CopyIn { addr, arg }
            }
            InstrWord::Poison => return Err(DecodeError::Poisoned { at }),
            InstrWord::Reserved(word) => return Err(DecodeError::ReservedInstr { at, word }),
            InstrWord::Call(id) => {
                let argc = r.read()?;
                // Every argument takes at least two words.
                let argc = usize::try_from(argc)
                    .ok()
                    .filter(|&n| n <= r.remaining() / 2)
                    .ok_or(DecodeError::Truncated {
                        word: r.position() + r.remaining(),
                    })?;
                let mut args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    args.push(read_arg(r)?);
                }
                TapeInstr::Call {
                    id: CallId(id),
                    args,
                }
            }
        };
        out.push(DecodedInstr { word: at, instr });
    }
}

fn check_result_slot(arg: &ArgEncoding, call: usize) -> Result<(), DecodeError> {
    match *arg {
        ArgEncoding::Result { slot, .. } if !usize::try_from(slot).is_ok_and(|s| s < call) => {
            Err(DecodeError::ResultSlot { call, slot })
        }
        _ => Ok(()),
    }
}

/// Decodes a tape against `calls`, binding every call instruction to its descriptor.
///
/// Result references, inline or staged by a preceding copyin, must name an earlier call.
pub fn decode<'a>(calls: &'a CallTable, bytes: &[u8]) -> Result<ExecProg<'a>, DecodeError> {
    let instrs = decode_instructions(bytes)?;
    let mut prog = ExecProg {
        calls: Vec::new(),
        num_vars: 0,
    };
    for instr in &instrs {
        let index = prog.calls.len();
        match instr {
            TapeInstr::CopyIn { arg, .. } => check_result_slot(arg, index)?,
            TapeInstr::Call { id, args } => {
                let meta = calls.get(*id).ok_or(DecodeError::UnknownCallId {
                    call: index,
                    id: *id,
                })?;
                if meta.args.len() != args.len() {
                    return Err(DecodeError::ArgCountMismatch {
                        call: index,
                        expected: meta.args.len(),
                        actual: args.len(),
                    });
                }
                for arg in args {
                    check_result_slot(arg, index)?;
                }
                prog.calls.push(ExecCall { meta, index });
            }
            TapeInstr::Eof => {}
        }
    }
    prog.num_vars = prog.calls.len();
    tracing::debug!(
        calls = prog.calls.len(),
        words = bytes.len() / crate::opcode::WORD_SIZE,
        "decoded tape"
    );
    Ok(prog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SyscallCatalog;
    use crate::layout::Type;
    use crate::opcode::{
        ARG_CONST, ARG_DATA, ARG_RESULT, INSTR_COPYIN, INSTR_EOF, INSTR_POISON,
        RESERVED_INSTR_BASE,
    };

    fn tape(words: &[u64]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn table() -> CallTable {
        let fd = Type::Resource(crate::layout::ResourceType {
            size: 4,
            default: 0,
        });
        SyscallCatalog::from_iter([
            CallDesc::new(1, "open", [Type::int(8)]),
            CallDesc::new(2, "close", [fd]),
            CallDesc::new(3, "getpid", []),
        ])
        .build()
        .unwrap()
    }

    #[test]
    fn parses_every_instruction_kind() {
        let t = tape(&[
            INSTR_COPYIN, 0x100, ARG_DATA, 3, 0x03_0201,
            1, 1, ARG_CONST, 8, 0x100, 0, 0,
            2, 1, ARG_RESULT, 4, 0, 7,
            INSTR_EOF,
        ]);
        let instrs = decode_instructions(&t).unwrap();
        assert_eq!(instrs.len(), 4);
        let TapeInstr::CopyIn { addr, arg } = &instrs[0] else {
            panic!("expected copyin, got {:?}", instrs[0]);
        };
        assert_eq!(*addr, 0x100);
        assert_eq!(arg.data_bytes(), Some(alloc::vec![1, 2, 3]));
        assert_eq!(
            instrs[2],
            TapeInstr::Call {
                id: CallId(2),
                args: alloc::vec![ArgEncoding::Result {
                    size: 4,
                    slot: 0,
                    default: 7,
                }],
            }
        );
        assert_eq!(instrs[3], TapeInstr::Eof);

        let calls = table();
        let prog = decode(&calls, &t).unwrap();
        assert_eq!(prog.num_vars, 2);
        let names: Vec<_> = prog.calls.iter().map(|c| c.meta.name.as_str()).collect();
        assert_eq!(names, ["open", "close"]);
        assert_eq!(prog.calls[1].index, 1);
    }

    #[test]
    fn structural_errors() {
        let cases: [(&[u64], DecodeError); 7] = [
            (&[], DecodeError::MissingEof),
            (&[3, 0], DecodeError::MissingEof),
            (&[INSTR_EOF, 0], DecodeError::TrailingWords { count: 1 }),
            (&[INSTR_POISON, INSTR_EOF], DecodeError::Poisoned { at: 0 }),
            (
                &[RESERVED_INSTR_BASE, INSTR_EOF],
                DecodeError::ReservedInstr {
                    at: 0,
                    word: RESERVED_INSTR_BASE,
                },
            ),
            (
                &[1, 1, 9, INSTR_EOF],
                DecodeError::UnknownArgTag { at: 2, tag: 9 },
            ),
            (
                &[1, 1, ARG_CONST, 3, 0, 0, 0, INSTR_EOF],
                DecodeError::InvalidScalarSize { at: 2, size: 3 },
            ),
        ];
        for (words, err) in cases {
            assert_eq!(decode_instructions(&tape(words)), Err(err), "{words:x?}");
        }
        assert_eq!(
            decode_instructions(&[0; 12]),
            Err(DecodeError::Misaligned { len: 12 })
        );
    }

    #[test]
    fn truncation_is_detected() {
        let full = [1, 1, ARG_CONST, 8, 5, 0, 0, INSTR_EOF];
        for cut in 1..full.len() {
            let err = decode_instructions(&tape(&full[..cut])).unwrap_err();
            assert!(
                matches!(err, DecodeError::Truncated { .. } | DecodeError::MissingEof),
                "cut {cut}: {err:?}"
            );
        }
        // A blob length claiming more words than remain.
        let t = tape(&[INSTR_COPYIN, 0, ARG_DATA, 1 << 40, INSTR_EOF]);
        assert!(matches!(
            decode_instructions(&t),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn prefix_stops_at_the_first_fault() {
        let t = tape(&[3, 0, INSTR_COPYIN, 0x10, ARG_CONST, 8, 1, 0, 0, INSTR_POISON, INSTR_EOF]);
        let (instrs, err) = decode_prefix(&t);
        assert_eq!(err, Some(DecodeError::Poisoned { at: 9 }));
        let words: Vec<_> = instrs.iter().map(|d| d.word).collect();
        assert_eq!(words, [0, 2]);

        let (instrs, err) = decode_prefix(&[0; 5]);
        assert!(instrs.is_empty());
        assert_eq!(err, Some(DecodeError::Misaligned { len: 5 }));

        let (instrs, err) = decode_prefix(&tape(&[3, 0, INSTR_EOF]));
        assert_eq!(err, None);
        assert_eq!(instrs.len(), 2);
    }

    #[test]
    fn bitfield_must_fit() {
        let t = tape(&[1, 1, ARG_CONST, 1, 0, 4, 5, INSTR_EOF]);
        assert_eq!(
            decode_instructions(&t),
            Err(DecodeError::BitFieldRange { at: 2 })
        );
    }

    #[test]
    fn catalog_checks() {
        let calls = table();
        assert_eq!(
            decode(&calls, &tape(&[9, 0, INSTR_EOF])),
            Err(DecodeError::UnknownCallId {
                call: 0,
                id: CallId(9),
            })
        );
        assert_eq!(
            decode(&calls, &tape(&[3, 1, ARG_CONST, 8, 0, 0, 0, INSTR_EOF])),
            Err(DecodeError::ArgCountMismatch {
                call: 0,
                expected: 0,
                actual: 1,
            })
        );
        assert_eq!(
            decode(&calls, &tape(&[2, 1, ARG_RESULT, 4, 0, 0, INSTR_EOF])),
            Err(DecodeError::ResultSlot { call: 0, slot: 0 })
        );
        // A staged result belongs to the call that follows it.
        assert_eq!(
            decode(
                &calls,
                &tape(&[
                    3, 0,
                    INSTR_COPYIN, 0x10, ARG_RESULT, 4, 1, 0,
                    3, 0,
                    INSTR_EOF,
                ])
            ),
            Err(DecodeError::ResultSlot { call: 1, slot: 1 })
        );
    }
}
