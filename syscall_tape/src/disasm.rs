// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disassembler for tapes.
//!
//! One instruction per line, prefixed with the word index of its leading word. Calls are shown
//! as `rN = name(args)` where `N` is the result slot, so `result[..] rN` operands can be read
//! back to their producer.

#![allow(clippy::module_name_repetitions, reason = "public API module")]

use alloc::vec::Vec;
use core::fmt;

use crate::catalog::CallTable;
use crate::decode::{ArgEncoding, DecodeError, DecodedInstr, TapeInstr, decode_prefix};
use crate::opcode::WORD_SIZE;

/// Disassembles `bytes`, naming calls from `calls`.
///
/// This is best-effort: ids absent from `calls` are printed numerically, and a malformed tape
/// renders every instruction before the fault followed by the error.
#[must_use]
pub fn disassemble<'a>(calls: &'a CallTable, bytes: &[u8]) -> Disassembly<'a> {
    let (instrs, error) = decode_prefix(bytes);
    Disassembly {
        calls,
        words: bytes.len() / WORD_SIZE,
        instrs,
        error,
    }
}

/// A disassembled tape.
#[derive(Clone, Debug)]
pub struct Disassembly<'a> {
    calls: &'a CallTable,
    words: usize,
    instrs: Vec<DecodedInstr>,
    error: Option<DecodeError>,
}

impl Disassembly<'_> {
    /// Returns the decode error, if the tape is malformed.
    pub fn error(&self) -> Option<&DecodeError> {
        self.error.as_ref()
    }

    /// Iterate over the instructions decoded before any error.
    pub fn instrs(&self) -> impl Iterator<Item = &DecodedInstr> + '_ {
        self.instrs.iter()
    }
}

impl fmt::Display for ArgEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const {
                size,
                value,
                bit_offset,
                bit_len,
            } => {
                write!(f, "const[{size}] {value:#x}")?;
                if *bit_len != 0 {
                    write!(f, " bits={bit_offset}+{bit_len}")?;
                }
                Ok(())
            }
            Self::Data { size, .. } => {
                write!(f, "data[{size}]")?;
                for b in self.data_bytes().unwrap_or_default() {
                    write!(f, " {b:02x}")?;
                }
                Ok(())
            }
            Self::Result {
                size,
                slot,
                default,
            } => write!(f, "result[{size}] r{slot} default={default:#x}"),
        }
    }
}

fn fmt_args(f: &mut fmt::Formatter<'_>, args: &[ArgEncoding]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "{a}")?;
    }
    Ok(())
}

impl fmt::Display for TapeInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CopyIn { addr, arg } => write!(f, "copyin {addr:#x}, {arg}"),
            Self::Call { id, args } => {
                write!(f, "call #{}(", id.0)?;
                fmt_args(f, args)?;
                write!(f, ")")
            }
            Self::Eof => write!(f, "eof"),
        }
    }
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; words={}", self.words)?;
        let mut slot = 0_usize;
        for d in &self.instrs {
            write!(f, "{:06}: ", d.word)?;
            match &d.instr {
                TapeInstr::Call { id, args } => {
                    match self.calls.get(*id) {
                        Some(desc) => write!(f, "r{slot} = {}(", desc.name)?,
                        None => write!(f, "r{slot} = syscall#{}(", id.0)?,
                    }
                    fmt_args(f, args)?;
                    write!(f, ")")?;
                    slot += 1;
                }
                other => write!(f, "{other}")?,
            }
            writeln!(f)?;
        }
        match &self.error {
            Some(e) => writeln!(f, "<decode error: {e}>"),
            None => Ok(()),
        }
    }
}
