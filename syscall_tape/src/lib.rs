// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `syscall_tape`: a flat word-tape encoding of syscall programs for an in-guest executor.
//!
//! A [`Program`](program::Program) is an ordered list of calls whose arguments are typed trees
//! (scalars, blobs, structs, unions, pointers and resource handles). The encoder lowers it into a
//! stream of little-endian `u64` words: `copyin` instructions that stage every pointee at its
//! absolute address in a per-process data segment, followed by the call itself with its direct
//! arguments inline, and a terminating `eof`. The decoder parses the stream back and checks it
//! against the syscall catalog.
//!
//! ## Example
//!
//! ```
//! use syscall_tape::catalog::{CallDesc, SyscallCatalog};
//! use syscall_tape::decode::decode;
//! use syscall_tape::encode::Encoder;
//! use syscall_tape::layout::{GroupType, Type};
//! use syscall_tape::program::{Arg, Call, CallId, Program};
//! use syscall_tape::target::{StridedSegment, Target};
//!
//! // struct { u16 a; u64 b; } passed by pointer.
//! let pair = Type::Group(GroupType::new([(Type::int(2), 0), (Type::int(8), 8)]));
//!
//! let mut cat = SyscallCatalog::new();
//! cat.push(CallDesc::new(42, "setpair", [Type::ptr(pair, 16)]));
//! let target = Target::new(8, StridedSegment::default(), cat.build()?);
//!
//! let program = Program::new([Call::new(
//!     CallId(42),
//!     [Arg::ptr(0x40, Arg::group([Arg::int(1), Arg::int(2)]))],
//! )]);
//!
//! let tape = Encoder::new(&target).encode_to_vec(&program, 1)?;
//! let exec = decode(&target.calls, &tape)?;
//! assert_eq!(exec.num_vars, 1);
//! assert_eq!(exec.calls[0].meta.name, "setpair");
//! # Ok::<(), Box<dyn core::error::Error>>(())
//! ```

#![no_std]

extern crate alloc;

pub mod catalog;
pub mod decode;
pub mod disasm;
pub mod encode;
pub mod format;
pub mod layout;
pub mod opcode;
pub mod program;
pub mod target;
pub mod verifier;
