// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Program to tape encoder.
//!
//! Each call is lowered in two parts: the `copyin` instructions that stage pointees in the data
//! segment, and the inline argument encodings that follow `[id, argc]`. Pointer resolution is an
//! explicit traversal returning `(address, staged copyins)`; the encoder itself is immutable and
//! carries no state between programs.
//!
//! ## Example
//!
//! ```
//! use syscall_tape::catalog::{CallDesc, SyscallCatalog};
//! use syscall_tape::encode::encode;
//! use syscall_tape::layout::Type;
//! use syscall_tape::opcode::{ARG_CONST, INSTR_EOF};
//! use syscall_tape::program::{Arg, Call, CallId, Program};
//! use syscall_tape::target::{StridedSegment, Target};
//!
//! let mut cat = SyscallCatalog::new();
//! cat.push(CallDesc::new(3, "close", [Type::int(4)]));
//! let target = Target::new(8, StridedSegment::default(), cat.build().unwrap());
//!
//! let p = Program::new([Call::new(CallId(3), [Arg::int(7)])]);
//! let mut buf = [0_u8; 128];
//! let n = encode(&target, &p, &mut buf, 0).unwrap();
//!
//! let words: Vec<u64> = buf[..n]
//!     .chunks_exact(8)
//!     .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
//!     .collect();
//! assert_eq!(words, [3, 1, ARG_CONST, 4, 7, 0, 0, INSTR_EOF]);
//! ```

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::catalog::CallDesc;
use crate::format::{Full, SliceWriter, WordSink};
use crate::layout::{ConstType, GroupType, LayoutFacts, PointerType, Precomputed, Type};
use crate::opcode::{ARG_CONST, ARG_DATA, ARG_RESULT, INSTR_COPYIN, INSTR_EOF, INSTR_POISON};
use crate::program::{Arg, CallId, Program};
use crate::target::{DataSegment, StridedSegment, Target};
use crate::verifier::{check_data_len, check_producer, check_scalar, kind_mismatch, union_option};

/// An argument or pointee that does not fit the shape its type promises.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A call has the wrong number of arguments for its descriptor.
    ArgCount {
        /// Descriptor argument count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },
    /// A value's kind does not match its type's kind.
    KindMismatch {
        /// Type kind.
        expected: &'static str,
        /// Value kind.
        got: &'static str,
    },
    /// A group value has the wrong number of members.
    FieldCount {
        /// Type member count.
        expected: usize,
        /// Value member count.
        actual: usize,
    },
    /// The layout provider has no offset for a group member.
    MissingFieldOffset {
        /// Member index.
        index: usize,
    },
    /// A union selects an option that does not exist.
    UnionIndex {
        /// Selected index.
        index: usize,
        /// Number of options.
        options: usize,
    },
    /// A fixed-size blob has the wrong length.
    DataLength {
        /// Type length.
        expected: u64,
        /// Value length.
        actual: usize,
    },
    /// A scalar width is not 1, 2, 4 or 8 bytes.
    ScalarSize {
        /// Offending width.
        size: u64,
    },
    /// A bit-field does not fit in its field span.
    BitFieldRange {
        /// Field width in bytes.
        size: u64,
        /// First bit.
        bit_offset: u64,
        /// Bit length.
        bit_len: u64,
    },
    /// A resource refers to a call at the same or a later position.
    ForwardReference {
        /// Referenced call position.
        producer: usize,
    },
    /// A null pointer carries a pointee.
    NullWithPointee,
    /// A resolved address does not fit in 64 bits.
    AddressOverflow,
    /// A group passed by value as a direct call argument.
    GroupByValue,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgCount { expected, actual } => {
                write!(f, "expected {expected} arguments, got {actual}")
            }
            Self::KindMismatch { expected, got } => {
                write!(f, "{got} value where {expected} type expected")
            }
            Self::FieldCount { expected, actual } => {
                write!(f, "group has {actual} members, type has {expected}")
            }
            Self::MissingFieldOffset { index } => {
                write!(f, "no layout offset for group member {index}")
            }
            Self::UnionIndex { index, options } => {
                write!(f, "union option {index} out of range ({options} options)")
            }
            Self::DataLength { expected, actual } => {
                write!(f, "blob length {actual}, type requires {expected}")
            }
            Self::ScalarSize { size } => write!(f, "unsupported scalar width {size}"),
            Self::BitFieldRange {
                size,
                bit_offset,
                bit_len,
            } => write!(
                f,
                "bit-field {bit_offset}+{bit_len} exceeds {size}-byte field"
            ),
            Self::ForwardReference { producer } => {
                write!(f, "resource refers to call {producer}, which does not precede it")
            }
            Self::NullWithPointee => write!(f, "null pointer with a pointee"),
            Self::AddressOverflow => write!(f, "pointer address overflows"),
            Self::GroupByValue => write!(f, "group passed by value as a call argument"),
        }
    }
}

impl core::error::Error for InvariantViolation {}

/// Encoding failure. The buffer contents are never a usable tape after one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// The tape did not fit into the buffer.
    BufferTooSmall {
        /// Buffer capacity in bytes (whole words only).
        capacity: usize,
    },
    /// A call names an id absent from the catalog.
    UnknownCallId {
        /// Call position.
        call: usize,
        /// The unknown id.
        id: CallId,
    },
    /// The process slot has no data segment.
    InvalidProcessSlot {
        /// The requested slot.
        slot: usize,
    },
    /// A call's arguments violate their descriptor.
    Invariant {
        /// Call position.
        call: usize,
        /// What was violated.
        violation: InvariantViolation,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { capacity } => {
                write!(f, "tape does not fit in {capacity}-byte buffer")
            }
            Self::UnknownCallId { call, id } => {
                write!(f, "call {call}: unknown syscall id {}", id.0)
            }
            Self::InvalidProcessSlot { slot } => write!(f, "invalid process slot {slot}"),
            Self::Invariant { call, violation } => write!(f, "call {call}: {violation}"),
        }
    }
}

impl core::error::Error for EncodeError {}

/// One argument encoding, borrowing blob bytes from the program.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Enc<'p> {
    Const {
        size: u64,
        value: u64,
        bit_offset: u64,
        bit_len: u64,
    },
    Data {
        bytes: &'p [u8],
    },
    Result {
        size: u64,
        slot: u64,
        default: u64,
    },
}

impl Enc<'_> {
    const fn word(size: u64, value: u64) -> Self {
        Self::Const {
            size,
            value,
            bit_offset: 0,
            bit_len: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CopyIn<'p> {
    addr: u64,
    arg: Enc<'p>,
}

/// Lowers one call's arguments against the layout facts.
struct Lowering<'e, L> {
    layout: &'e L,
    ptr_size: u64,
    base: u64,
    call: usize,
}

impl<'p, L: LayoutFacts> Lowering<'_, L> {
    /// Lowers a direct call argument into its inline encoding plus staged pointees.
    fn lower_arg(
        &self,
        arg: &'p Arg,
        ty: &Type,
    ) -> Result<(Enc<'p>, Vec<CopyIn<'p>>), InvariantViolation> {
        match (arg, ty) {
            (Arg::Const { value }, Type::Const(ct)) => Ok((self.scalar(ct, *value)?, Vec::new())),
            (Arg::Data { bytes }, Type::Data(dt)) => {
                check_data_len(dt.size, bytes)?;
                Ok((Enc::Data { bytes }, Vec::new()))
            }
            (Arg::Union { index, value }, Type::Union(ut)) => {
                let opt = union_option(*index, &ut.options)?;
                self.lower_arg(value, opt)
            }
            (Arg::Pointer { address, pointee }, Type::Pointer(pt)) => {
                let (addr, staged) = self.resolve_pointer(*address, pointee.as_deref(), pt)?;
                Ok((self.pointer_word(addr)?, staged))
            }
            (Arg::Result { producer, literal }, Type::Resource(rt)) => {
                Ok((self.resource(rt.size, *producer, *literal)?, Vec::new()))
            }
            (Arg::Group { .. }, Type::Group(_)) => Err(InvariantViolation::GroupByValue),
            (arg, ty) => Err(kind_mismatch(arg, ty)),
        }
    }

    /// Resolves a pointer to its absolute address and the copyins that materialize its pointee.
    fn resolve_pointer(
        &self,
        address: Option<u64>,
        pointee: Option<&'p Arg>,
        pt: &PointerType,
    ) -> Result<(u64, Vec<CopyIn<'p>>), InvariantViolation> {
        let Some(offset) = address else {
            return match pointee {
                Some(_) => Err(InvariantViolation::NullWithPointee),
                None => Ok((0, Vec::new())),
            };
        };
        let addr = self
            .base
            .checked_add(offset)
            .ok_or(InvariantViolation::AddressOverflow)?;
        let mut staged = Vec::new();
        if let Some(pointee) = pointee {
            self.stage(pointee, &pt.elem, addr, &mut staged)?;
        }
        Ok((addr, staged))
    }

    /// Emits copyins for every leaf of `arg` placed at `addr`, in depth-first order.
    fn stage(
        &self,
        arg: &'p Arg,
        ty: &Type,
        addr: u64,
        out: &mut Vec<CopyIn<'p>>,
    ) -> Result<(), InvariantViolation> {
        match (arg, ty) {
            (Arg::Const { value }, Type::Const(ct)) => {
                out.push(CopyIn {
                    addr,
                    arg: self.scalar(ct, *value)?,
                });
            }
            (Arg::Data { bytes }, Type::Data(dt)) => {
                check_data_len(dt.size, bytes)?;
                out.push(CopyIn {
                    addr,
                    arg: Enc::Data { bytes },
                });
            }
            (Arg::Group { fields }, Type::Group(gt)) => self.stage_group(fields, gt, addr, out)?,
            (Arg::Union { index, value }, Type::Union(ut)) => {
                let opt = union_option(*index, &ut.options)?;
                self.stage(value, opt, addr, out)?;
            }
            (Arg::Pointer { address, pointee }, Type::Pointer(pt)) => {
                let (target, staged) = self.resolve_pointer(*address, pointee.as_deref(), pt)?;
                out.push(CopyIn {
                    addr,
                    arg: self.pointer_word(target)?,
                });
                out.extend(staged);
            }
            (Arg::Result { producer, literal }, Type::Resource(rt)) => {
                out.push(CopyIn {
                    addr,
                    arg: self.resource(rt.size, *producer, *literal)?,
                });
            }
            (arg, ty) => return Err(kind_mismatch(arg, ty)),
        }
        Ok(())
    }

    fn stage_group(
        &self,
        fields: &'p [Arg],
        gt: &GroupType,
        addr: u64,
        out: &mut Vec<CopyIn<'p>>,
    ) -> Result<(), InvariantViolation> {
        if fields.len() != gt.fields.len() {
            return Err(InvariantViolation::FieldCount {
                expected: gt.fields.len(),
                actual: fields.len(),
            });
        }
        for (index, (field, decl)) in fields.iter().zip(&gt.fields).enumerate() {
            let offset = self
                .layout
                .field_offset(gt, fields, index)
                .ok_or(InvariantViolation::MissingFieldOffset { index })?;
            let at = addr
                .checked_add(offset)
                .ok_or(InvariantViolation::AddressOverflow)?;
            self.stage(field, &decl.ty, at, out)?;
        }
        Ok(())
    }

    fn scalar(&self, ct: &ConstType, value: u64) -> Result<Enc<'p>, InvariantViolation> {
        let facts = self.layout.scalar(ct);
        check_scalar(facts.size, facts.bit_offset, facts.bit_len)?;
        let value = if facts.big_endian {
            swap_to_width(value, facts.size)
        } else {
            truncate_to_width(value, facts.size)
        };
        Ok(Enc::Const {
            size: facts.size,
            value,
            bit_offset: facts.bit_offset,
            bit_len: facts.bit_len,
        })
    }

    fn pointer_word(&self, addr: u64) -> Result<Enc<'p>, InvariantViolation> {
        check_scalar(self.ptr_size, 0, 0)?;
        Ok(Enc::word(self.ptr_size, addr))
    }

    fn resource(
        &self,
        size: u64,
        producer: Option<usize>,
        literal: u64,
    ) -> Result<Enc<'p>, InvariantViolation> {
        check_scalar(size, 0, 0)?;
        check_producer(producer, self.call)?;
        let literal = truncate_to_width(literal, size);
        Ok(match producer {
            None => Enc::word(size, literal),
            Some(slot) => Enc::Result {
                size,
                slot: slot as u64,
                default: literal,
            },
        })
    }
}

/// Keeps the low `size` bytes of `value`.
#[must_use]
pub const fn truncate_to_width(value: u64, size: u64) -> u64 {
    if size >= 8 {
        value
    } else {
        value & ((1_u64 << (size * 8)) - 1)
    }
}

/// Reverses the low `size` bytes of `value`, yielding the little-endian word whose bytes in
/// ascending address order spell `value` most-significant byte first.
#[must_use]
pub const fn swap_to_width(value: u64, size: u64) -> u64 {
    if size == 0 {
        0
    } else if size >= 8 {
        value.swap_bytes()
    } else {
        truncate_to_width(value, size).swap_bytes() >> (64 - size * 8)
    }
}

/// Maps sink exhaustion to [`EncodeError::BufferTooSmall`].
struct Emitter<'w, W> {
    sink: &'w mut W,
    capacity: usize,
}

impl<W: WordSink> Emitter<'_, W> {
    #[inline]
    fn word(&mut self, w: u64) -> Result<(), EncodeError> {
        self.sink.push(w).map_err(|Full| self.full())
    }

    fn full(&self) -> EncodeError {
        EncodeError::BufferTooSmall {
            capacity: self.capacity,
        }
    }

    fn arg(&mut self, enc: &Enc<'_>) -> Result<(), EncodeError> {
        match *enc {
            Enc::Const {
                size,
                value,
                bit_offset,
                bit_len,
            } => {
                self.word(ARG_CONST)?;
                self.word(size)?;
                self.word(value)?;
                self.word(bit_offset)?;
                self.word(bit_len)
            }
            Enc::Data { bytes } => {
                self.word(ARG_DATA)?;
                self.word(bytes.len() as u64)?;
                self.sink.push_bytes(bytes).map_err(|Full| self.full())
            }
            Enc::Result {
                size,
                slot,
                default,
            } => {
                self.word(ARG_RESULT)?;
                self.word(size)?;
                self.word(slot)?;
                self.word(default)
            }
        }
    }

    fn call(
        &mut self,
        desc: &CallDesc,
        staged: &[CopyIn<'_>],
        inline: &[Enc<'_>],
    ) -> Result<(), EncodeError> {
        for c in staged {
            self.word(INSTR_COPYIN)?;
            self.word(c.addr)?;
            self.arg(&c.arg)?;
        }
        self.word(desc.id.0)?;
        self.word(inline.len() as u64)?;
        for enc in inline {
            self.arg(enc)?;
        }
        Ok(())
    }
}

/// Encodes programs for one target.
///
/// The encoder holds only borrowed configuration; repeated calls with the same inputs produce
/// identical bytes.
#[derive(Debug)]
pub struct Encoder<'t, S = StridedSegment, L = Precomputed> {
    target: &'t Target<S>,
    layout: L,
}

impl<'t, S: DataSegment> Encoder<'t, S> {
    /// Creates an encoder that uses the offsets recorded on the type tree.
    pub fn new(target: &'t Target<S>) -> Self {
        Self {
            target,
            layout: Precomputed,
        }
    }
}

impl<'t, S: DataSegment, L: LayoutFacts> Encoder<'t, S, L> {
    /// Replaces the layout facts provider.
    pub fn with_layout<L2: LayoutFacts>(self, layout: L2) -> Encoder<'t, S, L2> {
        Encoder {
            target: self.target,
            layout,
        }
    }

    /// Encodes `program` into `buf` for process `slot` and returns the tape length in bytes.
    ///
    /// On failure the first word of `buf` is overwritten with [`INSTR_POISON`] (when `buf` holds
    /// at least one word), so a stale or partial tape is never mistaken for a valid one.
    ///
    /// Argument trees are walked recursively with no depth bound. Run untrusted programs through
    /// [`verify_program`](crate::verifier::verify_program) first.
    pub fn encode(
        &self,
        program: &Program,
        buf: &mut [u8],
        slot: usize,
    ) -> Result<usize, EncodeError> {
        let mut w = SliceWriter::new(buf);
        let capacity = w.capacity();
        match self.emit(program, slot, &mut w, capacity) {
            Ok(()) => {
                let n = w.len_bytes();
                tracing::debug!(calls = program.len(), bytes = n, slot, "encoded program");
                Ok(n)
            }
            Err(e) => {
                w.stamp_first(INSTR_POISON);
                tracing::debug!(error = %e, slot, "encode failed");
                Err(e)
            }
        }
    }

    /// Returns the tape length `program` would encode to, without writing anything.
    pub fn encoded_len(&self, program: &Program, slot: usize) -> Result<usize, EncodeError> {
        let mut c = crate::format::CountingSink::new();
        self.emit(program, slot, &mut c, usize::MAX)?;
        Ok(c.len_bytes())
    }

    /// Encodes into a freshly allocated, exactly sized buffer.
    pub fn encode_to_vec(&self, program: &Program, slot: usize) -> Result<Vec<u8>, EncodeError> {
        let len = self.encoded_len(program, slot)?;
        let mut buf = vec![0_u8; len];
        let n = self.encode(program, &mut buf, slot)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn emit<W: WordSink>(
        &self,
        program: &Program,
        slot: usize,
        sink: &mut W,
        capacity: usize,
    ) -> Result<(), EncodeError> {
        let base = self
            .target
            .segment
            .base(slot)
            .ok_or(EncodeError::InvalidProcessSlot { slot })?;
        let mut out = Emitter { sink, capacity };
        let mut staged: Vec<CopyIn<'_>> = Vec::new();
        let mut inline: Vec<Enc<'_>> = Vec::new();

        for (call, c) in program.calls.iter().enumerate() {
            let desc = self
                .target
                .calls
                .get(c.id)
                .ok_or(EncodeError::UnknownCallId { call, id: c.id })?;
            let invariant = |violation| EncodeError::Invariant { call, violation };
            if desc.args.len() != c.args.len() {
                return Err(invariant(InvariantViolation::ArgCount {
                    expected: desc.args.len(),
                    actual: c.args.len(),
                }));
            }

            let lowering = Lowering {
                layout: &self.layout,
                ptr_size: self.target.ptr_size,
                base,
                call,
            };
            staged.clear();
            inline.clear();
            for (arg, ty) in c.args.iter().zip(&desc.args) {
                let (enc, copyins) = lowering.lower_arg(arg, ty).map_err(invariant)?;
                staged.extend(copyins);
                inline.push(enc);
            }
            tracing::trace!(
                call,
                id = desc.id.0,
                name = %desc.name,
                copyins = staged.len(),
                "lowered call"
            );
            out.call(desc, &staged, &inline)?;
        }
        out.word(INSTR_EOF)
    }
}

/// Encodes `program` into `buf` for process `slot` using the offsets recorded on the type tree.
///
/// Returns the number of bytes written. See [`Encoder::encode`].
pub fn encode<S: DataSegment>(
    target: &Target<S>,
    program: &Program,
    buf: &mut [u8],
    slot: usize,
) -> Result<usize, EncodeError> {
    Encoder::new(target).encode(program, buf, slot)
}

/// Like [`encode`], with group member offsets and scalar facts supplied by `layout`.
pub fn encode_with_layout<S: DataSegment, L: LayoutFacts>(
    target: &Target<S>,
    layout: L,
    program: &Program,
    buf: &mut [u8],
    slot: usize,
) -> Result<usize, EncodeError> {
    Encoder::new(target)
        .with_layout(layout)
        .encode(program, buf, slot)
}

/// Returns the tape length `program` would encode to. See [`Encoder::encoded_len`].
pub fn encoded_len<S: DataSegment>(
    target: &Target<S>,
    program: &Program,
    slot: usize,
) -> Result<usize, EncodeError> {
    Encoder::new(target).encoded_len(program, slot)
}
