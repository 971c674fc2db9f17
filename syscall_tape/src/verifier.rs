// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Program verifier.
//!
//! Checks a [`Program`] against a [`CallTable`] without encoding it: known ids, argument shapes
//! against their types, and strictly backward result references. Address resolution depends on
//! the target's data segment and is left to the encoder.

use core::fmt;

use crate::catalog::CallTable;
use crate::encode::InvariantViolation;
use crate::layout::{ConstType, Type};
use crate::opcode::is_scalar_size;
use crate::program::{Arg, CallId, Program};

/// Limits applied by [`verify_program`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Maximum number of calls in a program.
    pub max_calls: usize,
    /// Maximum nesting depth of an argument tree, counting the top-level argument as 1.
    pub max_depth: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_calls: 4096,
            max_depth: 64,
        }
    }
}

/// Verification failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyError {
    /// The program has more calls than [`VerifyConfig::max_calls`].
    TooManyCalls {
        /// Program length.
        len: usize,
        /// Configured limit.
        max: usize,
    },
    /// An argument tree is nested deeper than [`VerifyConfig::max_depth`].
    TooDeep {
        /// Call position.
        call: usize,
        /// Configured limit.
        max: usize,
    },
    /// A call names an id absent from the catalog.
    UnknownCallId {
        /// Call position.
        call: usize,
        /// The unknown id.
        id: CallId,
    },
    /// A call's arguments violate their descriptor.
    Invariant {
        /// Call position.
        call: usize,
        /// What was violated.
        violation: InvariantViolation,
    },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyCalls { len, max } => write!(f, "program has {len} calls (max {max})"),
            Self::TooDeep { call, max } => {
                write!(f, "call {call}: argument nesting exceeds depth {max}")
            }
            Self::UnknownCallId { call, id } => {
                write!(f, "call {call}: unknown syscall id {}", id.0)
            }
            Self::Invariant { call, violation } => write!(f, "call {call}: {violation}"),
        }
    }
}

impl core::error::Error for VerifyError {}

pub(crate) fn kind_mismatch(arg: &Arg, ty: &Type) -> InvariantViolation {
    InvariantViolation::KindMismatch {
        expected: ty.kind_name(),
        got: arg.kind_name(),
    }
}

pub(crate) fn union_option(index: usize, options: &[Type]) -> Result<&Type, InvariantViolation> {
    options.get(index).ok_or(InvariantViolation::UnionIndex {
        index,
        options: options.len(),
    })
}

pub(crate) fn check_data_len(size: Option<u64>, bytes: &[u8]) -> Result<(), InvariantViolation> {
    match size {
        Some(expected) if u64::try_from(bytes.len()).ok() != Some(expected) => {
            Err(InvariantViolation::DataLength {
                expected,
                actual: bytes.len(),
            })
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_scalar(
    size: u64,
    bit_offset: u64,
    bit_len: u64,
) -> Result<(), InvariantViolation> {
    if !is_scalar_size(size) {
        return Err(InvariantViolation::ScalarSize { size });
    }
    if bit_len != 0
        && bit_offset
            .checked_add(bit_len)
            .is_none_or(|end| end > size * 8)
    {
        return Err(InvariantViolation::BitFieldRange {
            size,
            bit_offset,
            bit_len,
        });
    }
    Ok(())
}

pub(crate) fn check_producer(producer: Option<usize>, call: usize) -> Result<(), InvariantViolation> {
    match producer {
        Some(producer) if producer >= call => {
            Err(InvariantViolation::ForwardReference { producer })
        }
        _ => Ok(()),
    }
}

enum Failure {
    Depth,
    Shape(InvariantViolation),
}

impl From<InvariantViolation> for Failure {
    fn from(v: InvariantViolation) -> Self {
        Self::Shape(v)
    }
}

struct Walk {
    call: usize,
    max_depth: usize,
}

impl Walk {
    fn arg(&self, arg: &Arg, ty: &Type, depth: usize, top: bool) -> Result<(), Failure> {
        if depth > self.max_depth {
            return Err(Failure::Depth);
        }
        match (arg, ty) {
            (Arg::Const { .. }, Type::Const(ConstType {
                size,
                bit_offset,
                bit_len,
                ..
            })) => check_scalar(*size, *bit_offset, *bit_len)?,
            (Arg::Data { bytes }, Type::Data(dt)) => check_data_len(dt.size, bytes)?,
            (Arg::Group { .. }, Type::Group(_)) if top => {
                return Err(InvariantViolation::GroupByValue.into());
            }
            (Arg::Group { fields }, Type::Group(gt)) => {
                if fields.len() != gt.fields.len() {
                    return Err(InvariantViolation::FieldCount {
                        expected: gt.fields.len(),
                        actual: fields.len(),
                    }
                    .into());
                }
                for (field, decl) in fields.iter().zip(&gt.fields) {
                    self.arg(field, &decl.ty, depth + 1, false)?;
                }
            }
            (Arg::Union { index, value }, Type::Union(ut)) => {
                let opt = union_option(*index, &ut.options)?;
                self.arg(value, opt, depth + 1, top)?;
            }
            (Arg::Pointer { address, pointee }, Type::Pointer(pt)) => match (address, pointee) {
                (None, Some(_)) => return Err(InvariantViolation::NullWithPointee.into()),
                (_, Some(p)) => self.arg(p, &pt.elem, depth + 1, false)?,
                (_, None) => {}
            },
            (Arg::Result { producer, .. }, Type::Resource(rt)) => {
                check_scalar(rt.size, 0, 0)?;
                check_producer(*producer, self.call)?;
            }
            (arg, ty) => return Err(kind_mismatch(arg, ty).into()),
        }
        Ok(())
    }
}

/// Verifies `program` against `calls`.
///
/// Accepting a program here implies the encoder will accept it for any valid process slot whose
/// addresses do not overflow, provided the target's pointer width is 1, 2, 4 or 8 bytes. The
/// pointer width belongs to the target, not the call table, so it is only checked when encoding.
pub fn verify_program(
    calls: &CallTable,
    program: &Program,
    cfg: &VerifyConfig,
) -> Result<(), VerifyError> {
    if program.len() > cfg.max_calls {
        return Err(VerifyError::TooManyCalls {
            len: program.len(),
            max: cfg.max_calls,
        });
    }
    for (call, c) in program.calls.iter().enumerate() {
        let desc = calls
            .get(c.id)
            .ok_or(VerifyError::UnknownCallId { call, id: c.id })?;
        if desc.args.len() != c.args.len() {
            return Err(VerifyError::Invariant {
                call,
                violation: InvariantViolation::ArgCount {
                    expected: desc.args.len(),
                    actual: c.args.len(),
                },
            });
        }
        let walk = Walk {
            call,
            max_depth: cfg.max_depth,
        };
        for (arg, ty) in c.args.iter().zip(&desc.args) {
            walk.arg(arg, ty, 1, true).map_err(|f| match f {
                Failure::Depth => VerifyError::TooDeep {
                    call,
                    max: cfg.max_depth,
                },
                Failure::Shape(violation) => VerifyError::Invariant { call, violation },
            })?;
        }
    }
    tracing::trace!(calls = program.len(), "verified program");
    Ok(())
}
