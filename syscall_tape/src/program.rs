// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Programs: ordered syscall invocations with typed argument trees.
//!
//! Programs are produced upstream by a generator or mutator and are immutable input to the
//! encoder. Each [`Arg`] pairs positionally with the [`Type`](crate::layout::Type) in its call's
//! descriptor.

use alloc::boxed::Box;
use alloc::vec::Vec;

/// Numeric syscall id, written verbatim as the leading word of a call instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CallId(pub u64);

/// An argument value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Arg {
    /// Scalar value in logical (host) byte order.
    Const {
        /// Logical value.
        value: u64,
    },
    /// Byte blob.
    Data {
        /// Blob bytes in address order.
        bytes: Vec<u8>,
    },
    /// Struct or array members.
    Group {
        /// Member values in declaration order.
        fields: Vec<Arg>,
    },
    /// The selected option of a union.
    Union {
        /// Index into the union's options.
        index: usize,
        /// Value of the selected option.
        value: Box<Arg>,
    },
    /// A pointer into the per-process data segment.
    Pointer {
        /// Offset from the data segment base, or `None` for a null pointer.
        address: Option<u64>,
        /// The pointed-to value, staged before the owning call.
        pointee: Option<Box<Arg>>,
    },
    /// A resource handle.
    Result {
        /// Position of the call whose output this handle is, if any.
        producer: Option<usize>,
        /// Literal used when there is no producer, and as the executor's fallback.
        literal: u64,
    },
}

impl Arg {
    /// Shorthand for [`Arg::Const`].
    #[must_use]
    pub const fn int(value: u64) -> Self {
        Self::Const { value }
    }

    /// Shorthand for [`Arg::Data`].
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data {
            bytes: bytes.into(),
        }
    }

    /// Shorthand for [`Arg::Group`].
    pub fn group(fields: impl IntoIterator<Item = Self>) -> Self {
        Self::Group {
            fields: fields.into_iter().collect(),
        }
    }

    /// Shorthand for [`Arg::Union`].
    #[must_use]
    pub fn union(index: usize, value: Self) -> Self {
        Self::Union {
            index,
            value: Box::new(value),
        }
    }

    /// A non-null pointer at `address` owning `pointee`.
    #[must_use]
    pub fn ptr(address: u64, pointee: Self) -> Self {
        Self::Pointer {
            address: Some(address),
            pointee: Some(Box::new(pointee)),
        }
    }

    /// A null pointer.
    #[must_use]
    pub const fn null() -> Self {
        Self::Pointer {
            address: None,
            pointee: None,
        }
    }

    /// A resource handle produced by the call at position `producer`.
    #[must_use]
    pub const fn result_of(producer: usize, literal: u64) -> Self {
        Self::Result {
            producer: Some(producer),
            literal,
        }
    }

    /// A resource handle with a literal value.
    #[must_use]
    pub const fn resource(literal: u64) -> Self {
        Self::Result {
            producer: None,
            literal,
        }
    }

    /// Returns a short name for the value kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Const { .. } => "const",
            Self::Data { .. } => "data",
            Self::Group { .. } => "group",
            Self::Union { .. } => "union",
            Self::Pointer { .. } => "pointer",
            Self::Result { .. } => "resource",
        }
    }
}

/// One syscall invocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Call {
    /// Descriptor id in the target catalog.
    pub id: CallId,
    /// Arguments, matching the descriptor's argument types positionally.
    #[cfg_attr(feature = "serde", serde(default))]
    pub args: Vec<Arg>,
}

impl Call {
    /// Creates a call.
    pub fn new(id: CallId, args: impl IntoIterator<Item = Arg>) -> Self {
        Self {
            id,
            args: args.into_iter().collect(),
        }
    }
}

/// An ordered list of calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    /// Calls in execution order.
    pub calls: Vec<Call>,
}

impl Program {
    /// Creates a program from calls in execution order.
    pub fn new(calls: impl IntoIterator<Item = Call>) -> Self {
        Self {
            calls: calls.into_iter().collect(),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns `true` if the program has no calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
