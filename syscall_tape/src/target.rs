// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Target description: pointer width, scratch data segment, and syscall catalog.

use core::fmt;

use crate::catalog::CallTable;

/// Maps a process slot to the base address of its scratch data region.
///
/// Implementations must be deterministic, and distinct valid slots that run concurrently must
/// map to non-overlapping regions. Returning `None` marks the slot as invalid.
pub trait DataSegment {
    /// Returns the data segment base for `slot`.
    fn base(&self, slot: usize) -> Option<u64>;
}

impl<F> DataSegment for F
where
    F: Fn(usize) -> Option<u64>,
{
    fn base(&self, slot: usize) -> Option<u64> {
        self(slot)
    }
}

/// Equally sized per-process regions laid out back to back from `start`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StridedSegment {
    /// Base address of slot 0.
    pub start: u64,
    /// Distance in bytes between consecutive slots.
    pub stride: u64,
    /// Number of valid slots.
    pub slots: usize,
}

impl StridedSegment {
    /// A single region at `start`; every slot maps to it.
    ///
    /// Only valid when encodings for different slots are never consumed concurrently.
    #[must_use]
    pub const fn shared(start: u64) -> Self {
        Self {
            start,
            stride: 0,
            slots: usize::MAX,
        }
    }
}

impl Default for StridedSegment {
    fn default() -> Self {
        Self {
            start: 0x2000_0000,
            stride: 0x0100_0000,
            slots: 32,
        }
    }
}

impl DataSegment for StridedSegment {
    fn base(&self, slot: usize) -> Option<u64> {
        if slot >= self.slots {
            return None;
        }
        let slot = u64::try_from(slot).ok()?;
        self.stride
            .checked_mul(slot)
            .and_then(|off| self.start.checked_add(off))
    }
}

/// Everything the encoder needs to know about the execution environment.
pub struct Target<S = StridedSegment> {
    /// Pointer width in bytes; direct pointer arguments are encoded with this size.
    pub ptr_size: u64,
    /// Process slot to data segment base mapping.
    pub segment: S,
    /// Syscall descriptors.
    pub calls: CallTable,
}

impl<S: DataSegment> Target<S> {
    /// Creates a target.
    pub fn new(ptr_size: u64, segment: S, calls: CallTable) -> Self {
        Self {
            ptr_size,
            segment,
            calls,
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Target<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("ptr_size", &self.ptr_size)
            .field("segment", &self.segment)
            .field("calls", &self.calls.len())
            .finish()
    }
}
