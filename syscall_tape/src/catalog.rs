// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Syscall descriptor catalog.
//!
//! A [`SyscallCatalog`] collects [`CallDesc`]s and is frozen into a [`CallTable`] that both the
//! encoder and decoder consult by id. The catalog does not compute layout: argument types arrive
//! with offsets, widths and byte order already resolved.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::layout::Type;
use crate::opcode::RESERVED_INSTR_BASE;
use crate::program::CallId;

/// A syscall descriptor: identity plus expected argument types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallDesc {
    /// Numeric id written into the tape.
    pub id: CallId,
    /// Human-readable name (for example `open$dir`).
    pub name: String,
    /// Argument types in positional order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub args: Vec<Type>,
}

impl CallDesc {
    /// Creates a descriptor.
    pub fn new(id: u64, name: impl Into<String>, args: impl IntoIterator<Item = Type>) -> Self {
        Self {
            id: CallId(id),
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
}

/// A collection of descriptors to be frozen into a [`CallTable`].
///
/// # Example
/// ```
/// use syscall_tape::catalog::{CallDesc, SyscallCatalog};
/// use syscall_tape::layout::Type;
/// use syscall_tape::program::CallId;
///
/// let mut cat = SyscallCatalog::new();
/// cat.push(CallDesc::new(2, "open", [Type::int(8), Type::int(4)]));
/// cat.push(CallDesc::new(3, "close", [Type::int(4)]));
///
/// let table = cat.build().unwrap();
/// assert_eq!(table.by_name("close").map(|d| d.id), Some(CallId(3)));
/// assert_eq!(table.get(CallId(2)).map(|d| d.args.len()), Some(2));
/// ```
#[derive(Clone, Debug, Default)]
pub struct SyscallCatalog {
    descs: Vec<CallDesc>,
}

impl SyscallCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self { descs: Vec::new() }
    }

    /// Add a descriptor.
    pub fn push(&mut self, desc: CallDesc) {
        self.descs.push(desc);
    }

    /// Add multiple descriptors.
    pub fn extend<I: IntoIterator<Item = CallDesc>>(&mut self, iter: I) {
        self.descs.extend(iter);
    }

    /// Iterate over all descriptors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CallDesc> {
        self.descs.iter()
    }

    /// Freeze the catalog into a lookup table.
    ///
    /// Ids must be unique and below [`RESERVED_INSTR_BASE`] so a call instruction can never be
    /// mistaken for a reserved instruction word. Names must be unique.
    pub fn build(self) -> Result<CallTable, CatalogError> {
        let mut by_id: BTreeMap<CallId, CallDesc> = BTreeMap::new();
        let mut by_name: HashMap<String, CallId> = HashMap::with_capacity(self.descs.len());
        for desc in self.descs {
            if desc.id.0 >= RESERVED_INSTR_BASE {
                return Err(CatalogError::ReservedId {
                    name: desc.name,
                    id: desc.id,
                });
            }
            if by_id.contains_key(&desc.id) {
                return Err(CatalogError::DuplicateId { id: desc.id });
            }
            if by_name.contains_key(&desc.name) {
                return Err(CatalogError::DuplicateName { name: desc.name });
            }
            by_name.insert(desc.name.clone(), desc.id);
            by_id.insert(desc.id, desc);
        }
        Ok(CallTable { by_id, by_name })
    }
}

impl FromIterator<CallDesc> for SyscallCatalog {
    fn from_iter<I: IntoIterator<Item = CallDesc>>(iter: I) -> Self {
        Self {
            descs: iter.into_iter().collect(),
        }
    }
}

/// Frozen descriptor lookup table.
#[derive(Clone, Debug, Default)]
pub struct CallTable {
    by_id: BTreeMap<CallId, CallDesc>,
    by_name: HashMap<String, CallId>,
}

impl CallTable {
    /// Look up a descriptor by id.
    #[inline]
    pub fn get(&self, id: CallId) -> Option<&CallDesc> {
        self.by_id.get(&id)
    }

    /// Look up a descriptor by name.
    pub fn by_name(&self, name: &str) -> Option<&CallDesc> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Returns the number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if the table has no descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate over descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CallDesc> {
        self.by_id.values()
    }
}

/// Errors when freezing a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Two descriptors share an id.
    DuplicateId {
        /// The repeated id.
        id: CallId,
    },
    /// Two descriptors share a name.
    DuplicateName {
        /// The repeated name.
        name: String,
    },
    /// A descriptor id collides with the reserved instruction range.
    ReservedId {
        /// Descriptor name.
        name: String,
        /// Offending id.
        id: CallId,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "duplicate syscall id {}", id.0),
            Self::DuplicateName { name } => write!(f, "duplicate syscall name '{name}'"),
            Self::ReservedId { name, id } => write!(
                f,
                "syscall '{name}' uses reserved id 0x{:016x}",
                id.0
            ),
        }
    }
}

impl core::error::Error for CatalogError {}
