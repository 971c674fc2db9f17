// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Argument types and the layout facts the encoder consumes.
//!
//! Every byte offset, width, byte order and bit-field position in this module is computed
//! upstream by the descriptor catalog. The encoder only reads these facts through
//! [`LayoutFacts`]; it never derives padding or alignment on its own, so packed, naturally
//! aligned and custom per-field layouts all look the same to it.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::program::Arg;

/// A fixed-width scalar.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstType {
    /// Field width in bytes.
    pub size: u64,
    /// Whether the field is stored most-significant byte first.
    #[cfg_attr(feature = "serde", serde(default))]
    pub big_endian: bool,
    /// First bit of a packed field within its `size`-byte span.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bit_offset: u64,
    /// Bit-field length; `0` means a whole-byte field.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bit_len: u64,
}

impl ConstType {
    /// A little-endian whole-byte scalar.
    #[must_use]
    pub const fn int(size: u64) -> Self {
        Self {
            size,
            big_endian: false,
            bit_offset: 0,
            bit_len: 0,
        }
    }

    /// A big-endian whole-byte scalar.
    #[must_use]
    pub const fn int_be(size: u64) -> Self {
        Self {
            size,
            big_endian: true,
            bit_offset: 0,
            bit_len: 0,
        }
    }

    /// A bit-field of `bit_len` bits starting at `bit_offset` inside a `size`-byte span.
    #[must_use]
    pub const fn bitfield(size: u64, bit_offset: u64, bit_len: u64) -> Self {
        Self {
            size,
            big_endian: false,
            bit_offset,
            bit_len,
        }
    }

    /// Returns this type with big-endian byte order.
    #[must_use]
    pub const fn with_big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }
}

/// An opaque byte blob.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataType {
    /// Exact length for fixed-size blobs; `None` for dynamic length.
    #[cfg_attr(feature = "serde", serde(default))]
    pub size: Option<u64>,
}

/// One member of a [`GroupType`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    /// Member type.
    pub ty: Type,
    /// Byte offset from the start of the enclosing group.
    pub offset: u64,
}

/// A struct or array with pre-resolved member offsets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupType {
    /// Members in declaration order.
    pub fields: Vec<Field>,
}

impl GroupType {
    /// Builds a group from `(type, offset)` pairs.
    pub fn new(fields: impl IntoIterator<Item = (Type, u64)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(ty, offset)| Field { ty, offset })
                .collect(),
        }
    }
}

/// A union; exactly one option is materialized per instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnionType {
    /// Candidate option types. All options start at the union's own offset.
    pub options: Vec<Type>,
}

/// A pointer that owns a nested instance of `elem` when non-null.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointerType {
    /// Pointee type.
    pub elem: Box<Type>,
    /// Pointee size in bytes.
    pub elem_size: u64,
}

/// An opaque handle, possibly produced by an earlier call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceType {
    /// Handle width in bytes.
    pub size: u64,
    /// Value used when the handle has no producer.
    #[cfg_attr(feature = "serde", serde(default))]
    pub default: u64,
}

/// An argument type node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Type {
    /// Scalar.
    Const(ConstType),
    /// Byte blob.
    Data(DataType),
    /// Struct or array.
    Group(GroupType),
    /// Union.
    Union(UnionType),
    /// Pointer.
    Pointer(PointerType),
    /// Resource handle.
    Resource(ResourceType),
}

impl Type {
    /// Shorthand for a little-endian scalar.
    #[must_use]
    pub const fn int(size: u64) -> Self {
        Self::Const(ConstType::int(size))
    }

    /// Shorthand for a pointer to `elem`.
    #[must_use]
    pub fn ptr(elem: Self, elem_size: u64) -> Self {
        Self::Pointer(PointerType {
            elem: Box::new(elem),
            elem_size,
        })
    }

    /// Returns a short name for the node kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Const(_) => "const",
            Self::Data(_) => "data",
            Self::Group(_) => "group",
            Self::Union(_) => "union",
            Self::Pointer(_) => "pointer",
            Self::Resource(_) => "resource",
        }
    }
}

/// Placement facts for one scalar leaf.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScalarFacts {
    /// Field width in bytes.
    pub size: u64,
    /// Whether the field is stored most-significant byte first.
    pub big_endian: bool,
    /// First bit within the field span.
    pub bit_offset: u64,
    /// Bit-field length, `0` for whole-byte fields.
    pub bit_len: u64,
}

/// Source of layout facts for the encoder.
///
/// The encoder asks this provider where each group member lives and how each scalar is stored.
/// [`Precomputed`] reads the facts recorded on the type tree. Other implementations can place
/// members per instance (for example from the concrete element count of an array) without any
/// change to the codec.
pub trait LayoutFacts {
    /// Byte offset of member `index` of a group instance, relative to the group start.
    ///
    /// `fields` holds the instance's member values. Returns `None` if there is no such member.
    fn field_offset(&self, group: &GroupType, fields: &[Arg], index: usize) -> Option<u64>;

    /// Storage facts for a scalar leaf.
    fn scalar(&self, ty: &ConstType) -> ScalarFacts {
        ScalarFacts {
            size: ty.size,
            big_endian: ty.big_endian,
            bit_offset: ty.bit_offset,
            bit_len: ty.bit_len,
        }
    }
}

/// Uses the offsets stored in [`GroupType::fields`] verbatim.
#[derive(Copy, Clone, Debug, Default)]
pub struct Precomputed;

impl LayoutFacts for Precomputed {
    #[inline]
    fn field_offset(&self, group: &GroupType, _fields: &[Arg], index: usize) -> Option<u64> {
        group.fields.get(index).map(|f| f.offset)
    }
}

impl<L: LayoutFacts + ?Sized> LayoutFacts for &L {
    fn field_offset(&self, group: &GroupType, fields: &[Arg], index: usize) -> Option<u64> {
        (**self).field_offset(group, fields, index)
    }

    fn scalar(&self, ty: &ConstType) -> ScalarFacts {
        (**self).scalar(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precomputed_reads_offsets_verbatim() {
        let g = GroupType::new([(Type::int(1), 0), (Type::int(2), 3), (Type::int(1), 1)]);
        let offs: Vec<_> = (0..4)
            .map(|i| Precomputed.field_offset(&g, &[], i))
            .collect();
        assert_eq!(offs, [Some(0), Some(3), Some(1), None]);
    }

    #[test]
    fn default_scalar_facts_mirror_the_type() {
        let ty = ConstType::bitfield(4, 10, 10).with_big_endian();
        assert_eq!(
            Precomputed.scalar(&ty),
            ScalarFacts {
                size: 4,
                big_endian: true,
                bit_offset: 10,
                bit_len: 10,
            }
        );
    }
}
