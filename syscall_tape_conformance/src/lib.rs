// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the `syscall_tape` conformance tests and benchmarks.
//!
//! [`test_target`] describes a small synthetic target whose struct layouts exercise natural
//! alignment, packing, nested groups, unions, arrays, byte order and bit-fields. Offsets are
//! spelled out per member, the way a descriptor compiler would hand them over.

use syscall_tape::catalog::{CallDesc, SyscallCatalog};
use syscall_tape::layout::{
    ConstType, DataType, GroupType, LayoutFacts, ResourceType, Type, UnionType,
};
use syscall_tape::program::{Arg, Call, CallId, Program};
use syscall_tape::target::{StridedSegment, Target};

/// Base address of process slot 0.
pub const DATA_OFFSET: u64 = 0x2000_0000;
/// Distance between per-process data regions.
pub const SLOT_STRIDE: u64 = 0x0100_0000;
/// Number of process slots in [`test_target`].
pub const SLOTS: usize = 16;
/// Pointer width of [`test_target`].
pub const PTR_SIZE: u64 = 8;

fn st(fields: impl IntoIterator<Item = (Type, u64)>) -> Type {
    Type::Group(GroupType::new(fields))
}

fn un(options: impl IntoIterator<Item = Type>) -> Type {
    Type::Union(UnionType {
        options: options.into_iter().collect(),
    })
}

fn be(size: u64) -> Type {
    Type::Const(ConstType::int_be(size))
}

fn bf(size: u64, bit_offset: u64, bit_len: u64) -> Type {
    Type::Const(ConstType::bitfield(size, bit_offset, bit_len))
}

fn blob(size: u64) -> Type {
    Type::Data(DataType { size: Some(size) })
}

/// An array of `len` elements of `elem`, each `stride` bytes apart.
pub fn array(elem: &Type, stride: u64, len: u64) -> Type {
    st((0..len).map(|i| (elem.clone(), i * stride)))
}

fn ptr(elem: Type, size: u64) -> Vec<Type> {
    vec![Type::ptr(elem, size)]
}

/// Descriptors of the synthetic target, in id order.
pub fn descriptors() -> Vec<CallDesc> {
    let i8_ = Type::int(1);
    let i16_ = Type::int(2);
    let i32_ = Type::int(4);
    let i64_ = Type::int(8);

    let descs: [(&str, Vec<Type>); 23] = [
        ("syz_test", vec![]),
        (
            "syz_test$int",
            vec![
                i64_.clone(),
                i8_.clone(),
                i16_.clone(),
                i32_.clone(),
                i64_.clone(),
            ],
        ),
        (
            "syz_test$align0",
            ptr(
                st([
                    (i16_.clone(), 0),
                    (i32_.clone(), 4),
                    (i8_.clone(), 8),
                    (i16_.clone(), 10),
                    (i64_.clone(), 16),
                ]),
                24,
            ),
        ),
        (
            "syz_test$align1",
            ptr(
                st([
                    (i16_.clone(), 0),
                    (i32_.clone(), 2),
                    (i8_.clone(), 6),
                    (i16_.clone(), 7),
                    (i64_.clone(), 9),
                ]),
                17,
            ),
        ),
        (
            "syz_test$align2",
            ptr(
                st([
                    (i8_.clone(), 0),
                    (st([(array(&i16_, 2, 1), 0)]), 1),
                    (st([(array(&i16_, 2, 1), 0)]), 4),
                ]),
                6,
            ),
        ),
        (
            "syz_test$align3",
            ptr(
                st([
                    (i8_.clone(), 0),
                    (st([(i8_.clone(), 0)]), 1),
                    (st([(i8_.clone(), 0)]), 4),
                ]),
                5,
            ),
        ),
        (
            "syz_test$align4",
            ptr(
                st([
                    (st([(i8_.clone(), 0), (i16_.clone(), 1)]), 0),
                    (i8_.clone(), 4),
                ]),
                5,
            ),
        ),
        (
            "syz_test$align5",
            ptr(
                st([
                    (st([(i64_.clone(), 0), (array(&i16_, 2, 0), 8)]), 0),
                    (st([(i64_.clone(), 0), (array(&i16_, 2, 3), 8)]), 8),
                    (i8_.clone(), 22),
                ]),
                23,
            ),
        ),
        (
            "syz_test$align6",
            ptr(st([(i8_.clone(), 0), (array(&i32_, 4, 1), 4)]), 8),
        ),
        (
            "syz_test$union0",
            ptr(
                st([
                    (i64_.clone(), 0),
                    (un([i64_.clone(), i32_.clone(), i8_.clone()]), 8),
                ]),
                16,
            ),
        ),
        (
            "syz_test$union1",
            ptr(
                st([(un([i64_.clone(), i32_.clone()]), 0), (i8_.clone(), 8)]),
                9,
            ),
        ),
        (
            "syz_test$union2",
            ptr(
                st([(un([i64_.clone(), i32_.clone()]), 0), (i8_.clone(), 4)]),
                5,
            ),
        ),
        (
            "syz_test$array0",
            ptr(
                st([
                    (i8_.clone(), 0),
                    (
                        st([
                            (un([i16_.clone(), i64_.clone()]), 0),
                            (un([i16_.clone(), i64_.clone()]), 2),
                        ]),
                        1,
                    ),
                    (i64_.clone(), 11),
                ]),
                19,
            ),
        ),
        (
            "syz_test$array1",
            ptr(st([(i8_.clone(), 0), (blob(5), 1)]), 6),
        ),
        (
            "syz_test$array2",
            ptr(
                st([(i16_.clone(), 0), (blob(16), 2), (i16_.clone(), 18)]),
                20,
            ),
        ),
        (
            "syz_test$end0",
            ptr(
                st([(i8_.clone(), 0), (be(2), 1), (be(4), 3), (be(8), 7)]),
                15,
            ),
        ),
        (
            "syz_test$end1",
            ptr(st([(be(2), 0), (be(4), 2), (be(8), 6)]), 14),
        ),
        (
            "syz_test$bf0",
            ptr(
                st([
                    (bf(2, 0, 10), 0),
                    (i64_.clone(), 8),
                    (bf(2, 0, 5), 16),
                    (bf(2, 5, 6), 16),
                    (bf(4, 0, 15), 20),
                    (bf(2, 0, 11), 24),
                    (
                        Type::Const(ConstType::bitfield(2, 0, 11).with_big_endian()),
                        26,
                    ),
                    (i8_.clone(), 28),
                ]),
                29,
            ),
        ),
        (
            "syz_test$bf1",
            ptr(
                st([
                    (st([(bf(4, 0, 10), 0), (bf(4, 10, 10), 0), (bf(4, 20, 10), 0)]), 0),
                    (i8_.clone(), 4),
                ]),
                5,
            ),
        ),
        (
            "syz_test$res0",
            vec![],
        ),
        (
            "syz_test$res1",
            vec![Type::Resource(ResourceType {
                size: 4,
                default: 0xffff,
            })],
        ),
        (
            "syz_test$blob",
            vec![Type::Data(DataType { size: None })],
        ),
        (
            "syz_test$opt",
            ptr(i64_, 8),
        ),
    ];
    descs
        .into_iter()
        .zip(0_u64..)
        .map(|((name, args), id)| CallDesc::new(id, name, args))
        .collect()
}

/// The synthetic target: 64-bit pointers, [`SLOTS`] strided process regions.
pub fn test_target() -> Target {
    let calls = SyscallCatalog::from_iter(descriptors())
        .build()
        .unwrap_or_default();
    Target::new(
        PTR_SIZE,
        StridedSegment {
            start: DATA_OFFSET,
            stride: SLOT_STRIDE,
            slots: SLOTS,
        },
        calls,
    )
}

/// Looks up a call id by name.
pub fn call_id(target: &Target, name: &str) -> Option<CallId> {
    target.calls.by_name(name).map(|d| d.id)
}

/// Lays group members out back to back using each instance's own size, ignoring recorded
/// offsets. Bit-field runs that share a span occupy it once.
#[derive(Copy, Clone, Debug)]
pub struct PackedLayout {
    /// Pointer width used to size pointer members.
    pub ptr_size: u64,
}

impl PackedLayout {
    /// Byte size of `arg` as an instance of `ty`.
    pub fn instance_size(&self, ty: &Type, arg: &Arg) -> u64 {
        match (ty, arg) {
            (Type::Const(c), _) => c.size,
            (Type::Data(_), Arg::Data { bytes }) => bytes.len() as u64,
            (Type::Data(d), _) => d.size.unwrap_or(0),
            (Type::Group(g), Arg::Group { fields }) => {
                let Some(last) = g.fields.len().min(fields.len()).checked_sub(1) else {
                    return 0;
                };
                self.field_offset(g, fields, last).map_or(0, |off| {
                    off + self.instance_size(&g.fields[last].ty, &fields[last])
                })
            }
            (Type::Union(u), Arg::Union { index, value }) => u
                .options
                .get(*index)
                .map_or(0, |opt| self.instance_size(opt, value)),
            (Type::Pointer(_), _) => self.ptr_size,
            (Type::Resource(r), _) => r.size,
            _ => 0,
        }
    }
}

fn shares_span(prev: &Type, next: &Type) -> bool {
    match (prev, next) {
        (Type::Const(a), Type::Const(b)) => {
            a.bit_len != 0 && b.bit_len != 0 && a.size == b.size && b.bit_offset != 0
        }
        _ => false,
    }
}

impl LayoutFacts for PackedLayout {
    fn field_offset(&self, group: &GroupType, fields: &[Arg], index: usize) -> Option<u64> {
        if index >= group.fields.len() || index >= fields.len() {
            return None;
        }
        let mut off = 0;
        for i in 0..index {
            let next = &group.fields[i + 1].ty;
            if !shares_span(&group.fields[i].ty, next) {
                off += self.instance_size(&group.fields[i].ty, &fields[i]);
            }
        }
        Some(off)
    }
}

/// A deterministic program of `len` calls touching every argument kind.
///
/// Each call after the first alternates between struct-by-pointer calls and a resource call
/// that consumes the previous call's result.
pub fn sample_program(target: &Target, len: usize) -> Program {
    let id = |name| call_id(target, name).unwrap_or(CallId(0));
    let calls = (0..len).map(|i| {
        let v = i as u64;
        match i % 5 {
            0 => Call::new(
                id("syz_test$int"),
                [v, 1, 2, 3, 4].map(Arg::int),
            ),
            1 => Call::new(
                id("syz_test$align0"),
                [Arg::ptr(
                    0x100 * (v % 64),
                    Arg::group((1..=5).map(Arg::int)),
                )],
            ),
            2 => Call::new(
                id("syz_test$array2"),
                [Arg::ptr(
                    0x40,
                    Arg::group([Arg::int(0x42), Arg::data([0xaa; 16]), Arg::int(0x43)]),
                )],
            ),
            3 => Call::new(id("syz_test$res1"), [Arg::result_of(i - 1, 0xffff)]),
            _ => Call::new(
                id("syz_test$bf0"),
                [Arg::ptr(0x200, Arg::group((0..8).map(|_| Arg::int(0x42))))],
            ),
        }
    });
    Program::new(calls)
}
