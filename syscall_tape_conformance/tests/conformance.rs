// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(missing_docs, reason = "integration test crate")]

use syscall_tape::decode::{ExecCall, ExecProg, decode};
use syscall_tape::encode::{Encoder, encode, encode_with_layout, encoded_len};
use syscall_tape::opcode::{
    ARG_CONST, ARG_DATA, ARG_RESULT, EXEC_BUFFER_SIZE, INSTR_COPYIN, INSTR_EOF,
};
use syscall_tape::program::{Arg, Call, Program};
use syscall_tape::target::{DataSegment, Target};
use syscall_tape::verifier::{VerifyConfig, verify_program};
use syscall_tape_conformance::{PTR_SIZE, PackedLayout, call_id, test_target};

fn words(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

fn cst(size: u64, value: u64) -> Vec<u64> {
    vec![ARG_CONST, size, value, 0, 0]
}

fn bits(size: u64, value: u64, bit_offset: u64, bit_len: u64) -> Vec<u64> {
    vec![ARG_CONST, size, value, bit_offset, bit_len]
}

fn copyin(addr: u64, enc: Vec<u64>) -> Vec<u64> {
    [vec![INSTR_COPYIN, addr], enc].concat()
}

fn call(t: &Target, name: &str, args: &[Vec<u64>]) -> Vec<u64> {
    let id = call_id(t, name).unwrap().0;
    [vec![id, args.len() as u64], args.concat()].concat()
}

fn program(t: &Target, calls: &[(&str, Vec<Arg>)]) -> Program {
    Program::new(
        calls
            .iter()
            .map(|(name, args)| Call::new(call_id(t, name).unwrap(), args.iter().cloned())),
    )
}

/// A single call taking its struct argument at data segment offset 0.
fn by_ptr(fields: impl IntoIterator<Item = Arg>) -> Vec<Arg> {
    vec![Arg::ptr(0, Arg::group(fields))]
}

fn ints(values: impl IntoIterator<Item = u64>) -> Vec<Arg> {
    values.into_iter().map(Arg::int).collect()
}

/// Encodes `p` for several process slots and checks each tape against `expected(base)`.
fn check(t: &Target, p: &Program, expected: impl Fn(u64) -> Vec<u64>) {
    let mut buf = vec![0_u8; EXEC_BUFFER_SIZE];
    for slot in [0, 5, 15] {
        let base = t.segment.base(slot).unwrap();
        let n = encode(t, p, &mut buf, slot).unwrap();
        let want = [expected(base), vec![INSTR_EOF]].concat();
        assert_eq!(words(&buf[..n]), want, "slot {slot}");
        assert_eq!(encoded_len(t, p, slot), Ok(n));

        let exec = decode(&t.calls, &buf[..n]).unwrap();
        assert_eq!(exec.num_vars, p.len());
        let ids: Vec<_> = exec.calls.iter().map(|c| (c.meta.id, c.index)).collect();
        let want_ids: Vec<_> = p.calls.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
        assert_eq!(ids, want_ids);
    }
    verify_program(&t.calls, p, &VerifyConfig::default()).unwrap();
}

fn check_one(t: &Target, name: &str, args: Vec<Arg>, expected: impl Fn(u64) -> Vec<Vec<u64>>) {
    let p = program(t, &[(name, args)]);
    check(t, &p, |b| {
        let mut v = expected(b);
        v.push(call(t, name, &[cst(PTR_SIZE, b)]));
        v.concat()
    });
}

#[test]
fn empty_call() {
    let t = test_target();
    let p = program(&t, &[("syz_test", vec![])]);
    check(&t, &p, |_| call(&t, "syz_test", &[]));

    let mut buf = [0_u8; 64];
    let n = encode(&t, &p, &mut buf, 0).unwrap();
    assert_eq!(
        decode(&t.calls, &buf[..n]).unwrap(),
        ExecProg {
            calls: vec![ExecCall {
                meta: t.calls.by_name("syz_test").unwrap(),
                index: 0,
            }],
            num_vars: 1,
        }
    );
}

#[test]
fn five_ints() {
    let t = test_target();
    let p = program(&t, &[("syz_test$int", ints([1, 2, 3, 4, 5]))]);
    check(&t, &p, |_| {
        call(
            &t,
            "syz_test$int",
            &[cst(8, 1), cst(1, 2), cst(2, 3), cst(4, 4), cst(8, 5)],
        )
    });
}

#[test]
fn aligned_struct() {
    let t = test_target();
    check_one(&t, "syz_test$align0", by_ptr(ints(1..=5)), |b| {
        vec![
            copyin(b, cst(2, 1)),
            copyin(b + 4, cst(4, 2)),
            copyin(b + 8, cst(1, 3)),
            copyin(b + 10, cst(2, 4)),
            copyin(b + 16, cst(8, 5)),
        ]
    });
}

#[test]
fn packed_struct() {
    let t = test_target();
    check_one(&t, "syz_test$align1", by_ptr(ints(1..=5)), |b| {
        vec![
            copyin(b, cst(2, 1)),
            copyin(b + 2, cst(4, 2)),
            copyin(b + 6, cst(1, 3)),
            copyin(b + 7, cst(2, 4)),
            copyin(b + 9, cst(8, 5)),
        ]
    });
}

#[test]
fn nested_packed_and_aligned_groups() {
    let t = test_target();
    let wrapped = |v| Arg::group([Arg::group([Arg::int(v)])]);
    check_one(
        &t,
        "syz_test$align2",
        by_ptr([Arg::int(0x42), wrapped(0x43), wrapped(0x44)]),
        |b| {
            vec![
                copyin(b, cst(1, 0x42)),
                copyin(b + 1, cst(2, 0x43)),
                copyin(b + 4, cst(2, 0x44)),
            ]
        },
    );
    let single = |v| Arg::group([Arg::int(v)]);
    check_one(
        &t,
        "syz_test$align3",
        by_ptr([Arg::int(0x42), single(0x43), single(0x44)]),
        |b| {
            vec![
                copyin(b, cst(1, 0x42)),
                copyin(b + 1, cst(1, 0x43)),
                copyin(b + 4, cst(1, 0x44)),
            ]
        },
    );
    check_one(
        &t,
        "syz_test$align4",
        by_ptr([Arg::group(ints([0x42, 0x43])), Arg::int(0x44)]),
        |b| {
            vec![
                copyin(b, cst(1, 0x42)),
                copyin(b + 1, cst(2, 0x43)),
                copyin(b + 4, cst(1, 0x44)),
            ]
        },
    );
}

#[test]
fn arrays_inside_structs() {
    let t = test_target();
    check_one(
        &t,
        "syz_test$align5",
        by_ptr([
            Arg::group([Arg::int(0x42), Arg::group(Vec::new())]),
            Arg::group([Arg::int(0x43), Arg::group(ints([0x44, 0x45, 0x46]))]),
            Arg::int(0x47),
        ]),
        |b| {
            vec![
                copyin(b, cst(8, 0x42)),
                copyin(b + 8, cst(8, 0x43)),
                copyin(b + 16, cst(2, 0x44)),
                copyin(b + 18, cst(2, 0x45)),
                copyin(b + 20, cst(2, 0x46)),
                copyin(b + 22, cst(1, 0x47)),
            ]
        },
    );
    check_one(
        &t,
        "syz_test$align6",
        by_ptr([Arg::int(0x42), Arg::group(ints([0x43]))]),
        |b| vec![copyin(b, cst(1, 0x42)), copyin(b + 4, cst(4, 0x43))],
    );
}

#[test]
fn unions_place_the_selected_option() {
    let t = test_target();
    check_one(
        &t,
        "syz_test$union0",
        by_ptr([Arg::int(1), Arg::union(2, Arg::int(2))]),
        |b| vec![copyin(b, cst(8, 1)), copyin(b + 8, cst(1, 2))],
    );
    check_one(
        &t,
        "syz_test$union1",
        by_ptr([Arg::union(1, Arg::int(0x42)), Arg::int(0x43)]),
        |b| vec![copyin(b, cst(4, 0x42)), copyin(b + 8, cst(1, 0x43))],
    );
    check_one(
        &t,
        "syz_test$union2",
        by_ptr([Arg::union(1, Arg::int(0x42)), Arg::int(0x43)]),
        |b| vec![copyin(b, cst(4, 0x42)), copyin(b + 4, cst(1, 0x43))],
    );
}

#[test]
fn array_of_varlen_unions() {
    let t = test_target();
    check_one(
        &t,
        "syz_test$array0",
        by_ptr([
            Arg::int(1),
            Arg::group([Arg::union(0, Arg::int(2)), Arg::union(1, Arg::int(3))]),
            Arg::int(4),
        ]),
        |b| {
            vec![
                copyin(b, cst(1, 1)),
                copyin(b + 1, cst(2, 2)),
                copyin(b + 3, cst(8, 3)),
                copyin(b + 11, cst(8, 4)),
            ]
        },
    );
}

#[test]
fn blobs_pack_little_endian() {
    let t = test_target();
    check_one(
        &t,
        "syz_test$array1",
        by_ptr([Arg::int(0x42), Arg::data([1, 2, 3, 4, 5])]),
        |b| {
            vec![
                copyin(b, cst(1, 0x42)),
                copyin(b + 1, vec![ARG_DATA, 5, 0x05_0403_0201]),
            ]
        },
    );
    let mut blob = Vec::new();
    for byte in [0xaa, 0xbb, 0xcc, 0xdd] {
        blob.extend([byte; 4]);
    }
    check_one(
        &t,
        "syz_test$array2",
        by_ptr([Arg::int(0x42), Arg::data(blob), Arg::int(0x43)]),
        |b| {
            vec![
                copyin(b, cst(2, 0x42)),
                copyin(
                    b + 2,
                    vec![ARG_DATA, 16, 0xbbbb_bbbb_aaaa_aaaa, 0xdddd_dddd_cccc_cccc],
                ),
                copyin(b + 18, cst(2, 0x43)),
            ]
        },
    );
}

#[test]
fn big_endian_fields_are_byte_swapped() {
    let t = test_target();
    check_one(
        &t,
        "syz_test$end0",
        by_ptr(ints([0x42, 0x42, 0x42, 0x42])),
        |b| {
            vec![
                copyin(b, cst(1, 0x42)),
                copyin(b + 1, cst(2, 0x4200)),
                copyin(b + 3, cst(4, 0x4200_0000)),
                copyin(b + 7, cst(8, 0x4200_0000_0000_0000)),
            ]
        },
    );
    check_one(&t, "syz_test$end1", by_ptr(ints([0xe, 0x42, 0x1])), |b| {
        vec![
            copyin(b, cst(2, 0x0e00)),
            copyin(b + 2, cst(4, 0x4200_0000)),
            copyin(b + 6, cst(8, 0x0100_0000_0000_0000)),
        ]
    });
}

#[test]
fn bitfields_emit_one_copyin_each() {
    let t = test_target();
    check_one(&t, "syz_test$bf0", by_ptr(ints([0x42; 8])), |b| {
        vec![
            copyin(b, bits(2, 0x42, 0, 10)),
            copyin(b + 8, cst(8, 0x42)),
            copyin(b + 16, bits(2, 0x42, 0, 5)),
            copyin(b + 16, bits(2, 0x42, 5, 6)),
            copyin(b + 20, bits(4, 0x42, 0, 15)),
            copyin(b + 24, bits(2, 0x42, 0, 11)),
            copyin(b + 26, bits(2, 0x4200, 0, 11)),
            copyin(b + 28, cst(1, 0x42)),
        ]
    });
    check_one(
        &t,
        "syz_test$bf1",
        by_ptr([Arg::group(ints([0x42; 3])), Arg::int(0x42)]),
        |b| {
            vec![
                copyin(b, bits(4, 0x42, 0, 10)),
                copyin(b, bits(4, 0x42, 10, 10)),
                copyin(b, bits(4, 0x42, 20, 10)),
                copyin(b + 4, cst(1, 0x42)),
            ]
        },
    );
}

#[test]
fn resources() {
    let t = test_target();
    let p = program(&t, &[("syz_test$res1", vec![Arg::resource(0xffff)])]);
    check(&t, &p, |_| call(&t, "syz_test$res1", &[cst(4, 0xffff)]));

    let p = program(
        &t,
        &[
            ("syz_test$res0", vec![]),
            ("syz_test$res1", vec![Arg::result_of(0, 0xffff)]),
        ],
    );
    check(&t, &p, |_| {
        [
            call(&t, "syz_test$res0", &[]),
            call(&t, "syz_test$res1", &[vec![ARG_RESULT, 4, 0, 0xffff]]),
        ]
        .concat()
    });
}

#[test]
fn null_pointer_and_dynamic_blob() {
    let t = test_target();
    let p = program(
        &t,
        &[
            ("syz_test$opt", vec![Arg::null()]),
            ("syz_test$blob", vec![Arg::data(*b"abc")]),
            ("syz_test$blob", vec![Arg::data(Vec::new())]),
        ],
    );
    check(&t, &p, |_| {
        [
            call(&t, "syz_test$opt", &[cst(8, 0)]),
            call(&t, "syz_test$blob", &[vec![ARG_DATA, 3, 0x63_6261]]),
            call(&t, "syz_test$blob", &[vec![ARG_DATA, 0]]),
        ]
        .concat()
    });
}

#[test]
fn packed_layout_provider_reproduces_packed_structs() {
    let t = test_target();
    let packed = PackedLayout { ptr_size: PTR_SIZE };
    let cases = [
        ("syz_test$align1", by_ptr(ints(1..=5))),
        (
            "syz_test$array0",
            by_ptr([
                Arg::int(1),
                Arg::group([Arg::union(0, Arg::int(2)), Arg::union(1, Arg::int(3))]),
                Arg::int(4),
            ]),
        ),
        ("syz_test$array1", by_ptr([Arg::int(0x42), Arg::data([1, 2, 3, 4, 5])])),
        ("syz_test$bf1", by_ptr([Arg::group(ints([0x42; 3])), Arg::int(0x42)])),
    ];
    for (name, args) in cases {
        let p = program(&t, &[(name, args)]);
        let recorded = Encoder::new(&t).encode_to_vec(&p, 3).unwrap();
        let mut buf = vec![0_u8; recorded.len()];
        let n = encode_with_layout(&t, packed, &p, &mut buf, 3).unwrap();
        assert_eq!(words(&buf[..n]), words(&recorded), "{name}");
    }
}
