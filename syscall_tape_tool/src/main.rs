// Copyright 2026 the Execution Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![doc = "Command-line front end for `syscall_tape`.\n\n\
          Loads a target description and programs from JSON, writes tapes, and disassembles \
          them. This is a std-only tool crate.\n"]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use syscall_tape::catalog::{CallDesc, SyscallCatalog};
use syscall_tape::decode::decode;
use syscall_tape::disasm::disassemble;
use syscall_tape::encode::encode;
use syscall_tape::opcode::EXEC_BUFFER_SIZE;
use syscall_tape::program::Program;
use syscall_tape::target::{StridedSegment, Target};
use syscall_tape::verifier::{VerifyConfig, verify_program};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  syscall_tape encode <target.json> <program.json> <out.tape> [slot]
  syscall_tape verify <target.json> <program.json>
  syscall_tape disasm <target.json> <in.tape>";

/// Target description as stored on disk.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetConfig {
    #[serde(default = "default_ptr_size")]
    ptr_size: u64,
    #[serde(default)]
    segment: StridedSegment,
    #[serde(default)]
    max_calls: Option<usize>,
    #[serde(default)]
    max_depth: Option<usize>,
    calls: Vec<CallDesc>,
}

const fn default_ptr_size() -> u64 {
    8
}

impl TargetConfig {
    fn verify_config(&self) -> VerifyConfig {
        let d = VerifyConfig::default();
        VerifyConfig {
            max_calls: self.max_calls.unwrap_or(d.max_calls),
            max_depth: self.max_depth.unwrap_or(d.max_depth),
        }
    }

    fn into_target(self) -> Result<(Target, VerifyConfig)> {
        let cfg = self.verify_config();
        let calls = SyscallCatalog::from_iter(self.calls)
            .build()
            .context("build syscall catalog")?;
        Ok((Target::new(self.ptr_size, self.segment, calls), cfg))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parse {}", path.display()))
}

fn load_target(path: &Path) -> Result<(Target, VerifyConfig)> {
    let config: TargetConfig = read_json(path)?;
    config
        .into_target()
        .with_context(|| format!("load target {}", path.display()))
}

fn cmd_encode(target: &Path, program: &Path, out: &Path, slot: usize) -> Result<()> {
    let (target, cfg) = load_target(target)?;
    let program: Program = read_json(program)?;
    verify_program(&target.calls, &program, &cfg).context("verify program")?;

    let mut buf = vec![0_u8; EXEC_BUFFER_SIZE];
    let n = encode(&target, &program, &mut buf, slot).context("encode program")?;
    fs::write(out, &buf[..n]).with_context(|| format!("write {}", out.display()))?;
    tracing::info!(calls = program.len(), bytes = n, slot, out = %out.display(), "wrote tape");
    Ok(())
}

fn cmd_verify(target: &Path, program: &Path) -> Result<()> {
    let (target, cfg) = load_target(target)?;
    let program: Program = read_json(program)?;
    verify_program(&target.calls, &program, &cfg).context("verify program")?;
    println!("ok: {} calls", program.len());
    Ok(())
}

fn cmd_disasm(target: &Path, tape: &Path) -> Result<()> {
    let (target, _) = load_target(target)?;
    let bytes = fs::read(tape).with_context(|| format!("read {}", tape.display()))?;
    print!("{}", disassemble(&target.calls, &bytes));
    let exec = decode(&target.calls, &bytes).context("decode tape")?;
    tracing::info!(calls = exec.calls.len(), num_vars = exec.num_vars, "decoded tape");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let paths = |range: core::ops::Range<usize>| -> Vec<PathBuf> {
        args[range].iter().map(PathBuf::from).collect()
    };
    match args.first().map(String::as_str) {
        Some("encode") if (4..=5).contains(&args.len()) => {
            let slot = match args.get(4) {
                Some(s) => s.parse().with_context(|| format!("invalid slot '{s}'"))?,
                None => 0,
            };
            let p = paths(1..4);
            cmd_encode(&p[0], &p[1], &p[2], slot)
        }
        Some("verify") if args.len() == 3 => {
            let p = paths(1..3);
            cmd_verify(&p[0], &p[1])
        }
        Some("disasm") if args.len() == 3 => {
            let p = paths(1..3);
            cmd_disasm(&p[0], &p[1])
        }
        _ => bail!("{USAGE}"),
    }
}
