use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use capstone::{arch, prelude::*, Capstone, InsnGroupId};

use super::{build_cfg, control_kind_of, ControlKind, ExtractError, GraphExtractor, Instruction};
use crate::discovery::SampleSources;
use crate::model::{AttributedCfg, SampleId};

const HEX_DUMP_EXTENSION: &str = "bytes";

/// Extractor for hex-dump samples stored as `<source_dir>/<id>.bytes`.
///
/// Each line is `ADDRESS b0 b1 ...` with `??` marking unknown bytes. Contiguous
/// byte runs are disassembled as 32-bit x86.
pub struct CapstoneExtractor {
    sources: SampleSources,
}

/// Contiguous run of known bytes starting at `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRun {
    pub start: u64,
    pub bytes: Vec<u8>,
}

impl CapstoneExtractor {
    pub fn new(source_dir: impl AsRef<Path>) -> Self {
        Self::with_sources(SampleSources::new(source_dir))
    }

    /// Read samples from the files recorded by discovery.
    pub fn with_sources(sources: SampleSources) -> Self {
        Self { sources }
    }

    pub fn source_path(&self, id: &SampleId) -> PathBuf {
        self.sources.path_for(id, HEX_DUMP_EXTENSION)
    }

    fn load_runs(&self, id: &SampleId) -> Result<Vec<ByteRun>, ExtractError> {
        let path = self.source_path(id);
        if !path.is_file() {
            return Err(ExtractError::MissingSource(path));
        }
        let body = fs::read_to_string(&path)
            .map_err(|source| ExtractError::Io { path: path.clone(), source })?;
        parse_hex_dump(&path, &body)
    }

    fn decode(&self, id: &SampleId) -> Result<Vec<Instruction>, ExtractError> {
        let runs = self.load_runs(id)?;
        let cs = make_cs()?;
        let mut instructions = Vec::new();
        for run in &runs {
            let insns = cs
                .disasm_all(&run.bytes, run.start)
                .map_err(|e| ExtractError::Backend(format!("capstone disassembly failed: {e}")))?;
            for i in insns.iter() {
                let mnemonic = i.mnemonic().unwrap_or("").to_lowercase();
                let detail = cs.insn_detail(i).ok();
                let kind = match &detail {
                    Some(detail) => control_kind_from_groups(detail, &mnemonic),
                    None => control_kind_of(&mnemonic),
                };
                let target = match kind {
                    ControlKind::Plain | ControlKind::Return => None,
                    _ => detail.as_ref().and_then(immediate_target),
                };
                instructions.push(Instruction {
                    address: i.address(),
                    end: i.address().checked_add(i.bytes().len() as u64),
                    mnemonic,
                    kind,
                    target,
                });
            }
        }
        Ok(instructions)
    }
}

impl GraphExtractor for CapstoneExtractor {
    fn name(&self) -> &'static str {
        "capstone"
    }

    fn sample_extension(&self) -> &'static str {
        HEX_DUMP_EXTENSION
    }

    fn extract(&self, id: &SampleId) -> Result<AttributedCfg, ExtractError> {
        let instructions = self.decode(id)?;
        build_cfg(id, &instructions, &BTreeSet::new())
    }

    fn mnemonics(&self, id: &SampleId) -> Result<BTreeSet<String>, ExtractError> {
        Ok(self.decode(id)?.into_iter().map(|ins| ins.mnemonic).collect())
    }
}

fn make_cs() -> Result<Capstone, ExtractError> {
    Capstone::new()
        .x86()
        .mode(arch::x86::ArchMode::Mode32)
        .detail(true)
        .build()
        .map_err(|e| ExtractError::Backend(format!("capstone init failed: {e}")))
}

fn control_kind_from_groups(detail: &capstone::InsnDetail, mnemonic: &str) -> ControlKind {
    let has = |group: u8| detail.groups().iter().any(|g| *g == InsnGroupId(group));
    if has(capstone::InsnGroupType::CS_GRP_CALL as u8) {
        ControlKind::Call
    } else if has(capstone::InsnGroupType::CS_GRP_RET as u8) {
        ControlKind::Return
    } else if has(capstone::InsnGroupType::CS_GRP_JUMP as u8) {
        if mnemonic == "jmp" {
            ControlKind::Jump
        } else {
            ControlKind::ConditionalJump
        }
    } else {
        ControlKind::Plain
    }
}

fn immediate_target(detail: &capstone::InsnDetail) -> Option<u64> {
    detail.arch_detail().operands().iter().find_map(|op| match op {
        capstone::arch::ArchOperand::X86Operand(op) => {
            if let capstone::arch::x86::X86OperandType::Imm(imm) = op.op_type {
                Some(imm as u64)
            } else {
                None
            }
        }
        _ => None,
    })
}

/// Parse a hex dump into contiguous runs of known bytes.
pub fn parse_hex_dump(path: &Path, body: &str) -> Result<Vec<ByteRun>, ExtractError> {
    let mut runs: Vec<ByteRun> = Vec::new();
    let mut open = false;
    for (idx, line) in body.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(address) = tokens.next() else { continue };
        let base = u64::from_str_radix(address, 16).map_err(|e| ExtractError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: format!("bad address '{address}': {e}"),
        })?;
        for (offset, tok) in tokens.enumerate() {
            if tok == "??" {
                open = false;
                continue;
            }
            let byte = u8::from_str_radix(tok, 16).map_err(|e| ExtractError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: format!("bad byte '{tok}': {e}"),
            })?;
            let addr = base + offset as u64;
            let extends =
                open && runs.last().is_some_and(|run| run.start + run.bytes.len() as u64 == addr);
            match runs.last_mut() {
                Some(run) if extends => run.bytes.push(byte),
                _ => open = true,
            }
            if !extends {
                runs.push(ByteRun { start: addr, bytes: vec![byte] });
            }
        }
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_splits_on_unknown_bytes_and_gaps() {
        let body = "00401000 55 8B EC ?? 90\n00401005 C3 00\n00402000 CC\n";
        let runs = parse_hex_dump(Path::new("s.bytes"), body).unwrap();
        assert_eq!(
            runs,
            vec![
                ByteRun { start: 0x401000, bytes: vec![0x55, 0x8B, 0xEC] },
                ByteRun { start: 0x401004, bytes: vec![0x90, 0xC3, 0x00] },
                ByteRun { start: 0x402000, bytes: vec![0xCC] },
            ]
        );
    }

    #[test]
    fn hex_dump_rejects_garbage() {
        let err = parse_hex_dump(Path::new("s.bytes"), "00401000 ZZ\n").unwrap_err();
        assert!(matches!(err, ExtractError::Parse { line: 1, .. }));
    }
}
