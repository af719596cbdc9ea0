//! Graph extractors: turn one sample into an attributed control-flow graph.
//!
//! Extractors are selected by name through an [`ExtractorRegistry`]:
//! - `listing`: IDA-style text disassembly listings (`<id>.asm`).
//! - `capstone`: hex-dump byte listings (`<id>.bytes`) disassembled with
//!   Capstone (feature `capstone-extractor`).
//!
//! Both decode a flat instruction stream and hand it to [`build_cfg`], which
//! splits basic blocks and emits one node per block.

#[cfg(feature = "capstone-extractor")]
pub mod capstone;
pub mod listing;

#[cfg(feature = "capstone-extractor")]
pub use self::capstone::CapstoneExtractor;
pub use listing::ListingExtractor;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::discovery::SampleSources;
use crate::model::{AdjacencyRelation, AttributedCfg, FeatureMatrix, ModelError, SampleId};

/// Number of integer features emitted per basic block.
pub const FEATURE_WIDTH: usize = 10;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Sample source not found at {0}")]
    MissingSource(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path} at line {line}: {reason}")]
    Parse { path: PathBuf, line: usize, reason: String },

    #[error("No code found in sample {0}")]
    NoCode(SampleId),

    #[error("Extractor returned an invalid graph: {0}")]
    InvalidGraph(#[from] ModelError),

    #[error("Extraction backend error: {0}")]
    Backend(String),
}

/// Contract every graph extractor fulfils.
pub trait GraphExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Source file extension this extractor reads (without the dot).
    fn sample_extension(&self) -> &'static str;

    fn extract(&self, id: &SampleId) -> Result<AttributedCfg, ExtractError>;

    /// Distinct instruction mnemonics appearing in the sample.
    fn mnemonics(&self, id: &SampleId) -> Result<BTreeSet<String>, ExtractError>;
}

/// Registry for graph extractors; callers select by name.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn GraphExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self { extractors: HashMap::new() }
    }

    pub fn register<E: GraphExtractor + 'static>(&mut self, extractor: E) -> &mut Self {
        self.extractors.insert(extractor.name().to_string(), Box::new(extractor));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn GraphExtractor> {
        self.extractors.get(name).map(|e| &**e)
    }

    /// Return a sorted list of registered extractor names for error messages/help.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.extractors.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Registry populated with every extractor compiled into this build, each reading
/// samples from `source_dir`.
pub fn default_extractor_registry(source_dir: &Path) -> ExtractorRegistry {
    extractor_registry(&SampleSources::new(source_dir))
}

/// Registry whose extractors read the source files recorded in `sources`.
pub fn extractor_registry(sources: &SampleSources) -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(ListingExtractor::with_sources(sources.clone()));
    #[cfg(feature = "capstone-extractor")]
    {
        registry.register(CapstoneExtractor::with_sources(sources.clone()));
    }
    registry
}

/// Names of the extractors compiled into this build.
pub fn available_extractors() -> Vec<String> {
    default_extractor_registry(Path::new(".")).names()
}

/// How an instruction leaves its basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Plain,
    Call,
    Jump,
    ConditionalJump,
    Return,
}

impl ControlKind {
    pub fn ends_block(self) -> bool {
        !matches!(self, ControlKind::Plain)
    }

    fn falls_through(self) -> bool {
        matches!(self, ControlKind::Plain | ControlKind::Call | ControlKind::ConditionalJump)
    }
}

/// Coarse instruction category used for block feature counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionClass {
    Arithmetic,
    Logic,
    Transfer,
    Compare,
    Other,
}

pub fn classify_mnemonic(mnemonic: &str) -> InstructionClass {
    match mnemonic {
        "add" | "sub" | "inc" | "dec" | "mul" | "imul" | "div" | "idiv" | "neg" | "adc"
        | "sbb" | "xadd" => InstructionClass::Arithmetic,
        "and" | "or" | "xor" | "not" | "shl" | "shr" | "sal" | "sar" | "rol" | "ror" | "rcl"
        | "rcr" | "shld" | "shrd" => InstructionClass::Logic,
        "mov" | "movzx" | "movsx" | "lea" | "push" | "pop" | "xchg" | "pusha" | "popa"
        | "pushad" | "popad" | "pushf" | "popf" => InstructionClass::Transfer,
        "cmp" | "test" => InstructionClass::Compare,
        m if m.starts_with("cmov") || m.starts_with("movs") || m.starts_with("stos") => {
            InstructionClass::Transfer
        }
        m if m.starts_with("cmps") || m.starts_with("scas") => InstructionClass::Compare,
        _ => InstructionClass::Other,
    }
}

/// Control kind implied by an x86 mnemonic alone.
pub fn control_kind_of(mnemonic: &str) -> ControlKind {
    match mnemonic {
        "call" => ControlKind::Call,
        "jmp" => ControlKind::Jump,
        "ret" | "retn" | "retf" | "iret" | "iretd" => ControlKind::Return,
        m if m.starts_with('j') || m.starts_with("loop") => ControlKind::ConditionalJump,
        _ => ControlKind::Plain,
    }
}

/// One decoded instruction in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u64,
    /// Address just past this instruction, when the encoding length is known.
    pub end: Option<u64>,
    pub mnemonic: String,
    pub kind: ControlKind,
    /// Resolved branch or call target.
    pub target: Option<u64>,
}

impl Instruction {
    fn falls_into(&self, next: &Instruction) -> bool {
        self.kind.falls_through() && self.end.map_or(true, |end| end == next.address)
    }
}

/// Split an instruction stream into basic blocks and emit the block graph.
///
/// Leaders are the first instruction, every address in `labels`, every resolved
/// branch target, and every instruction following a control transfer. Each block
/// becomes a node whose feature row is laid out as: instructions, calls,
/// conditional jumps, jumps, returns, arithmetic, logic, transfer, compare,
/// successors.
pub fn build_cfg(
    id: &SampleId,
    instructions: &[Instruction],
    labels: &BTreeSet<u64>,
) -> Result<AttributedCfg, ExtractError> {
    if instructions.is_empty() {
        return Err(ExtractError::NoCode(id.clone()));
    }

    let mut index_of: HashMap<u64, usize> = HashMap::new();
    for (idx, ins) in instructions.iter().enumerate() {
        index_of.entry(ins.address).or_insert(idx);
    }

    let mut leaders: BTreeSet<usize> = BTreeSet::new();
    leaders.insert(0);
    for addr in labels {
        if let Some(&idx) = index_of.get(addr) {
            leaders.insert(idx);
        }
    }
    for (idx, ins) in instructions.iter().enumerate() {
        if ins.kind.ends_block() && idx + 1 < instructions.len() {
            leaders.insert(idx + 1);
        }
        if let Some(&target) = ins.target.as_ref().and_then(|t| index_of.get(t)) {
            leaders.insert(target);
        }
    }

    let starts: Vec<usize> = leaders.into_iter().collect();
    let mut block_of = vec![0usize; instructions.len()];
    for (block, window) in starts.iter().enumerate() {
        let end = starts.get(block + 1).copied().unwrap_or(instructions.len());
        for slot in &mut block_of[*window..end] {
            *slot = block;
        }
    }

    let mut adjacency = AdjacencyRelation::new(starts.len());
    let mut rows = Vec::with_capacity(starts.len());
    for (block, &start) in starts.iter().enumerate() {
        let end = starts.get(block + 1).copied().unwrap_or(instructions.len());
        let body = &instructions[start..end];
        let mut row = vec![0i64; FEATURE_WIDTH];
        for ins in body {
            row[0] += 1;
            match ins.kind {
                ControlKind::Call => row[1] += 1,
                ControlKind::ConditionalJump => row[2] += 1,
                ControlKind::Jump => row[3] += 1,
                ControlKind::Return => row[4] += 1,
                ControlKind::Plain => {}
            }
            match classify_mnemonic(&ins.mnemonic) {
                InstructionClass::Arithmetic => row[5] += 1,
                InstructionClass::Logic => row[6] += 1,
                InstructionClass::Transfer => row[7] += 1,
                InstructionClass::Compare => row[8] += 1,
                InstructionClass::Other => {}
            }
        }

        let last = &instructions[end - 1];
        if let Some(&target) = last.target.as_ref().and_then(|t| index_of.get(t)) {
            if last.kind != ControlKind::Return {
                adjacency.insert(block, block_of[target])?;
            }
        }
        if end < instructions.len() && last.falls_into(&instructions[end]) {
            adjacency.insert(block, block_of[end])?;
        }
        rows.push(row);
    }

    for (source, _) in adjacency.edges() {
        rows[source][FEATURE_WIDTH - 1] += 1;
    }

    Ok(AttributedCfg::new(FeatureMatrix::new(rows), adjacency)?)
}
