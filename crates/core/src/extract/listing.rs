use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use super::{build_cfg, control_kind_of, ControlKind, ExtractError, GraphExtractor, Instruction};
use crate::discovery::SampleSources;
use crate::model::{AttributedCfg, SampleId};

const LISTING_EXTENSION: &str = "asm";

/// Assembler directives and pseudo-ops that never count as instructions.
const DIRECTIVES: &[&str] = &[
    "db", "dw", "dd", "dq", "dt", "align", "assume", "proc", "endp", "public", "extrn",
    "include", "org", "segment", "ends", "end", "unicode", "model", "struc", "label",
];

const PREFIXES: &[&str] = &["rep", "repe", "repz", "repne", "repnz", "lock"];

const TARGET_NOISE: &[&str] = &["short", "near", "far", "ptr", "dword", "large"];

/// Extractor for IDA-style text listings stored as `<source_dir>/<id>.asm`.
///
/// Lines look like `.text:00401008 E8 1C 1B 00 00    call sub_402B29 ; comment`.
/// Only lines in code segments are considered.
pub struct ListingExtractor {
    sources: SampleSources,
}

impl ListingExtractor {
    pub fn new(source_dir: impl AsRef<Path>) -> Self {
        Self::with_sources(SampleSources::new(source_dir))
    }

    /// Read samples from the files recorded by discovery.
    pub fn with_sources(sources: SampleSources) -> Self {
        Self { sources }
    }

    pub fn source_path(&self, id: &SampleId) -> PathBuf {
        self.sources.path_for(id, LISTING_EXTENSION)
    }

    fn load(&self, id: &SampleId) -> Result<ParsedListing, ExtractError> {
        let path = self.source_path(id);
        if !path.is_file() {
            return Err(ExtractError::MissingSource(path));
        }
        let bytes =
            fs::read(&path).map_err(|source| ExtractError::Io { path: path.clone(), source })?;
        // Listings routinely carry non UTF-8 bytes inside data directives.
        Ok(parse_listing(&String::from_utf8_lossy(&bytes)))
    }
}

impl GraphExtractor for ListingExtractor {
    fn name(&self) -> &'static str {
        "listing"
    }

    fn sample_extension(&self) -> &'static str {
        LISTING_EXTENSION
    }

    fn extract(&self, id: &SampleId) -> Result<AttributedCfg, ExtractError> {
        let listing = self.load(id)?;
        build_cfg(id, &listing.instructions, &listing.labels)
    }

    fn mnemonics(&self, id: &SampleId) -> Result<BTreeSet<String>, ExtractError> {
        let listing = self.load(id)?;
        Ok(listing.instructions.into_iter().map(|ins| ins.mnemonic).collect())
    }
}

/// Instruction stream and label addresses recovered from a listing.
#[derive(Debug, Default)]
pub struct ParsedListing {
    pub instructions: Vec<Instruction>,
    pub labels: BTreeSet<u64>,
}

#[derive(Debug, PartialEq, Eq)]
enum ListingLine {
    Label { address: u64, name: String },
    Instruction { address: u64, len: Option<u64>, mnemonic: String, operands: Vec<String> },
}

pub fn parse_listing(body: &str) -> ParsedListing {
    let lines: Vec<ListingLine> = body.lines().filter_map(parse_line).collect();

    let mut label_addresses: HashMap<&str, u64> = HashMap::new();
    let mut labels = BTreeSet::new();
    for line in &lines {
        if let ListingLine::Label { address, name } = line {
            label_addresses.insert(name.as_str(), *address);
            labels.insert(*address);
        }
    }

    let instructions = lines
        .iter()
        .filter_map(|line| match line {
            ListingLine::Instruction { address, len, mnemonic, operands } => {
                let kind = control_kind_of(mnemonic);
                let target = match kind {
                    ControlKind::Plain | ControlKind::Return => None,
                    _ => resolve_target(operands, &label_addresses),
                };
                Some(Instruction {
                    address: *address,
                    end: len.map(|l| address + l),
                    mnemonic: mnemonic.clone(),
                    kind,
                    target,
                })
            }
            ListingLine::Label { .. } => None,
        })
        .collect();

    ParsedListing { instructions, labels }
}

fn parse_line(line: &str) -> Option<ListingLine> {
    let code = line.split(';').next().unwrap_or_default().trim();
    let (head, rest) = code.split_once(char::is_whitespace).unwrap_or((code, ""));
    let (segment, address) = head.rsplit_once(':')?;
    if !is_code_segment(segment) {
        return None;
    }
    let address = u64::from_str_radix(address, 16).ok()?;

    let mut tokens = rest.split_whitespace().peekable();
    let mut len = Some(0u64);
    while let Some(tok) = tokens.peek() {
        match byte_token(tok) {
            Some(truncated) => {
                len = if truncated { None } else { len.map(|l| l + 1) };
                tokens.next();
            }
            None => break,
        }
    }

    let first = tokens.next()?;
    if let Some(name) = first.strip_suffix(':') {
        return Some(ListingLine::Label { address, name: name.to_string() });
    }
    if tokens.peek() == Some(&"proc") {
        return Some(ListingLine::Label { address, name: first.to_string() });
    }

    let mut mnemonic = first.to_ascii_lowercase();
    if PREFIXES.contains(&mnemonic.as_str()) {
        if let Some(next) = tokens.next() {
            mnemonic = next.to_ascii_lowercase();
        }
    }
    let well_formed = mnemonic.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && mnemonic.chars().all(|c| c.is_ascii_alphanumeric());
    if !well_formed || DIRECTIVES.contains(&mnemonic.as_str()) {
        return None;
    }

    let operands = tokens
        .flat_map(|tok| tok.split(','))
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
        .collect();
    Some(ListingLine::Instruction {
        address,
        len: len.filter(|l| *l > 0),
        mnemonic,
        operands,
    })
}

fn is_code_segment(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    lower.contains("text") || lower.contains("code")
}

/// `Some(false)` for an opcode byte such as `8B`, `Some(true)` for a truncated
/// byte run such as `C7+`, `None` for anything else.
fn byte_token(tok: &str) -> Option<bool> {
    let (digits, truncated) = match tok.strip_suffix('+') {
        Some(d) => (d, true),
        None => (tok, false),
    };
    let is_byte = digits.len() == 2
        && (digits == "??"
            || digits.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    is_byte.then_some(truncated)
}

fn resolve_target(operands: &[String], labels: &HashMap<&str, u64>) -> Option<u64> {
    let token = operands.iter().map(String::as_str).find(|t| !TARGET_NOISE.contains(t))?;
    if let Some(addr) = labels.get(token) {
        return Some(*addr);
    }
    if let Some((_, suffix)) = token.rsplit_once('_') {
        if let Ok(addr) = u64::from_str_radix(suffix, 16) {
            return Some(addr);
        }
    }
    token
        .strip_suffix('h')
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
}
