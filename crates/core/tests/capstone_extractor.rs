#![cfg(feature = "capstone-extractor")]

use std::path::{Path, PathBuf};

use acfg_core::extract::{CapstoneExtractor, GraphExtractor};
use acfg_core::model::SampleId;

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

#[test]
fn capstone_decodes_hex_dump_into_blocks() {
    let extractor = CapstoneExtractor::new(fixtures_dir());
    let cfg = extractor.extract(&SampleId::new("sample1")).expect("extract");

    assert_eq!(cfg.node_count(), 3);
    assert_eq!(cfg.adjacency.edges().collect::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 2)]);
    assert_eq!(cfg.features.row(0).expect("row 0"), &[4, 0, 1, 0, 0, 0, 0, 2, 1, 2]);
    assert_eq!(cfg.features.row(2).expect("row 2"), &[2, 0, 0, 0, 1, 0, 0, 1, 0, 0]);
}

#[test]
fn capstone_mnemonics_use_capstone_spelling() {
    let extractor = CapstoneExtractor::new(fixtures_dir());
    let found = extractor.mnemonics(&SampleId::new("sample1")).expect("mnemonics");
    assert!(found.contains("je"));
    assert!(found.contains("ret"));
    assert!(found.contains("push"));
}
