use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use acfg_core::pipeline::{read_corpus, GraphRecord};

/// Aggregate numbers describing one corpus file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub path: String,
    pub samples: usize,
    pub nodes: usize,
    pub edges: usize,
    /// Sample count per class label.
    pub labels: BTreeMap<i64, usize>,
    /// Widest feature row seen.
    pub max_feature_width: usize,
}

pub fn corpus_stats(path: &Path, records: &[GraphRecord]) -> CorpusStats {
    let mut labels = BTreeMap::new();
    for record in records {
        *labels.entry(record.label).or_insert(0) += 1;
    }
    CorpusStats {
        path: path.display().to_string(),
        samples: records.len(),
        nodes: records.iter().map(GraphRecord::node_count).sum(),
        edges: records.iter().map(GraphRecord::edge_count).sum(),
        labels,
        max_feature_width: records
            .iter()
            .flat_map(|r| r.nodes.iter().map(|n| n.features.len()))
            .max()
            .unwrap_or(0),
    }
}

/// Parse and validate a corpus, then print its statistics.
pub fn inspect_command(corpus: &Path, json: bool) -> Result<()> {
    let records = read_corpus(corpus)
        .with_context(|| format!("Failed to read corpus {}", corpus.display()))?;
    let stats = corpus_stats(corpus, &records);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Corpus: {}", stats.path);
    println!("  Samples: {}", stats.samples);
    println!("  Nodes: {}", stats.nodes);
    println!("  Edges: {}", stats.edges);
    println!("  Feature width: {}", stats.max_feature_width);
    if stats.labels.is_empty() {
        println!("  Labels: (none)");
    } else {
        println!("  Labels:");
        for (label, count) in &stats.labels {
            println!("    {label}: {count}");
        }
    }
    Ok(())
}
