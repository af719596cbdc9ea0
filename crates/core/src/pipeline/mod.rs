//! Parallel ACFG batch pipeline.
//!
//! Control flow for one run:
//! 1. [`partition_batches`] splits the discovered ids into contiguous batches.
//! 2. One [`ExtractionWorker`] per batch runs on its own OS thread, extracting
//!    graphs and persisting each sample's artifact triple.
//! 3. The coordinator waits for *every* worker (join barrier).
//! 4. [`CorpusAggregator`] folds the persisted triples into one corpus file.
//! 5. [`ArtifactJanitor`] removes the intermediate artifacts.
//!
//! Per-sample problems are recorded as [`SkippedSample`]s and never abort sibling
//! samples or workers. Only run-level failures surface as [`PipelineError`].

mod aggregate;
mod coordinator;
pub mod corpus;
mod dictionary;
mod janitor;
mod manifest;
mod partition;
mod worker;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use aggregate::{AggregateReport, CorpusAggregator};
pub use coordinator::{run_batches, BatchCoordinator, CoordinatorOptions, RunSummary};
pub use corpus::{read_corpus, CorpusError, GraphRecord, NodeRecord, NODE_TAG};
pub use dictionary::{
    discover_instruction_dictionary, export_instruction_dictionary, render_instruction_dictionary,
    DictionaryReport,
};
pub use janitor::ArtifactJanitor;
pub use manifest::RunManifest;
pub use partition::partition_batches;
pub use worker::{ExtractionWorker, WorkerReport};

use crate::artifacts::ArtifactLayout;
use crate::config::PipelineConfig;
use crate::discovery::discover_samples;
use crate::extract::{
    available_extractors, default_extractor_registry, extractor_registry, ExtractorRegistry,
    GraphExtractor,
};
use crate::labels::LabelMap;
use crate::model::SampleId;

/// Run-level failures that abort the whole pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("Failed to spawn worker thread {worker}: {source}")]
    Spawn {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write corpus {path}: {source}")]
    CorpusWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to export {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline phase a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Extract,
    Persist,
    Aggregate,
    Discover,
}

/// Why a sample was left out of the corpus (or the instruction dictionary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingLabel,
    ExtractionFailure,
    IoFailure,
    ArtifactMissing,
    ArtifactInvalid,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingLabel => "missing_label",
            SkipReason::ExtractionFailure => "extraction_failure",
            SkipReason::IoFailure => "io_failure",
            SkipReason::ArtifactMissing => "artifact_missing",
            SkipReason::ArtifactInvalid => "artifact_invalid",
        }
    }
}

/// Diagnostic for one excluded sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSample {
    pub sample: SampleId,
    pub phase: Phase,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkippedSample {
    pub fn new(
        sample: &SampleId,
        phase: Phase,
        reason: SkipReason,
        detail: impl Into<String>,
    ) -> Self {
        Self { sample: sample.clone(), phase, reason, detail: detail.into() }
    }
}

/// Resolve the configured extractor from `registry`.
pub fn resolve_extractor<'r>(
    registry: &'r ExtractorRegistry,
    name: &str,
) -> anyhow::Result<&'r dyn GraphExtractor> {
    registry.get(name).ok_or_else(|| {
        anyhow!("Unknown extractor '{}'. Available: {}", name, registry.names().join(", "))
    })
}

/// Discover the configured samples and build a registry whose extractors read
/// exactly the files discovery found.
fn discover_for(config: &PipelineConfig) -> anyhow::Result<(ExtractorRegistry, Vec<SampleId>)> {
    let defaults = default_extractor_registry(&config.source_dir);
    let extension = match config.sample_extension.as_deref() {
        Some(extension) => extension,
        None => resolve_extractor(&defaults, &config.extractor)?.sample_extension(),
    };
    let sources = discover_samples(&config.source_dir, extension).with_context(|| {
        format!("Failed to discover samples in {}", config.source_dir.display())
    })?;
    Ok((extractor_registry(&sources), sources.ids()))
}

/// Load labels, discover samples, and run the full extract/aggregate/cleanup
/// pipeline described by `config`.
pub fn build_corpus(config: &PipelineConfig) -> anyhow::Result<RunSummary> {
    config.validate(&available_extractors())?;
    let label_path = config.require_label_path()?;
    let labels = LabelMap::from_csv_path(label_path)
        .with_context(|| format!("Failed to load labels from {}", label_path.display()))?;
    tracing::info!(labels = labels.len(), path = %label_path.display(), "loaded label table");

    let (registry, ids) = discover_for(config)?;
    let extractor = resolve_extractor(&registry, &config.extractor)?;
    let artifact_dir = config.artifact_dir();
    fs::create_dir_all(artifact_dir).with_context(|| {
        format!("Failed to create artifact dir {}", artifact_dir.display())
    })?;

    let coordinator = BatchCoordinator::new(
        ArtifactLayout::new(artifact_dir),
        &labels,
        extractor,
        CoordinatorOptions::from(config),
    );
    Ok(coordinator.run(&ids)?)
}

/// Discover samples and export the union of their instruction mnemonics as CSV.
pub fn build_instruction_dictionary(
    config: &PipelineConfig,
    export_path: &Path,
) -> anyhow::Result<DictionaryReport> {
    config.validate(&available_extractors())?;
    let (registry, ids) = discover_for(config)?;
    let extractor = resolve_extractor(&registry, &config.extractor)?;
    let report = discover_instruction_dictionary(&ids, config.workers, extractor)?;
    export_instruction_dictionary(&report.mnemonics, export_path)?;
    Ok(report)
}
