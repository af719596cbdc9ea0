use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::corpus::{write_corpus, GraphRecord};
use super::{Phase, PipelineError, SkipReason, SkippedSample};
use crate::artifacts::{
    has_triple, read_adjacency, read_features, read_label, ArtifactError, ArtifactLayout,
};
use crate::model::{AttributedCfg, SampleId};
use crate::util::staging_path;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateReport {
    pub corpus_path: PathBuf,
    /// Ids written to the corpus, in corpus order.
    pub aggregated: Vec<SampleId>,
    pub skipped: Vec<SkippedSample>,
    pub nodes: usize,
    pub edges: usize,
}

/// Folds persisted artifact triples into the single corpus file.
pub struct CorpusAggregator<'a> {
    layout: &'a ArtifactLayout,
    symmetric: bool,
}

impl<'a> CorpusAggregator<'a> {
    pub fn new(layout: &'a ArtifactLayout) -> Self {
        Self { layout, symmetric: false }
    }

    /// Mirror every edge before emitting neighbor lists.
    pub fn with_symmetric_adjacency(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// Load and validate the artifact triple of `id`.
    pub fn load_record(&self, id: &SampleId) -> Result<GraphRecord, SkippedSample> {
        if !has_triple(self.layout, id) {
            return Err(SkippedSample::new(
                id,
                Phase::Aggregate,
                SkipReason::ArtifactMissing,
                "artifact triple is incomplete",
            ));
        }
        let skip = |e: ArtifactError| {
            let reason = match &e {
                e if e.is_not_found() => SkipReason::ArtifactMissing,
                ArtifactError::Io { .. } => SkipReason::IoFailure,
                ArtifactError::Malformed { .. } => SkipReason::ArtifactInvalid,
            };
            SkippedSample::new(id, Phase::Aggregate, reason, e.to_string())
        };

        let raw_label = read_label(&self.layout.label_path(id)).map_err(skip)?;
        let label = raw_label.parse::<i64>().map_err(|_| {
            SkippedSample::new(
                id,
                Phase::Aggregate,
                SkipReason::ArtifactInvalid,
                format!("label '{raw_label}' is not an integer class"),
            )
        })?;
        let features = read_features(&self.layout.features_path(id)).map_err(skip)?;
        let adjacency = read_adjacency(&self.layout.adjacency_path(id)).map_err(skip)?;

        let cfg = AttributedCfg::new(features, adjacency).map_err(|e| {
            SkippedSample::new(id, Phase::Aggregate, SkipReason::ArtifactInvalid, e.to_string())
        })?;
        let adjacency =
            if self.symmetric { cfg.adjacency.symmetrized() } else { cfg.adjacency };
        Ok(GraphRecord::from_parts(label, cfg.features, &adjacency))
    }

    /// Write the corpus for `ids` to `corpus_path`, skipping samples whose
    /// artifacts are missing or invalid. The sample count is only written once
    /// every record is loaded, and the file is replaced atomically.
    pub fn aggregate(
        &self,
        ids: &[SampleId],
        corpus_path: &Path,
    ) -> Result<AggregateReport, PipelineError> {
        info!(samples = ids.len(), corpus = %corpus_path.display(), "aggregating ACFGs");

        let mut report =
            AggregateReport { corpus_path: corpus_path.to_path_buf(), ..Default::default() };
        let mut records = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            debug!(sample = %id, "aggregating {}/{}", i + 1, ids.len());
            match self.load_record(id) {
                Ok(record) => {
                    report.nodes += record.node_count();
                    report.edges += record.edge_count();
                    records.push(record);
                    report.aggregated.push(id.clone());
                }
                Err(skip) => {
                    warn!(
                        sample = %id,
                        reason = skip.reason.as_str(),
                        "dropping sample from corpus: {}",
                        skip.detail
                    );
                    report.skipped.push(skip);
                }
            }
        }

        write_corpus_file(corpus_path, &records).map_err(|source| {
            PipelineError::CorpusWrite { path: corpus_path.to_path_buf(), source }
        })?;
        info!(
            samples = report.aggregated.len(),
            nodes = report.nodes,
            edges = report.edges,
            "converted ACFGs into corpus"
        );
        Ok(report)
    }
}

fn write_corpus_file(path: &Path, records: &[GraphRecord]) -> std::io::Result<()> {
    let staged = staging_path(path);
    let result = File::create(&staged).and_then(|file| {
        let mut out = BufWriter::new(file);
        write_corpus(&mut out, records)?;
        out.flush()?;
        out.get_ref().sync_all()
    });
    let result = result.and_then(|()| fs::rename(&staged, path));
    if result.is_err() {
        let _ = fs::remove_file(&staged);
    }
    result
}
