use std::collections::HashSet;
use std::path::PathBuf;
use std::thread;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::aggregate::CorpusAggregator;
use super::janitor::ArtifactJanitor;
use super::manifest::RunManifest;
use super::partition::partition_batches;
use super::worker::{panic_message, ExtractionWorker};
use super::{Phase, PipelineError, SkipReason, SkippedSample};
use crate::artifacts::ArtifactLayout;
use crate::config::{PipelineConfig, DEFAULT_CORPUS_FILE};
use crate::extract::GraphExtractor;
use crate::labels::LabelMap;
use crate::model::SampleId;
use crate::util::sha256_file;

/// Knobs the coordinator needs from the run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub workers: usize,
    pub corpus_file_name: String,
    pub keep_artifacts: bool,
    pub symmetric_adjacency: bool,
    pub write_manifest: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            corpus_file_name: DEFAULT_CORPUS_FILE.to_string(),
            keep_artifacts: false,
            symmetric_adjacency: false,
            write_manifest: true,
        }
    }
}

impl From<&PipelineConfig> for CoordinatorOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.workers,
            corpus_file_name: config.corpus_file_name.clone(),
            keep_artifacts: config.keep_artifacts,
            symmetric_adjacency: config.symmetric_adjacency,
            write_manifest: config.write_manifest,
        }
    }
}

/// Result of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub extractor: String,
    pub discovered: usize,
    pub batch_sizes: Vec<usize>,
    /// Ids whose triple was persisted by a worker, in discovery order.
    pub persisted: Vec<SampleId>,
    /// Ids written to the corpus, in corpus order.
    pub aggregated: Vec<SampleId>,
    pub skipped: Vec<SkippedSample>,
    pub corpus_path: PathBuf,
    pub nodes: usize,
    pub edges: usize,
    pub cleanup_ran: bool,
    pub artifacts_removed: usize,
    pub cleanup_failures: Vec<(PathBuf, String)>,
    pub manifest_path: Option<PathBuf>,
}

/// Run `work` once per batch, each on its own named OS thread, and wait for
/// all of them before returning. Results come back in batch order; a batch
/// whose thread panicked yields `Err` with the panic message.
pub fn run_batches<'s, R, F>(
    batches: &[&'s [SampleId]],
    role: &str,
    work: F,
) -> Result<Vec<Result<R, String>>, PipelineError>
where
    R: Send,
    F: Fn(usize, &'s [SampleId]) -> R + Sync,
{
    thread::scope(|scope| -> Result<Vec<Result<R, String>>, PipelineError> {
        let work = &work;
        let mut handles = Vec::with_capacity(batches.len());
        for (idx, batch) in batches.iter().copied().enumerate() {
            let name = format!("{role}-{idx}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn_scoped(scope, move || work(idx, batch))
                .map_err(|source| PipelineError::Spawn { worker: name, source })?;
            handles.push(handle);
        }

        // Join barrier: nothing downstream runs until every worker is done.
        Ok(handles
            .into_iter()
            .map(|handle| handle.join().map_err(|payload| panic_message(&*payload)))
            .collect())
    })
}

/// Drives one run: dispatch workers, wait, aggregate, clean up.
pub struct BatchCoordinator<'a> {
    layout: ArtifactLayout,
    labels: &'a LabelMap,
    extractor: &'a dyn GraphExtractor,
    options: CoordinatorOptions,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        layout: ArtifactLayout,
        labels: &'a LabelMap,
        extractor: &'a dyn GraphExtractor,
        options: CoordinatorOptions,
    ) -> Self {
        Self { layout, labels, extractor, options }
    }

    pub fn run(&self, ids: &[SampleId]) -> Result<RunSummary, PipelineError> {
        let started_at = Utc::now();
        let batches = partition_batches(ids, self.options.workers)?;
        let batch_sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        info!(
            samples = ids.len(),
            workers = batches.len(),
            extractor = self.extractor.name(),
            "dispatching extraction workers"
        );

        let results = run_batches(&batches, "acfg-worker", |idx, batch| {
            ExtractionWorker::new(idx, batch, self.labels, self.extractor, &self.layout).run()
        })?;

        let mut persisted: HashSet<SampleId> = HashSet::new();
        let mut skipped = Vec::new();
        for ((idx, result), batch) in results.into_iter().enumerate().zip(&batches) {
            match result {
                Ok(report) => {
                    persisted.extend(report.persisted);
                    skipped.extend(report.skipped);
                }
                Err(message) => {
                    error!(worker = idx, "worker panicked: {message}");
                    skipped.extend(batch.iter().map(|id| {
                        SkippedSample::new(
                            id,
                            Phase::Extract,
                            SkipReason::ExtractionFailure,
                            format!("worker panicked: {message}"),
                        )
                    }));
                }
            }
        }
        info!(persisted = persisted.len(), skipped = skipped.len(), "all workers joined");

        let persisted: Vec<SampleId> =
            ids.iter().filter(|id| persisted.contains(*id)).cloned().collect();
        let corpus_path = self.layout.corpus_path(&self.options.corpus_file_name);
        let aggregate = CorpusAggregator::new(&self.layout)
            .with_symmetric_adjacency(self.options.symmetric_adjacency)
            .aggregate(&persisted, &corpus_path)?;
        skipped.extend(aggregate.skipped.iter().cloned());

        let mut summary = RunSummary {
            extractor: self.extractor.name().to_string(),
            discovered: ids.len(),
            batch_sizes,
            persisted,
            aggregated: aggregate.aggregated,
            skipped,
            corpus_path,
            nodes: aggregate.nodes,
            edges: aggregate.edges,
            cleanup_ran: false,
            artifacts_removed: 0,
            cleanup_failures: Vec::new(),
            manifest_path: None,
        };

        if self.options.keep_artifacts {
            info!(dir = %self.layout.root.display(), "keeping intermediate artifacts");
        } else {
            let removal = ArtifactJanitor::new(&self.layout).sweep(&summary.aggregated);
            summary.cleanup_ran = true;
            summary.artifacts_removed = removal.removed;
            summary.cleanup_failures = removal.failed;
        }

        if self.options.write_manifest {
            let path = self.layout.manifest_path(&self.options.corpus_file_name);
            match self.manifest(&summary, started_at).write(&path) {
                Ok(()) => summary.manifest_path = Some(path),
                Err(e) => warn!(path = %path.display(), "failed to write run manifest: {e}"),
            }
        }

        info!(
            discovered = summary.discovered,
            aggregated = summary.aggregated.len(),
            skipped = summary.skipped.len(),
            corpus = %summary.corpus_path.display(),
            "corpus build finished"
        );
        Ok(summary)
    }

    fn manifest(&self, summary: &RunSummary, started_at: chrono::DateTime<Utc>) -> RunManifest {
        let corpus_sha256 = match sha256_file(&summary.corpus_path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(corpus = %summary.corpus_path.display(), "failed to hash corpus: {e}");
                None
            }
        };
        RunManifest {
            tool_version: crate::version().to_string(),
            started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            extractor: summary.extractor.clone(),
            workers: summary.batch_sizes.len(),
            batch_sizes: summary.batch_sizes.clone(),
            discovered: summary.discovered,
            persisted: summary.persisted.len(),
            aggregated: summary.aggregated.len(),
            symmetric_adjacency: self.options.symmetric_adjacency,
            corpus_file: self.options.corpus_file_name.clone(),
            corpus_sha256,
            skipped: summary.skipped.clone(),
        }
    }
}
