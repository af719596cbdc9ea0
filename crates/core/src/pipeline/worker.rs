use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{Phase, SkipReason, SkippedSample};
use crate::artifacts::{write_triple, ArtifactLayout};
use crate::extract::{ExtractError, GraphExtractor};
use crate::labels::LabelMap;
use crate::model::{AttributedCfg, ModelError, SampleId};

/// What one worker did with its batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerReport {
    pub worker: usize,
    /// Ids whose artifact triple was written, in batch order.
    pub persisted: Vec<SampleId>,
    pub skipped: Vec<SkippedSample>,
}

/// Processes one batch of samples sequentially.
///
/// Labels, the extractor, and the layout are shared read-only with sibling
/// workers; each worker only ever writes the artifact files of its own ids.
pub struct ExtractionWorker<'a> {
    index: usize,
    batch: &'a [SampleId],
    labels: &'a LabelMap,
    extractor: &'a dyn GraphExtractor,
    layout: &'a ArtifactLayout,
}

impl<'a> ExtractionWorker<'a> {
    pub fn new(
        index: usize,
        batch: &'a [SampleId],
        labels: &'a LabelMap,
        extractor: &'a dyn GraphExtractor,
        layout: &'a ArtifactLayout,
    ) -> Self {
        Self { index, batch, labels, extractor, layout }
    }

    pub fn run(&self) -> WorkerReport {
        let total = self.batch.len();
        info!(worker = self.index, samples = total, "worker started");

        let mut report = WorkerReport { worker: self.index, ..WorkerReport::default() };
        for (i, id) in self.batch.iter().enumerate() {
            debug!(worker = self.index, sample = %id, "processing {}/{}", i + 1, total);
            match self.process(id) {
                Ok(nodes) => {
                    debug!(worker = self.index, sample = %id, nodes, "persisted artifacts");
                    report.persisted.push(id.clone());
                }
                Err(skip) => {
                    log_skip(self.index, &skip);
                    report.skipped.push(skip);
                }
            }
        }

        info!(
            worker = self.index,
            persisted = report.persisted.len(),
            skipped = report.skipped.len(),
            "worker finished"
        );
        report
    }

    fn process(&self, id: &SampleId) -> Result<usize, SkippedSample> {
        let Some(label) = self.labels.get(id) else {
            return Err(SkippedSample::new(
                id,
                Phase::Extract,
                SkipReason::MissingLabel,
                "no label in label table",
            ));
        };

        let cfg = guarded(|| self.extractor.extract(id)).map_err(|detail| {
            SkippedSample::new(id, Phase::Extract, SkipReason::ExtractionFailure, detail)
        })?;
        check_shape(&cfg).map_err(|e| {
            SkippedSample::new(id, Phase::Extract, SkipReason::ExtractionFailure, e.to_string())
        })?;

        write_triple(self.layout, id, &cfg, label).map_err(|e| {
            SkippedSample::new(id, Phase::Persist, SkipReason::IoFailure, e.to_string())
        })?;
        Ok(cfg.node_count())
    }
}

fn log_skip(worker: usize, skip: &SkippedSample) {
    match skip.reason {
        SkipReason::MissingLabel => {
            warn!(worker, sample = %skip.sample, "unable to label sample, skipping")
        }
        _ => error!(
            worker,
            sample = %skip.sample,
            phase = ?skip.phase,
            reason = skip.reason.as_str(),
            "{}",
            skip.detail
        ),
    }
}

/// Extractors hand out public fields, so re-check the shape before persisting.
fn check_shape(cfg: &AttributedCfg) -> Result<(), ModelError> {
    if cfg.features.node_count() != cfg.adjacency.node_count() {
        return Err(ModelError::ShapeMismatch {
            features: cfg.features.node_count(),
            adjacency: cfg.adjacency.node_count(),
        });
    }
    Ok(())
}

/// Run an extractor call, turning both errors and panics into a message.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, ExtractError>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("extractor panicked: {}", panic_message(&*payload))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_reports_panics_as_messages() {
        let err = guarded::<()>(|| panic!("boom")).unwrap_err();
        assert!(err.contains("boom"), "{err}");
    }

    #[test]
    fn guarded_passes_errors_through() {
        let id = SampleId::new("x");
        let err = guarded::<()>(|| Err(ExtractError::NoCode(id))).unwrap_err();
        assert!(!err.is_empty());
    }
}
