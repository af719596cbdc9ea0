use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::coordinator::run_batches;
use super::partition::partition_batches;
use super::worker::guarded;
use super::{Phase, PipelineError, SkipReason, SkippedSample};
use crate::extract::GraphExtractor;
use crate::model::SampleId;
use crate::util::write_atomically;

/// Union of instruction mnemonics seen across a sample set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DictionaryReport {
    pub samples: usize,
    pub mnemonics: BTreeSet<String>,
    pub failed: Vec<SkippedSample>,
}

/// Collect every distinct mnemonic in `ids`, one thread per batch.
///
/// Each worker fills a private set; the sets are merged only after all workers
/// have joined.
pub fn discover_instruction_dictionary(
    ids: &[SampleId],
    workers: usize,
    extractor: &dyn GraphExtractor,
) -> Result<DictionaryReport, PipelineError> {
    let batches = partition_batches(ids, workers)?;
    info!(samples = ids.len(), workers = batches.len(), "discovering instruction dictionary");

    let results = run_batches(&batches, "inst-worker", |idx, batch| {
        let mut seen = BTreeSet::new();
        let mut failed = Vec::new();
        for (i, id) in batch.iter().enumerate() {
            debug!(worker = idx, sample = %id, "scanning {}/{}", i + 1, batch.len());
            match guarded(|| extractor.mnemonics(id)) {
                Ok(found) => seen.extend(found),
                Err(detail) => {
                    warn!(worker = idx, sample = %id, "skipping sample: {detail}");
                    failed.push(SkippedSample::new(
                        id,
                        Phase::Discover,
                        SkipReason::ExtractionFailure,
                        detail,
                    ));
                }
            }
        }
        (seen, failed)
    })?;

    let mut report = DictionaryReport { samples: ids.len(), ..Default::default() };
    for ((idx, result), batch) in results.into_iter().enumerate().zip(&batches) {
        match result {
            Ok((seen, failed)) => {
                report.mnemonics.extend(seen);
                report.failed.extend(failed);
            }
            Err(message) => {
                error!(worker = idx, "worker panicked: {message}");
                report.failed.extend(batch.iter().map(|id| {
                    SkippedSample::new(id, Phase::Discover, SkipReason::ExtractionFailure, &message)
                }));
            }
        }
    }
    info!(mnemonics = report.mnemonics.len(), failed = report.failed.len(), "dictionary ready");
    Ok(report)
}

/// Render the dictionary as CSV with a blank index header, e.g.
/// ```text
/// ,Inst
/// 0,add
/// 1,call
/// ```
pub fn render_instruction_dictionary(mnemonics: &BTreeSet<String>) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["", "Inst"])?;
    for (idx, mnemonic) in mnemonics.iter().enumerate() {
        writer.write_record([idx.to_string().as_str(), mnemonic.as_str()])?;
    }
    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn export_instruction_dictionary(
    mnemonics: &BTreeSet<String>,
    path: &Path,
) -> Result<(), PipelineError> {
    let export_err = |source: io::Error| PipelineError::Export { path: path.to_path_buf(), source };
    let body = render_instruction_dictionary(mnemonics).map_err(|e| export_err(e.into()))?;
    write_atomically(path, body).map_err(export_err)?;
    info!(path = %path.display(), entries = mnemonics.len(), "exported instruction dictionary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(set: &BTreeSet<String>) -> String {
        render_instruction_dictionary(set).expect("render")
    }

    #[test]
    fn csv_has_index_column_and_sorted_entries() {
        let set: BTreeSet<String> = ["mov", "add", "call"].iter().map(|s| s.to_string()).collect();
        assert_eq!(render(&set), ",Inst\n0,add\n1,call\n2,mov\n");
        assert_eq!(render(&BTreeSet::new()), ",Inst\n");
    }

    #[test]
    fn csv_quotes_entries_with_delimiters() {
        let set: BTreeSet<String> =
            ["rep movsb", "odd,name"].iter().map(|s| s.to_string()).collect();
        assert_eq!(render(&set), ",Inst\n0,\"odd,name\"\n1,rep movsb\n");
    }
}
