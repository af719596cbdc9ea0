use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::SkippedSample;
use crate::artifacts::ArtifactError;
use crate::util::write_atomically;

/// Metadata written next to the corpus after a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub tool_version: String,
    /// RFC3339 timestamps.
    pub started_at: String,
    pub finished_at: String,
    pub extractor: String,
    pub workers: usize,
    pub batch_sizes: Vec<usize>,
    pub discovered: usize,
    pub persisted: usize,
    pub aggregated: usize,
    pub symmetric_adjacency: bool,
    pub corpus_file: String,
    pub corpus_sha256: Option<String>,
    #[serde(default)]
    pub skipped: Vec<SkippedSample>,
}

impl RunManifest {
    pub fn write(&self, path: &Path) -> Result<(), ArtifactError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ArtifactError::io(path, std::io::Error::other(e)))?;
        write_atomically(path, json).map_err(|source| ArtifactError::io(path, source))
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let body = fs::read_to_string(path).map_err(|source| ArtifactError::io(path, source))?;
        serde_json::from_str(&body)
            .map_err(|e| ArtifactError::malformed(path, e.line(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SampleId;
    use crate::pipeline::{Phase, SkipReason};

    #[test]
    fn manifest_survives_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Acfg.txt.manifest.json");
        let manifest = RunManifest {
            tool_version: "0.1.0".into(),
            started_at: "2026-01-01T00:00:00+00:00".into(),
            finished_at: "2026-01-01T00:00:05+00:00".into(),
            extractor: "listing".into(),
            workers: 2,
            batch_sizes: vec![1, 2],
            discovered: 3,
            persisted: 2,
            aggregated: 2,
            symmetric_adjacency: false,
            corpus_file: "Acfg.txt".into(),
            corpus_sha256: Some("ab".into()),
            skipped: vec![SkippedSample::new(
                &SampleId::new("c"),
                Phase::Extract,
                SkipReason::MissingLabel,
                "no label",
            )],
        };
        manifest.write(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"missing_label\""));
        assert_eq!(RunManifest::load(&path).unwrap(), manifest);
    }
}
