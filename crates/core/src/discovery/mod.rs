//! Sample discovery: list the disassembly sources in a directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::model::SampleId;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to list {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Maps sample ids to the source files they were discovered from.
///
/// Ids without a discovered file fall back to `<dir>/<id>.<extension>`.
#[derive(Debug, Clone, Default)]
pub struct SampleSources {
    dir: PathBuf,
    extension: Option<String>,
    paths: BTreeMap<SampleId, PathBuf>,
}

impl SampleSources {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), ..Self::default() }
    }

    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = Some(extension.as_ref().trim_start_matches('.').to_string());
        self
    }

    pub fn ids(&self) -> Vec<SampleId> {
        self.paths.keys().cloned().collect()
    }

    /// Source file for `id`; `default_extension` applies only when neither a
    /// discovered file nor an explicit extension is known.
    pub fn path_for(&self, id: &SampleId, default_extension: &str) -> PathBuf {
        if let Some(path) = self.paths.get(id) {
            return path.clone();
        }
        let extension = self.extension.as_deref().unwrap_or(default_extension);
        self.dir.join(format!("{}.{extension}", id.as_str()))
    }
}

/// List the samples under `dir` (non-recursive) whose files end in `.<extension>`,
/// compared case-insensitively.
///
/// The id is the file name up to its first `.`. When two files share an id the
/// one whose name sorts first wins.
pub fn discover_samples(dir: &Path, extension: &str) -> Result<SampleSources, DiscoveryError> {
    if !dir.exists() {
        return Err(DiscoveryError::PathNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
    }

    let wanted = extension.trim_start_matches('.');
    let mut found: Vec<(SampleId, PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry =
            entry.map_err(|source| DiscoveryError::Walk { path: dir.to_path_buf(), source })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(wanted))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping sample with non UTF-8 name");
            continue;
        };
        let id = file_name.split('.').next().unwrap_or_default();
        if id.is_empty() {
            continue;
        }
        found.push((SampleId::new(id), path.to_path_buf()));
    }

    found.sort();
    let mut sources = SampleSources::new(dir).with_extension(wanted);
    for (id, path) in found {
        if let Some(kept) = sources.paths.get(&id) {
            tracing::warn!(
                sample = %id,
                kept = %kept.display(),
                ignored = %path.display(),
                "duplicate sample id"
            );
            continue;
        }
        sources.paths.insert(id, path);
    }
    tracing::debug!(dir = %dir.display(), count = sources.paths.len(), "discovered samples");
    Ok(sources)
}

/// Sorted, de-duplicated ids of [`discover_samples`], so the corpus order does
/// not depend on directory iteration order.
pub fn discover_sample_ids(dir: &Path, extension: &str) -> Result<Vec<SampleId>, DiscoveryError> {
    Ok(discover_samples(dir, extension)?.ids())
}
