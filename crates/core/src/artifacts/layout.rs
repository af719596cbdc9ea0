use std::path::{Path, PathBuf};

use crate::model::SampleId;

pub const FEATURES_SUFFIX: &str = ".features.txt";
pub const LABEL_SUFFIX: &str = ".label.txt";
pub const ADJACENCY_SUFFIX: &str = ".adjacent.npz";

/// Logical layout of per-sample artifacts and the corpus under one directory.
///
/// This does *not* perform any IO itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// Directory holding the per-sample artifacts and the corpus.
    pub root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn features_path(&self, id: &SampleId) -> PathBuf {
        self.with_suffix(id, FEATURES_SUFFIX)
    }

    pub fn label_path(&self, id: &SampleId) -> PathBuf {
        self.with_suffix(id, LABEL_SUFFIX)
    }

    pub fn adjacency_path(&self, id: &SampleId) -> PathBuf {
        self.with_suffix(id, ADJACENCY_SUFFIX)
    }

    /// The three artifact paths in write order.
    pub fn triple_paths(&self, id: &SampleId) -> [PathBuf; 3] {
        [self.features_path(id), self.label_path(id), self.adjacency_path(id)]
    }

    pub fn corpus_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// `<corpus>.manifest.json` next to the corpus file.
    pub fn manifest_path(&self, corpus_file_name: &str) -> PathBuf {
        self.root.join(format!("{corpus_file_name}.manifest.json"))
    }

    fn with_suffix(&self, id: &SampleId, suffix: &str) -> PathBuf {
        self.root.join(format!("{}{suffix}", id.as_str()))
    }
}
