//! Per-sample intermediate artifacts.
//!
//! For sample `X` under directory `P` a worker persists:
//! - `P/X.features.txt`: integer matrix, one whitespace-separated row per node.
//! - `P/X.label.txt`: the class label on a single line.
//! - `P/X.adjacent.npz`: sparse coordinate listing of the adjacency relation,
//!   `rows cols nnz` on the first line then one `row col` line per entry.
//!
//! The triple is staged and renamed into place so readers never observe a
//! partially written sample.

mod layout;
mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use layout::{ArtifactLayout, ADJACENCY_SUFFIX, FEATURES_SUFFIX, LABEL_SUFFIX};
pub use store::{
    has_triple, read_adjacency, read_features, read_label, remove_triple, render_adjacency,
    render_features, write_triple, RemovalReport,
};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact {path} (line {line}): {reason}")]
    Malformed { path: PathBuf, line: usize, reason: String },
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(
        path: impl Into<PathBuf>,
        line: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::Malformed { path: path.into(), line, reason: reason.into() }
    }

    /// True when the underlying cause is a file that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
