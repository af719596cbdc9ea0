//! Run configuration for the corpus pipeline.
//!
//! A config file (YAML or JSON, chosen by extension) supplies defaults that
//! command-line flags may override. Relative paths in a config file are
//! resolved against the directory holding that file.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CORPUS_FILE: &str = "Acfg.txt";
pub const DEFAULT_EXTRACTOR: &str = "listing";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding one disassembly file per sample.
    pub source_dir: PathBuf,
    /// Where artifacts and the corpus go. Defaults to `source_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
    /// CSV label table with `Id` and `Class` columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_path: Option<PathBuf>,
    pub workers: usize,
    pub extractor: String,
    /// Overrides the extractor's own sample extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_extension: Option<String>,
    pub corpus_file_name: String,
    pub keep_artifacts: bool,
    pub symmetric_adjacency: bool,
    pub write_manifest: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            artifact_dir: None,
            label_path: None,
            workers: default_worker_count(),
            extractor: DEFAULT_EXTRACTOR.to_string(),
            sample_extension: None,
            corpus_file_name: DEFAULT_CORPUS_FILE.to_string(),
            keep_artifacts: false,
            symmetric_adjacency: false,
            write_manifest: true,
        }
    }
}

/// Number of workers used when none is configured.
pub fn default_worker_count() -> usize {
    thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
}

impl PipelineConfig {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self { source_dir: source_dir.into(), ..Self::default() }
    }

    /// Load a config file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let body = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let mut config: PipelineConfig = if is_json {
            serde_json::from_str(&body).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&body).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Join every relative path in this config onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let join = |p: &Path| if p.is_relative() { base.join(p) } else { p.to_path_buf() };
        if !self.source_dir.as_os_str().is_empty() {
            self.source_dir = join(&self.source_dir);
        }
        self.artifact_dir = self.artifact_dir.as_deref().map(join);
        self.label_path = self.label_path.as_deref().map(join);
    }

    pub fn artifact_dir(&self) -> &Path {
        self.artifact_dir.as_deref().unwrap_or(&self.source_dir)
    }

    pub fn require_label_path(&self) -> Result<&Path, ConfigError> {
        match self.label_path.as_deref() {
            Some(p) if !p.as_os_str().is_empty() => Ok(p),
            _ => Err(ConfigError::Invalid("a label file is required".to_string())),
        }
    }

    /// Check values that would otherwise fail deep inside a run.
    pub fn validate(&self, known_extractors: &[String]) -> Result<(), ConfigError> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("source_dir is required".to_string()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if !known_extractors.iter().any(|name| name == &self.extractor) {
            return Err(ConfigError::Invalid(format!(
                "unknown extractor '{}'. Available: {}",
                self.extractor,
                known_extractors.join(", ")
            )));
        }
        let name = self.corpus_file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "corpus_file_name must be a plain file name, got '{}'",
                self.corpus_file_name
            )));
        }
        if let Some(ext) = &self.sample_extension {
            if ext.trim_start_matches('.').is_empty() {
                return Err(ConfigError::Invalid("sample_extension must not be empty".into()));
            }
        }
        Ok(())
    }
}
