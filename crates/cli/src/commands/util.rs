use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use acfg_core::config::PipelineConfig;
use acfg_core::pipeline::SkippedSample;

use crate::canonicalize_or_current;

/// Load `--config` if given, otherwise start from defaults.
pub fn load_base_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Apply flags shared by every pipeline command on top of `config`.
pub fn apply_common_overrides(
    config: &mut PipelineConfig,
    source_dir: Option<&Path>,
    workers: Option<usize>,
    extractor: Option<&str>,
    extension: Option<&str>,
) -> Result<()> {
    if let Some(dir) = source_dir {
        config.source_dir = canonicalize_or_current(dir)?;
    }
    if config.source_dir.as_os_str().is_empty() {
        return Err(anyhow!("--source-dir is required (or set source_dir in --config)"));
    }
    if let Some(n) = workers {
        config.workers = n;
    }
    if let Some(name) = extractor {
        config.extractor = name.to_string();
    }
    if let Some(ext) = extension {
        config.sample_extension = Some(ext.trim_start_matches('.').to_string());
    }
    Ok(())
}

/// Resolve an optional path flag the same way as `--source-dir`.
pub fn resolve_optional(path: Option<&Path>) -> Result<Option<PathBuf>> {
    path.map(canonicalize_or_current).transpose()
}

/// Print skipped samples, one per line, under a heading.
pub fn print_skipped(skipped: &[SkippedSample]) {
    if skipped.is_empty() {
        println!("  Skipped: none");
        return;
    }
    println!("  Skipped: {}", skipped.len());
    for skip in skipped {
        println!("    - {} [{}]: {}", skip.sample, skip.reason.as_str(), skip.detail);
    }
}
