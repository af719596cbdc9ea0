use std::path::PathBuf;

use anyhow::Result;

use acfg_core::config::PipelineConfig;
use acfg_core::pipeline::{build_corpus, RunSummary};

use crate::commands::util::{
    apply_common_overrides, load_base_config, print_skipped, resolve_optional,
};

/// Flags accepted by `build`. `None` leaves the config file (or default) value.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub config: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub artifact_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub extractor: Option<String>,
    pub extension: Option<String>,
    pub corpus_name: Option<String>,
    pub keep_artifacts: bool,
    pub symmetric: bool,
    pub no_manifest: bool,
}

/// Merge flags over the config file over defaults.
pub fn resolve_build_config(options: &BuildOptions) -> Result<PipelineConfig> {
    let mut config = load_base_config(options.config.as_deref())?;
    apply_common_overrides(
        &mut config,
        options.source_dir.as_deref(),
        options.workers,
        options.extractor.as_deref(),
        options.extension.as_deref(),
    )?;
    if let Some(labels) = resolve_optional(options.labels.as_deref())? {
        config.label_path = Some(labels);
    }
    if let Some(dir) = resolve_optional(options.artifact_dir.as_deref())? {
        config.artifact_dir = Some(dir);
    }
    if let Some(name) = &options.corpus_name {
        config.corpus_file_name = name.clone();
    }
    config.keep_artifacts |= options.keep_artifacts;
    config.symmetric_adjacency |= options.symmetric;
    if options.no_manifest {
        config.write_manifest = false;
    }
    Ok(config)
}

/// Run the full pipeline and report what happened.
pub fn build_command(options: &BuildOptions, json: bool) -> Result<()> {
    let config = resolve_build_config(options)?;
    tracing::debug!(?config, "resolved pipeline config");
    let summary = build_corpus(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Built ACFG corpus:");
    println!("  Corpus: {}", summary.corpus_path.display());
    println!("  Extractor: {}", summary.extractor);
    println!(
        "  Batches: {} ({})",
        summary.batch_sizes.len(),
        summary.batch_sizes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
    );
    println!("  Discovered: {}", summary.discovered);
    println!("  Persisted: {}", summary.persisted.len());
    println!("  Aggregated: {}", summary.aggregated.len());
    println!("  Nodes: {}, edges: {}", summary.nodes, summary.edges);
    print_skipped(&summary.skipped);
    if summary.cleanup_ran {
        println!("  Artifacts removed: {}", summary.artifacts_removed);
        for (path, reason) in &summary.cleanup_failures {
            println!("    ! {}: {}", path.display(), reason);
        }
    } else {
        println!("  Artifacts kept");
    }
    if let Some(path) = &summary.manifest_path {
        println!("  Manifest: {}", path.display());
    }
}
