use std::path::{Path, PathBuf};

use anyhow::Result;

use acfg_core::config::PipelineConfig;
use acfg_core::pipeline::build_instruction_dictionary;

use crate::canonicalize_or_current;
use crate::commands::util::{apply_common_overrides, load_base_config, print_skipped};

/// Flags accepted by `discover-insts`.
#[derive(Debug, Clone, Default)]
pub struct DictionaryOptions {
    pub config: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub export: PathBuf,
    pub workers: Option<usize>,
    pub extractor: Option<String>,
    pub extension: Option<String>,
}

/// `NAME` becomes `NAME.csv`; a name already ending in `.csv` is kept.
pub fn export_path(export: &Path) -> PathBuf {
    let is_csv = export
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        export.to_path_buf()
    } else {
        let mut name = export.as_os_str().to_os_string();
        name.push(".csv");
        PathBuf::from(name)
    }
}

pub fn resolve_dictionary_config(options: &DictionaryOptions) -> Result<PipelineConfig> {
    let mut config = load_base_config(options.config.as_deref())?;
    apply_common_overrides(
        &mut config,
        options.source_dir.as_deref(),
        options.workers,
        options.extractor.as_deref(),
        options.extension.as_deref(),
    )?;
    Ok(config)
}

/// Discover the instruction dictionary and export it as CSV.
pub fn discover_insts_command(options: &DictionaryOptions) -> Result<()> {
    let config = resolve_dictionary_config(options)?;
    let path = canonicalize_or_current(&export_path(&options.export))?;
    tracing::debug!(?config, export = %path.display(), "resolved dictionary config");
    let report = build_instruction_dictionary(&config, &path)?;

    println!("Instruction dictionary:");
    println!("  Samples: {}", report.samples);
    println!("  Mnemonics: {}", report.mnemonics.len());
    println!("  Exported: {}", path.display());
    print_skipped(&report.failed);
    Ok(())
}
