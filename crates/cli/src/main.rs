use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use acfg_builder::commands::{
    build_command, discover_insts_command, inspect_command, list_extractors_command,
    version_command, BuildOptions, DictionaryOptions,
};
use acfg_builder::init_logging;

/// Build attributed control-flow graph (ACFG) corpora from disassembled samples.
///
/// This CLI is a thin wrapper around `acfg-core` (exposed in code as `acfg_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "acfg-builder",
    version,
    about = "Build ACFG datasets from disassembled samples",
    long_about = None
)]
struct Cli {
    /// Log filter directive (e.g. `debug`, `acfg_core=trace`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract every sample, aggregate the corpus, and clean up intermediates.
    ///
    /// Writes `<artifact-dir>/Acfg.txt` (or `--corpus-name`) plus a run manifest.
    Build {
        /// YAML or JSON config file. Flags given here override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory containing one disassembly file per sample.
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// CSV label table with `Id` and `Class` columns.
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Where artifacts and the corpus are written. Defaults to the source dir.
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Number of worker threads (one batch each).
        #[arg(long)]
        workers: Option<usize>,

        /// Graph extractor to use (see `list-extractors`).
        #[arg(long)]
        extractor: Option<String>,

        /// Sample file extension; defaults to the extractor's own.
        #[arg(long)]
        extension: Option<String>,

        /// Corpus file name inside the artifact dir.
        #[arg(long)]
        corpus_name: Option<String>,

        /// Leave per-sample artifacts in place after aggregation.
        #[arg(long, default_value_t = false)]
        keep_artifacts: bool,

        /// Mirror every edge before writing neighbor lists.
        #[arg(long, default_value_t = false)]
        symmetric: bool,

        /// Skip writing the run manifest.
        #[arg(long, default_value_t = false)]
        no_manifest: bool,

        /// Emit the run summary as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Collect the distinct instruction mnemonics of all samples into a CSV.
    DiscoverInsts {
        /// YAML or JSON config file. Flags given here override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory containing one disassembly file per sample.
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Output name; `.csv` is appended when missing.
        #[arg(long)]
        export: PathBuf,

        /// Number of worker threads (one batch each).
        #[arg(long)]
        workers: Option<usize>,

        /// Graph extractor to use (see `list-extractors`).
        #[arg(long)]
        extractor: Option<String>,

        /// Sample file extension; defaults to the extractor's own.
        #[arg(long)]
        extension: Option<String>,
    },

    /// Validate a corpus file and print sample, label, node, and edge counts.
    Inspect {
        /// Path to the corpus file.
        #[arg(long)]
        corpus: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the graph extractors compiled into this binary.
    ListExtractors {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the tool and library version.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    match cli.command.unwrap_or(Command::Version) {
        Command::Build {
            config,
            source_dir,
            labels,
            artifact_dir,
            workers,
            extractor,
            extension,
            corpus_name,
            keep_artifacts,
            symmetric,
            no_manifest,
            json,
        } => {
            let options = BuildOptions {
                config,
                source_dir,
                labels,
                artifact_dir,
                workers,
                extractor,
                extension,
                corpus_name,
                keep_artifacts,
                symmetric,
                no_manifest,
            };
            build_command(&options, json)?
        }
        Command::DiscoverInsts { config, source_dir, export, workers, extractor, extension } => {
            let options =
                DictionaryOptions { config, source_dir, export, workers, extractor, extension };
            discover_insts_command(&options)?
        }
        Command::Inspect { corpus, json } => inspect_command(&corpus, json)?,
        Command::ListExtractors { json } => list_extractors_command(json)?,
        Command::Version => version_command(),
    }

    Ok(())
}
