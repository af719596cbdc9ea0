//! acfg-core
//!
//! Core library for turning a directory of disassembled samples into a single
//! attributed control-flow graph (ACFG) corpus for graph classification.
//!
//! This crate defines the graph model, label and sample discovery, the graph
//! extractors, the per-sample artifact store, and the parallel batch pipeline
//! that extracts, aggregates, and cleans up.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends (the CLI, notebooks driving the binary, etc.).

pub mod model;
pub mod labels;
pub mod discovery;
pub mod artifacts;
pub mod extract;
pub mod pipeline;
pub mod config;
pub mod util;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
