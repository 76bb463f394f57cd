#![forbid(unsafe_code)]

//! Library side of the `linegraph` binary.
//!
//! The binary only parses arguments and renders output; the run itself lives here so it
//! can be tested without spawning a process.

/// Ingestion runs over GeoJSON files.
pub mod ingest;

pub use ingest::{
    load_ingest_options, run_ingest, CliError, IngestConfig, IngestProgress, IngestSummary,
};
