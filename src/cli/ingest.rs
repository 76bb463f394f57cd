use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::error::GraphError;
use crate::graph::GraphDb;
use crate::ingest::{GeoJsonLayer, IngestOptions, IngestReport, Ingestor};
use crate::store::OpenOptions;

/// Error type for CLI runs.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Store, adapter or ingestion error.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The options file could not be parsed.
    #[error("invalid config file {}: {source}", path.display())]
    Config {
        /// File that was read.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
}

impl From<&str> for CliError {
    fn from(value: &str) -> Self {
        CliError::Message(value.to_string())
    }
}

impl From<String> for CliError {
    fn from(value: String) -> Self {
        CliError::Message(value)
    }
}

/// Configuration for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// GeoJSON inputs, ingested in order.
    pub inputs: Vec<PathBuf>,
    /// Store to create, or to append to if it exists.
    pub store: PathBuf,
    /// Options used to open or create the store.
    pub open: OpenOptions,
    /// Ingestion options. When `layer` is unset, each input is tagged with its file stem.
    pub ingest: IngestOptions,
}

/// Progress notifications emitted by [`run_ingest`].
#[derive(Debug, Clone, Copy)]
pub enum IngestProgress<'a> {
    /// An input was read and holds `features` features.
    InputOpened {
        /// Input path.
        path: &'a Path,
        /// Features in the document.
        features: usize,
    },
    /// Features processed so far, over all inputs.
    FeaturesSeen(u64),
}

/// Summary statistics from an ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    /// Store written to.
    pub store: PathBuf,
    /// Whether the run created the store.
    pub created: bool,
    /// Inputs processed.
    pub inputs: usize,
    /// Features read.
    pub features_seen: u64,
    /// Features committed.
    pub features_ingested: u64,
    /// Edge rows inserted.
    pub edges_inserted: u64,
    /// Edge writes folded into existing rows.
    pub edges_merged: u64,
    /// Node rows created.
    pub nodes_created: u64,
    /// Transactions committed.
    pub batches_committed: u64,
    /// Columns added to the store.
    pub columns_added: Vec<String>,
    /// One line per skipped feature.
    pub failures: Vec<String>,
    /// Nodes in the store after the run.
    pub node_count: u64,
    /// Edges in the store after the run.
    pub edge_count: u64,
}

impl IngestSummary {
    fn absorb(&mut self, report: IngestReport) {
        self.features_seen += report.features_seen;
        self.features_ingested += report.features_ingested;
        self.edges_inserted += report.edges_inserted;
        self.edges_merged += report.edges_merged;
        self.nodes_created += report.nodes_created;
        self.batches_committed += report.batches_committed;
        self.columns_added.extend(report.columns_added);
        self.failures
            .extend(report.failures.iter().map(ToString::to_string));
    }
}

/// Reads [`IngestOptions`] from a TOML file.
pub fn load_ingest_options(path: &Path) -> Result<IngestOptions, CliError> {
    let text = fs::read_to_string(path)?;
    IngestOptions::from_toml(&text).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Ingests every input into the store, creating the store if it does not exist.
///
/// Per-feature failures are collected into the summary; anything else aborts the run.
/// The planner statistics are refreshed once all inputs are in.
pub fn run_ingest(
    cfg: &IngestConfig,
    mut progress: impl FnMut(IngestProgress<'_>),
) -> Result<IngestSummary, CliError> {
    if cfg.inputs.is_empty() {
        return Err("at least one input file is required".into());
    }
    for input in &cfg.inputs {
        if !input.is_file() {
            return Err(CliError::Message(format!(
                "input {} does not exist",
                input.display()
            )));
        }
    }

    let created = !cfg.store.exists();
    let mut db = if created {
        GraphDb::create_with_options(&cfg.store, cfg.open.clone())?
    } else {
        let mut db = GraphDb::connect_with_options(&cfg.store, cfg.open.clone())?;
        if cfg.open.spatial_index && !db.has_spatial_index()? {
            db.enable_spatial_index()?;
        }
        db
    };

    let mut summary = IngestSummary {
        store: cfg.store.clone(),
        created,
        inputs: cfg.inputs.len(),
        ..IngestSummary::default()
    };
    for input in &cfg.inputs {
        let layer = GeoJsonLayer::open(input)?;
        progress(IngestProgress::InputOpened {
            path: input,
            features: layer.len(),
        });
        let mut opts = cfg.ingest.clone();
        if opts.layer.is_none() {
            opts.layer = layer.name().map(str::to_string);
        }
        let offset = summary.features_seen;
        let mut ingestor = Ingestor::new(&mut db, opts)?
            .on_progress(|report| progress(IngestProgress::FeaturesSeen(offset + report.features_seen)));
        ingestor.ingest(layer.features())?;
        let report = ingestor.finish()?;
        info!(
            input = %input.display(),
            features = report.features_seen,
            skipped = report.skipped(),
            "cli.input.done"
        );
        summary.absorb(report);
    }

    db.optimize()?;
    summary.node_count = db.node_count()?;
    summary.edge_count = db.edge_count()?;
    db.close()?;
    Ok(summary)
}
