//! Batched conversion of line features into graph writes.

use std::mem;

use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GraphError, Result};
use crate::graph::write::WriteOp;
use crate::graph::{BatchOutcome, GraphDb};
use crate::ingest::feature::{FeatureError, FeatureFailure, LineFeature};
use crate::key::NodeKey;
use crate::store::schema::validate_names;
use crate::store::spatial::encode_line;
use crate::store::Table;
use crate::types::{Attributes, PropValue, GEOMETRY_ATTR, LAYER_ATTR};

/// Default number of features committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Knobs of an ingestion run.
///
/// Deserializes from TOML or JSON; missing keys take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestOptions {
    /// Features buffered before a commit.
    pub batch_size: usize,
    /// Also insert the `v -> u` edge for every feature.
    pub bidirectional: bool,
    /// Numeric properties negated on reverse edges, e.g. `incline`.
    pub reverse_negate: Vec<String>,
    /// Store the full line as GeoJSON text in `_geometry`.
    pub store_geometry: bool,
    /// Value written to `_layer`. The CLI defaults this to each input's file stem.
    pub layer: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            bidirectional: false,
            reverse_negate: Vec::new(),
            store_geometry: true,
            layer: None,
        }
    }
}

impl IngestOptions {
    /// Parses options from TOML text.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Sets [`IngestOptions::batch_size`].
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets [`IngestOptions::bidirectional`].
    pub fn bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    /// Adds a property to [`IngestOptions::reverse_negate`].
    pub fn negate_on_reverse(mut self, key: impl Into<String>) -> Self {
        self.reverse_negate.push(key.into());
        self
    }

    /// Sets [`IngestOptions::store_geometry`].
    pub fn store_geometry(mut self, store_geometry: bool) -> Self {
        self.store_geometry = store_geometry;
        self
    }

    /// Sets [`IngestOptions::layer`].
    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }
}

/// Totals of an ingestion run.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    /// Features handed to the ingestor, good or bad.
    pub features_seen: u64,
    /// Features whose edges were committed.
    pub features_ingested: u64,
    /// Edge rows inserted.
    pub edges_inserted: u64,
    /// Edge writes folded into existing rows.
    pub edges_merged: u64,
    /// Node rows created.
    pub nodes_created: u64,
    /// Transactions committed.
    pub batches_committed: u64,
    /// Columns the run added to the store.
    pub columns_added: Vec<String>,
    /// Skipped features.
    #[serde(skip)]
    pub failures: Vec<FeatureFailure>,
}

impl IngestReport {
    /// Number of skipped features.
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }

    fn absorb(&mut self, outcome: BatchOutcome, features: u64) {
        self.features_ingested += features;
        self.edges_inserted += outcome.edges_inserted;
        self.edges_merged += outcome.edges_merged;
        self.nodes_created += outcome.nodes_created;
        self.batches_committed += 1;
        self.columns_added.extend(outcome.columns_added);
    }
}

struct Pending {
    index: u64,
    layer: Option<String>,
    ops: Vec<WriteOp>,
}

type ProgressFn<'g> = Box<dyn FnMut(&IngestReport) + 'g>;

/// Streams features into a [`GraphDb`], committing every `batch_size` features.
///
/// Malformed features are recorded in the report and skipped. Only failures that are not
/// attributable to a single feature (I/O, locking) abort the run. Features still buffered
/// when the ingestor is dropped without [`Ingestor::finish`] are discarded.
pub struct Ingestor<'g> {
    db: &'g mut GraphDb,
    opts: IngestOptions,
    pending: Vec<Pending>,
    report: IngestReport,
    progress: Option<ProgressFn<'g>>,
}

impl<'g> Ingestor<'g> {
    /// Starts a run against `db`.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidArgument`] if `opts.batch_size` is zero, or
    /// [`GraphError::ReadOnly`] if `db` was opened read-only.
    pub fn new(db: &'g mut GraphDb, opts: IngestOptions) -> Result<Self> {
        db.ensure_writable()?;
        if opts.batch_size == 0 {
            return Err(GraphError::InvalidArgument(
                "batch_size must be at least 1".into(),
            ));
        }
        Ok(Self {
            db,
            pending: Vec::with_capacity(opts.batch_size),
            opts,
            report: IngestReport::default(),
            progress: None,
        })
    }

    /// Calls `f` after every feature and every commit.
    pub fn on_progress(mut self, f: impl FnMut(&IngestReport) + 'g) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Changes the `_layer` value for features pushed from now on.
    pub fn set_layer(&mut self, layer: Option<String>) {
        self.opts.layer = layer;
    }

    /// Report so far.
    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    /// Buffers one feature, committing when the batch is full.
    pub fn push(&mut self, feature: LineFeature) -> Result<()> {
        let index = self.report.features_seen;
        self.report.features_seen += 1;
        match self.feature_ops(&feature) {
            Ok(ops) => self.pending.push(Pending {
                index,
                layer: self.opts.layer.clone(),
                ops,
            }),
            Err(error) => self.skip(index, self.opts.layer.clone(), error),
        }
        if self.pending.len() >= self.opts.batch_size {
            self.flush()?;
        } else {
            self.notify();
        }
        Ok(())
    }

    /// Like [`Ingestor::push`], for features whose decoding may already have failed.
    pub fn push_result(&mut self, feature: std::result::Result<LineFeature, FeatureError>) -> Result<()> {
        match feature {
            Ok(feature) => self.push(feature),
            Err(error) => {
                let index = self.report.features_seen;
                self.report.features_seen += 1;
                self.skip(index, self.opts.layer.clone(), error);
                self.notify();
                Ok(())
            }
        }
    }

    /// Pushes every item of `features`.
    pub fn ingest<I>(&mut self, features: I) -> Result<()>
    where
        I: IntoIterator<Item = std::result::Result<LineFeature, FeatureError>>,
    {
        for feature in features {
            self.push_result(feature)?;
        }
        Ok(())
    }

    /// Commits whatever is buffered.
    ///
    /// If the batch is rejected because of its content, its features are retried one per
    /// transaction so that only the offending ones are skipped.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = mem::take(&mut self.pending);
        let features = batch.len() as u64;
        let ops: Vec<WriteOp> = batch.iter().flat_map(|p| p.ops.iter().cloned()).collect();
        match self.db.write_batch(&ops, features) {
            Ok(outcome) => {
                debug!(
                    features,
                    edges = outcome.edges_inserted + outcome.edges_merged,
                    nodes_created = outcome.nodes_created,
                    "ingest.batch.committed"
                );
                self.report.absorb(outcome, features);
            }
            Err(err) if is_feature_fault(&err) => {
                warn!(features, error = %err, "ingest.batch.isolating");
                for pending in batch {
                    match self.db.write_batch(&pending.ops, 1) {
                        Ok(outcome) => self.report.absorb(outcome, 1),
                        Err(err) if is_feature_fault(&err) => {
                            self.skip(pending.index, pending.layer, FeatureError::Rejected(err))
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            Err(err) => return Err(err),
        }
        self.notify();
        Ok(())
    }

    /// Commits the remaining features and returns the report.
    pub fn finish(mut self) -> Result<IngestReport> {
        self.flush()?;
        let report = mem::take(&mut self.report);
        info!(
            features_seen = report.features_seen,
            features_ingested = report.features_ingested,
            edges_inserted = report.edges_inserted,
            nodes_created = report.nodes_created,
            skipped = report.skipped(),
            "ingest.completed"
        );
        Ok(report)
    }

    fn skip(&mut self, index: u64, layer: Option<String>, error: FeatureError) {
        warn!(
            index,
            layer = layer.as_deref().unwrap_or(""),
            error = %error,
            "ingest.feature.skipped"
        );
        self.report.failures.push(FeatureFailure {
            index,
            layer,
            error,
        });
    }

    fn notify(&mut self) {
        if let Some(progress) = self.progress.as_mut() {
            progress(&self.report);
        }
    }

    fn feature_ops(&self, feature: &LineFeature) -> std::result::Result<Vec<WriteOp>, FeatureError> {
        let (start, end) = feature.endpoints()?;
        validate_names(Table::Edges, &feature.properties)?;
        if let Some(key) = feature.properties.keys().find(|key| is_system_attr(key)) {
            return Err(FeatureError::Rejected(GraphError::Schema(format!(
                "'{key}' is written by the ingestor and cannot be a feature property"
            ))));
        }
        let precision = self.db.precision();
        let u = NodeKey::from_coord(start, precision)?;
        let v = NodeKey::from_coord(end, precision)?;

        let mut attrs = feature.properties.clone();
        if let Some(layer) = &self.opts.layer {
            attrs.insert(LAYER_ATTR.to_string(), PropValue::from(layer.as_str()));
        }
        let mut line = if self.opts.store_geometry {
            feature.line()
        } else {
            Vec::new()
        };
        if self.opts.store_geometry {
            attrs.insert(GEOMETRY_ATTR.to_string(), PropValue::from(encode_line(&line)));
        }

        let mut ops = Vec::with_capacity(2);
        if self.opts.bidirectional {
            let mut reverse = attrs.clone();
            self.negate(&mut reverse);
            if self.opts.store_geometry {
                line.reverse();
                reverse.insert(GEOMETRY_ATTR.to_string(), PropValue::from(encode_line(&line)));
            }
            ops.push(WriteOp::Edge {
                u: u.clone(),
                v: v.clone(),
                attrs,
            });
            ops.push(WriteOp::Edge {
                u: v,
                v: u,
                attrs: reverse,
            });
        } else {
            ops.push(WriteOp::Edge { u, v, attrs });
        }
        Ok(ops)
    }

    fn negate(&self, attrs: &mut Attributes) {
        for key in &self.opts.reverse_negate {
            if let Some(value) = attrs.get_mut(key) {
                if let Some(negated) = value.negated() {
                    *value = negated;
                }
            }
        }
    }
}

fn is_system_attr(name: &str) -> bool {
    [LAYER_ATTR, GEOMETRY_ATTR]
        .iter()
        .any(|system| system.eq_ignore_ascii_case(name))
}

/// Whether `err` was caused by the content of the batch rather than by the store.
fn is_feature_fault(err: &GraphError) -> bool {
    match err {
        GraphError::Schema(_) | GraphError::Identity(_) | GraphError::InvalidArgument(_) => true,
        GraphError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => {
            failure.code == ErrorCode::ConstraintViolation
        }
        _ => false,
    }
}
