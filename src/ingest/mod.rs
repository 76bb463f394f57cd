//! Ingestion of line features.
//!
//! Each feature becomes one edge (two with `bidirectional`) between the nodes derived from
//! its first and last vertex. Writes are buffered and committed `batch_size` features at a
//! time through the same write path as [`crate::GraphDb::add_edge`].

mod feature;
mod geojson;
mod pipeline;

pub use feature::{FeatureError, FeatureFailure, LineFeature};
pub use geojson::{parse_feature, GeoJsonLayer};
pub use pipeline::{IngestOptions, IngestReport, Ingestor, DEFAULT_BATCH_SIZE};
