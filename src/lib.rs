//! Directed graphs built from geospatial line features, persisted in a single SQLite file.
//!
//! Every line becomes an edge between the nodes at its first and last vertex; node identity
//! is the coordinate pair rounded to a fixed precision. The store can be queried lazily
//! through [`GraphDb`] and searched with the algorithms in [`algo`] without loading the
//! graph into memory.
//!
//! ```no_run
//! use linegraph::{GraphDb, Attributes, PropValue};
//!
//! # fn main() -> linegraph::Result<()> {
//! let mut db = GraphDb::create("streets.db")?;
//! let a = db.key(-122.3321, 47.6062)?;
//! let b = db.key(-122.3301, 47.6080)?;
//! let mut attrs = Attributes::new();
//! attrs.insert("length".into(), PropValue::Real(240.0));
//! db.add_edge(&a, &b, attrs)?;
//! let outcome = db.shortest_path(&a, &b, "length")?;
//! assert!(outcome.is_found());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algo;
pub mod cli;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod key;
pub mod store;
pub mod types;

pub use algo::{Dijkstra, GraphAccess, PathEngine, PathOutcome, Weight, WeightedPath};
pub use error::{GraphError, Result};
pub use graph::{BatchOutcome, EdgeIter, GraphDb, NodeIter};
pub use ingest::{IngestOptions, IngestReport, Ingestor, LineFeature};
pub use key::{Coord, NodeKey};
pub use store::{BoundingBox, CacheMode, DuplicateEdges, OpenOptions, StoreMetadata, Table};
pub use types::{Attributes, EdgeId, EdgeRecord, NodeRecord, PropValue};
