#![forbid(unsafe_code)]

//! Graph adapter over a store file.
//!
//! [`GraphDb`] is the handle every operation goes through. Reads take `&self` and issue
//! fresh queries each time; writes take `&mut self` and run inside one SQLite transaction
//! per call (or per ingestion batch).

mod access;
mod edges;
mod nodes;
mod scan;
mod spatial;
pub(crate) mod write;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use rusqlite::Connection;

use crate::error::{GraphError, Result};
use crate::key::{Coord, NodeKey};
use crate::store::schema::Schema;
use crate::store::{self, OpenOptions, StoreMetadata, Table};

pub use scan::{EdgeIter, NodeIter};
pub use write::BatchOutcome;

/// Handle to one graph store.
///
/// Dropping the handle closes the underlying connection.
pub struct GraphDb {
    conn: Connection,
    path: PathBuf,
    opts: OpenOptions,
    precision: u32,
    schema: Schema,
    known_nodes: Option<LruCache<String, ()>>,
}

impl std::fmt::Debug for GraphDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDb")
            .field("path", &self.path)
            .field("precision", &self.precision)
            .field("cache", &self.opts.cache)
            .finish_non_exhaustive()
    }
}

impl GraphDb {
    /// Creates a new store at `path` with default options.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicatePath`] if anything already exists at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_options(path, OpenOptions::default())
    }

    /// Creates a new store at `path`.
    pub fn create_with_options(path: impl AsRef<Path>, opts: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let conn = store::create_store(path, &opts)?;
        Self::from_connection(conn, path, opts)
    }

    /// Opens the existing store at `path` with default options.
    ///
    /// # Errors
    ///
    /// [`GraphError::MissingStore`] if there is no file at `path`, or
    /// [`GraphError::Schema`] if the file is not a graph store.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_options(path, OpenOptions::default())
    }

    /// Opens the existing store at `path`.
    pub fn connect_with_options(path: impl AsRef<Path>, opts: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let conn = store::connect_store(path, &opts)?;
        Self::from_connection(conn, path, opts)
    }

    fn from_connection(conn: Connection, path: &Path, opts: OpenOptions) -> Result<Self> {
        let meta = store::read_meta(&conn)?;
        let schema = Schema::load(&conn)?;
        let known_nodes = NonZeroUsize::new(opts.node_cache_entries).map(LruCache::new);
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            precision: meta.precision,
            opts,
            schema,
            known_nodes,
        })
    }

    /// Closes the connection, reporting any error SQLite raises while doing so.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| GraphError::Sqlite(err))
    }

    /// Path the handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options the handle was opened with.
    pub fn options(&self) -> &OpenOptions {
        &self.opts
    }

    /// Coordinate precision recorded in the store.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Derives the node key of `(x, y)` at the store's precision.
    pub fn key(&self, x: f64, y: f64) -> Result<NodeKey> {
        NodeKey::from_coord(Coord::new(x, y), self.precision)
    }

    /// Reads the metadata table.
    pub fn metadata(&self) -> Result<StoreMetadata> {
        store::read_meta(&self.conn)
    }

    /// Current schema version; bumped every time a column is added.
    pub fn schema_version(&self) -> Result<u64> {
        Ok(self.metadata()?.schema_version)
    }

    /// Attribute column names of the edge table, in creation order.
    pub fn edge_columns(&self) -> Vec<String> {
        self.schema.table(Table::Edges).attribute_names()
    }

    /// Attribute column names of the node table, in creation order (coordinates first).
    pub fn node_columns(&self) -> Vec<String> {
        self.schema.table(Table::Nodes).attribute_names()
    }

    /// Reloads the cached table definitions, picking up columns added by other processes.
    pub fn refresh_schema(&mut self) -> Result<()> {
        self.schema = Schema::load(&self.conn)?;
        Ok(())
    }

    /// Whether the handle was opened with [`OpenOptions::read_only`].
    pub fn is_read_only(&self) -> bool {
        self.opts.read_only
    }

    /// Refreshes the query planner statistics.
    pub fn optimize(&self) -> Result<()> {
        self.ensure_writable()?;
        self.conn.execute_batch("ANALYZE")?;
        Ok(())
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.opts.read_only {
            return Err(GraphError::ReadOnly(self.path.clone()));
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn scan_page_size(&self) -> usize {
        self.opts.scan_page_size.max(1)
    }
}
