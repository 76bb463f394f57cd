use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::key::DEFAULT_PRECISION;

/// Page cache behaviour, declared when the store is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Keep up to this many pages in SQLite's page cache; everything else stays on disk.
    Pages(usize),
    /// Copy the whole file into an in-memory database at open time.
    ///
    /// Writes go to the in-memory copy only and are lost when the handle is dropped.
    InMemory,
}

/// SQLite `synchronous` setting applied to the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Synchronous {
    /// No fsync.
    Off,
    /// fsync at checkpoints only (safe with WAL).
    Normal,
    /// fsync on every commit.
    Full,
}

impl Synchronous {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            Synchronous::Off => "OFF",
            Synchronous::Normal => "NORMAL",
            Synchronous::Full => "FULL",
        }
    }
}

/// What `add_edge` does when an edge between the same ordered pair already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateEdges {
    /// Insert another row; the graph is a multigraph.
    #[default]
    Keep,
    /// Merge the new attributes into the lowest-id existing row.
    Coalesce,
}

/// Options used when creating or connecting to a store.
#[derive(Clone, Debug)]
pub struct OpenOptions {
    /// Decimal digits kept when deriving node keys. Only read by `create`; `connect` uses the
    /// precision recorded in the store.
    pub precision: u32,
    /// Page cache configuration.
    pub cache: CacheMode,
    /// Durability level.
    pub synchronous: Synchronous,
    /// How long a writer waits on another process's lock before giving up.
    pub busy_timeout: Duration,
    /// Parallel edge policy.
    pub duplicate_edges: DuplicateEdges,
    /// Capacity of the node existence cache used by the write path. Zero disables it.
    pub node_cache_entries: usize,
    /// Rows fetched per query by the lazy node and edge iterators.
    pub scan_page_size: usize,
    /// Build the spatial index when the store is created.
    pub spatial_index: bool,
    /// Open the file read-only. Every write through the handle fails with
    /// `GraphError::ReadOnly`; `create` rejects this option.
    pub read_only: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            cache: CacheMode::Pages(2_000),
            synchronous: Synchronous::Normal,
            busy_timeout: Duration::from_secs(5),
            duplicate_edges: DuplicateEdges::Keep,
            node_cache_entries: 65_536,
            scan_page_size: 512,
            spatial_index: false,
            read_only: false,
        }
    }
}

impl OpenOptions {
    /// Sets the coordinate precision.
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the cache mode.
    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the durability level.
    pub fn synchronous(mut self, synchronous: Synchronous) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Sets the lock wait timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the parallel edge policy.
    pub fn duplicate_edges(mut self, policy: DuplicateEdges) -> Self {
        self.duplicate_edges = policy;
        self
    }

    /// Sets the node existence cache capacity.
    pub fn node_cache_entries(mut self, entries: usize) -> Self {
        self.node_cache_entries = entries;
        self
    }

    /// Sets the iterator page size. Values below 1 are treated as 1.
    pub fn scan_page_size(mut self, rows: usize) -> Self {
        self.scan_page_size = rows.max(1);
        self
    }

    /// Builds the spatial index at create time.
    pub fn spatial_index(mut self, enabled: bool) -> Self {
        self.spatial_index = enabled;
        self
    }

    /// Opens the store read-only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
