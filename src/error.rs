use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::EdgeId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the store, the graph adapter, and the algorithms.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Table or column layout does not match what the adapter expects.
    #[error("schema error: {0}")]
    Schema(String),
    /// A coordinate could not be turned into a node key.
    #[error("identity error: {0}")]
    Identity(String),
    /// `create` was called on a path that already holds a file.
    #[error("store already exists: {0}")]
    DuplicatePath(PathBuf),
    /// `connect` was called on a path with no store.
    #[error("store not found: {0}")]
    MissingStore(PathBuf),
    /// An edge visited during pathfinding has no usable weight value.
    #[error("edge {edge} has no usable '{key}' weight ({reason})")]
    WeightAttribute {
        /// Weight attribute requested by the caller.
        key: String,
        /// Row id of the offending edge.
        edge: EdgeId,
        /// Why the value could not be used.
        reason: &'static str,
    },
    /// Node key is not present in the store.
    #[error("node not found: {0}")]
    NodeNotFound(String),
    /// Edge is not present in the store.
    #[error("edge not found: {0}")]
    EdgeNotFound(String),
    /// Caller supplied an argument the operation cannot honour.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A write was attempted through a handle opened read-only.
    #[error("store is opened read-only: {0}")]
    ReadOnly(PathBuf),
    /// Optional capability is missing from this store.
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),
    /// Underlying SQLite failure.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON encoding or decoding error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    pub(crate) fn duplicate_path(path: impl AsRef<Path>) -> Self {
        GraphError::DuplicatePath(path.as_ref().to_path_buf())
    }

    pub(crate) fn missing_store(path: impl AsRef<Path>) -> Self {
        GraphError::MissingStore(path.as_ref().to_path_buf())
    }
}
