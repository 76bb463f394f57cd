#![forbid(unsafe_code)]

//! Store lifecycle and schema management.
//!
//! A store is a single SQLite file with a `nodes` table, an `edges` table and a
//! `graph_meta` table. Creating and connecting are separate entry points so that a
//! mistyped path never silently produces a fresh, empty graph.

mod meta;
mod options;
pub(crate) mod schema;
pub(crate) mod spatial;

use std::fs;
use std::path::Path;

use rusqlite::{Connection, DatabaseName, OpenFlags};
use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::key::check_precision;

pub use meta::StoreMetadata;
pub(crate) use meta::{has_meta_table, read as read_meta, record_batch, spatial_enabled, FORMAT_VERSION};
pub use options::{CacheMode, DuplicateEdges, OpenOptions, Synchronous};
pub use schema::Table;
pub use spatial::BoundingBox;

const LAYOUT: &str = "
CREATE TABLE nodes (
    _id INTEGER PRIMARY KEY,
    _key TEXT NOT NULL UNIQUE,
    _x REAL NOT NULL,
    _y REAL NOT NULL
);
CREATE TABLE edges (
    _id INTEGER PRIMARY KEY,
    _u TEXT NOT NULL REFERENCES nodes (_key),
    _v TEXT NOT NULL REFERENCES nodes (_key)
);
CREATE INDEX edges_u ON edges (_u);
CREATE INDEX edges_v ON edges (_v);
CREATE INDEX edges_uv ON edges (_u, _v);
CREATE TABLE graph_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

pub(crate) fn apply_layout(conn: &Connection) -> Result<()> {
    conn.execute_batch(LAYOUT)?;
    Ok(())
}

/// Initializes a new store file at `path` and returns an open connection to it.
pub(crate) fn create_store(path: &Path, opts: &OpenOptions) -> Result<Connection> {
    check_precision(opts.precision)?;
    if opts.read_only {
        return Err(GraphError::InvalidArgument(
            "a store cannot be created read-only".into(),
        ));
    }
    if path.exists() {
        return Err(GraphError::duplicate_path(path));
    }
    ensure_parent_dir(path)?;
    let mut conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    configure(&conn, opts, true)?;
    let tx = conn.transaction()?;
    apply_layout(&tx)?;
    meta::init(&tx, opts.precision)?;
    tx.commit()?;
    if opts.spatial_index {
        spatial::enable(&mut conn)?;
    }
    info!(
        path = %path.display(),
        precision = opts.precision,
        spatial_index = opts.spatial_index,
        "store.created"
    );
    finish_open(conn, path, opts)
}

/// Opens the store at `path`, which must already exist.
pub(crate) fn connect_store(path: &Path, opts: &OpenOptions) -> Result<Connection> {
    if !path.is_file() {
        return Err(GraphError::missing_store(path));
    }
    let access = if opts.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let conn = Connection::open_with_flags(path, access | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
    conn.busy_timeout(opts.busy_timeout)?;
    // Nothing persistent may be changed before the file is known to be a store.
    verify_layout(&conn, path)?;
    configure(&conn, opts, !opts.read_only)?;
    debug!(path = %path.display(), read_only = opts.read_only, "store.connected");
    finish_open(conn, path, opts)
}

fn verify_layout(conn: &Connection, path: &Path) -> Result<()> {
    if !has_meta_table(conn)? {
        return Err(GraphError::Schema(format!(
            "{} is not a graph store (no graph_meta table)",
            path.display()
        )));
    }
    let meta = read_meta(conn)?;
    if meta.format_version != FORMAT_VERSION {
        return Err(GraphError::Schema(format!(
            "store format version {} is not supported (expected {FORMAT_VERSION})",
            meta.format_version
        )));
    }
    Ok(())
}

fn finish_open(conn: Connection, path: &Path, opts: &OpenOptions) -> Result<Connection> {
    match opts.cache {
        CacheMode::Pages(_) => Ok(conn),
        CacheMode::InMemory => {
            drop(conn);
            let mut memory = Connection::open_in_memory()?;
            memory.restore(DatabaseName::Main, path, None::<fn(rusqlite::backup::Progress)>)?;
            configure(&memory, opts, false)?;
            info!(path = %path.display(), "store.loaded_in_memory");
            Ok(memory)
        }
    }
}

fn configure(conn: &Connection, opts: &OpenOptions, set_journal: bool) -> Result<()> {
    conn.busy_timeout(opts.busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    if set_journal {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "store.journal_mode");
    }
    conn.pragma_update(None, "synchronous", opts.synchronous.pragma_value())?;
    if let CacheMode::Pages(pages) = opts.cache {
        let pages = i64::try_from(pages).unwrap_or(i64::MAX);
        conn.pragma_update(None, "cache_size", pages)?;
    }
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
