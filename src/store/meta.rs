//! Key/value metadata kept in the `graph_meta` table.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{GraphError, Result};

pub(crate) const META_TABLE: &str = "graph_meta";
pub(crate) const FORMAT_VERSION: u64 = 1;

const KEY_FORMAT_VERSION: &str = "format_version";
const KEY_SCHEMA_VERSION: &str = "schema_version";
const KEY_PRECISION: &str = "precision";
const KEY_BATCHES: &str = "batches_committed";
const KEY_FEATURES: &str = "features_ingested";
const KEY_SPATIAL: &str = "spatial_index";

/// Snapshot of the store's metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreMetadata {
    /// Layout version written by `create`.
    pub format_version: u64,
    /// Incremented every time a column is added to either table.
    pub schema_version: u64,
    /// Coordinate precision used for node keys.
    pub precision: u32,
    /// Write batches committed over the store's lifetime.
    pub batches_committed: u64,
    /// Features ingested over the store's lifetime.
    pub features_ingested: u64,
    /// Whether the spatial index is maintained.
    pub spatial_index: bool,
}

pub(crate) fn init(conn: &Connection, precision: u32) -> Result<()> {
    let entries: [(&str, u64); 6] = [
        (KEY_FORMAT_VERSION, FORMAT_VERSION),
        (KEY_SCHEMA_VERSION, 0),
        (KEY_PRECISION, u64::from(precision)),
        (KEY_BATCHES, 0),
        (KEY_FEATURES, 0),
        (KEY_SPATIAL, 0),
    ];
    let mut stmt = conn.prepare("INSERT INTO graph_meta (key, value) VALUES (?1, ?2)")?;
    for (key, value) in entries {
        stmt.execute(params![key, value.to_string()])?;
    }
    Ok(())
}

fn get_u64(conn: &Connection, key: &str) -> Result<u64> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM graph_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    let raw = raw.ok_or_else(|| GraphError::Schema(format!("metadata key '{key}' is missing")))?;
    raw.parse()
        .map_err(|_| GraphError::Schema(format!("metadata key '{key}' holds '{raw}'")))
}

fn set_u64(conn: &Connection, key: &str, value: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO graph_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        params![key, value.to_string()],
    )?;
    Ok(())
}

fn add_u64(conn: &Connection, key: &str, delta: u64) -> Result<u64> {
    let next = get_u64(conn, key)?.saturating_add(delta);
    set_u64(conn, key, next)?;
    Ok(next)
}

pub(crate) fn has_meta_table(conn: &Connection) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [META_TABLE],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn read(conn: &Connection) -> Result<StoreMetadata> {
    let precision = get_u64(conn, KEY_PRECISION)?;
    let precision = u32::try_from(precision)
        .map_err(|_| GraphError::Schema(format!("stored precision {precision} is out of range")))?;
    Ok(StoreMetadata {
        format_version: get_u64(conn, KEY_FORMAT_VERSION)?,
        schema_version: get_u64(conn, KEY_SCHEMA_VERSION)?,
        precision,
        batches_committed: get_u64(conn, KEY_BATCHES)?,
        features_ingested: get_u64(conn, KEY_FEATURES)?,
        spatial_index: get_u64(conn, KEY_SPATIAL)? != 0,
    })
}

pub(crate) fn bump_schema_version(conn: &Connection) -> Result<u64> {
    add_u64(conn, KEY_SCHEMA_VERSION, 1)
}

pub(crate) fn record_batch(conn: &Connection, features: u64) -> Result<()> {
    add_u64(conn, KEY_BATCHES, 1)?;
    if features > 0 {
        add_u64(conn, KEY_FEATURES, features)?;
    }
    Ok(())
}

pub(crate) fn spatial_enabled(conn: &Connection) -> Result<bool> {
    Ok(get_u64(conn, KEY_SPATIAL)? != 0)
}

pub(crate) fn set_spatial(conn: &Connection, enabled: bool) -> Result<()> {
    set_u64(conn, KEY_SPATIAL, u64::from(enabled))
}
