//! The single write path shared by direct mutation and the ingestion pipeline.
//!
//! A batch runs inside one `BEGIN IMMEDIATE` transaction: columns are evolved first, then
//! endpoint nodes are upserted, then edge rows are written. Any error rolls the whole batch
//! back and invalidates the in-process caches that may have observed the aborted writes.

use lru::LruCache;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::error::{GraphError, Result};
use crate::graph::GraphDb;
use crate::key::NodeKey;
use crate::store::schema::{quote_ident, Schema, TableSchema};
use crate::store::{self, DuplicateEdges, Table};
use crate::types::{Attributes, EdgeId};

/// One buffered write.
#[derive(Clone, Debug)]
pub(crate) enum WriteOp {
    /// Upsert a node and set the given attributes.
    Node { key: NodeKey, attrs: Attributes },
    /// Insert (or coalesce) an edge, creating missing endpoints.
    Edge {
        u: NodeKey,
        v: NodeKey,
        attrs: Attributes,
    },
    /// Overwrite attributes of an existing edge row.
    EdgeUpdate { id: EdgeId, attrs: Attributes },
}

/// What a committed batch changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Node rows that did not exist before the batch.
    pub nodes_created: u64,
    /// Edge rows inserted.
    pub edges_inserted: u64,
    /// Edge writes folded into an existing row under [`DuplicateEdges::Coalesce`].
    pub edges_merged: u64,
    /// Row id written by each edge operation, in operation order.
    pub edge_ids: Vec<EdgeId>,
    /// Columns created while applying the batch.
    pub columns_added: Vec<String>,
}

impl GraphDb {
    /// Inserts the node `key` if it is absent, then sets `attrs` on it.
    ///
    /// Returns `true` when the node row was created by this call. The coordinate columns are
    /// derived from the key and cannot be passed as attributes.
    pub fn add_node(&mut self, key: &NodeKey, attrs: Attributes) -> Result<bool> {
        let op = WriteOp::Node {
            key: key.clone(),
            attrs,
        };
        let outcome = self.write_batch(std::slice::from_ref(&op), 0)?;
        Ok(outcome.nodes_created > 0)
    }

    /// Writes an edge from `u` to `v`, creating either endpoint if it does not exist.
    ///
    /// With [`DuplicateEdges::Keep`] every call inserts a new row; with
    /// [`DuplicateEdges::Coalesce`] an existing `u -> v` edge is updated instead. Returns the
    /// row id written.
    pub fn add_edge(&mut self, u: &NodeKey, v: &NodeKey, attrs: Attributes) -> Result<EdgeId> {
        let op = WriteOp::Edge {
            u: u.clone(),
            v: v.clone(),
            attrs,
        };
        let outcome = self.write_batch(std::slice::from_ref(&op), 0)?;
        outcome
            .edge_ids
            .first()
            .copied()
            .ok_or_else(|| GraphError::EdgeNotFound(format!("{u} -> {v}")))
    }

    /// Overwrites the given attributes of edge `id`, adding columns as needed.
    pub fn update_edge(&mut self, id: EdgeId, attrs: Attributes) -> Result<()> {
        self.write_batch(&[WriteOp::EdgeUpdate { id, attrs }], 0)?;
        Ok(())
    }

    /// Overwrites attributes of several edges in one transaction.
    ///
    /// Either every update is applied or, when any edge id is unknown or a write fails,
    /// none is. Returns the number of edges updated.
    pub fn update_edges<I>(&mut self, updates: I) -> Result<usize>
    where
        I: IntoIterator<Item = (EdgeId, Attributes)>,
    {
        let ops: Vec<WriteOp> = updates
            .into_iter()
            .map(|(id, attrs)| WriteOp::EdgeUpdate { id, attrs })
            .collect();
        if ops.is_empty() {
            return Ok(0);
        }
        let outcome = self.write_batch(&ops, 0)?;
        Ok(outcome.edge_ids.len())
    }

    /// Adds a column to `table` for every key of `attrs` that does not have one yet.
    ///
    /// Column types are inferred from the values; null-valued keys are skipped. Returns the
    /// names of the columns created.
    pub fn ensure_columns(&mut self, table: Table, attrs: &Attributes) -> Result<Vec<String>> {
        self.ensure_writable()?;
        let result = self.evolve(table, attrs);
        if result.is_err() {
            self.invalidate_caches();
        }
        result
    }

    fn evolve(&mut self, table: Table, attrs: &Attributes) -> Result<Vec<String>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.schema.refresh_if_stale(&tx)?;
        let added = self.schema.ensure_columns(&tx, table, attrs)?;
        tx.commit()?;
        Ok(added)
    }

    /// Applies `ops` atomically and records the batch in the metadata table.
    ///
    /// `features` is the number of input features the batch represents, zero for direct
    /// mutation.
    pub(crate) fn write_batch(&mut self, ops: &[WriteOp], features: u64) -> Result<BatchOutcome> {
        self.ensure_writable()?;
        let result = self.apply_batch(ops, features);
        match &result {
            Ok(outcome) => debug!(
                ops = ops.len(),
                nodes_created = outcome.nodes_created,
                edges_inserted = outcome.edges_inserted,
                edges_merged = outcome.edges_merged,
                "graph.batch.committed"
            ),
            Err(err) => {
                warn!(ops = ops.len(), error = %err, "graph.batch.rolled_back");
                self.invalidate_caches();
            }
        }
        result
    }

    fn apply_batch(&mut self, ops: &[WriteOp], features: u64) -> Result<BatchOutcome> {
        let GraphDb {
            conn,
            schema,
            known_nodes,
            opts,
            ..
        } = self;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        schema.refresh_if_stale(&tx)?;
        let mut outcome = BatchOutcome::default();
        for op in ops {
            match op {
                WriteOp::Node { key, attrs } => {
                    outcome
                        .columns_added
                        .extend(schema.ensure_columns(&tx, Table::Nodes, attrs)?);
                    if insert_node(&tx, key)? {
                        outcome.nodes_created += 1;
                    }
                    remember(known_nodes, key);
                    let nodes = schema.table(Table::Nodes);
                    update_row(&tx, nodes, "_key", &key.as_str(), attrs)?;
                }
                WriteOp::Edge { u, v, attrs } => {
                    outcome
                        .columns_added
                        .extend(schema.ensure_columns(&tx, Table::Edges, attrs)?);
                    for endpoint in [u, v] {
                        if ensure_endpoint(&tx, known_nodes, endpoint)? {
                            outcome.nodes_created += 1;
                        }
                    }
                    let edges = schema.table(Table::Edges);
                    let existing = match opts.duplicate_edges {
                        DuplicateEdges::Keep => None,
                        DuplicateEdges::Coalesce => first_edge_between(&tx, u, v)?,
                    };
                    let id = match existing {
                        Some(id) => {
                            update_row(&tx, edges, "_id", &id, attrs)?;
                            outcome.edges_merged += 1;
                            id
                        }
                        None => {
                            let id = insert_edge(&tx, edges, u, v, attrs)?;
                            outcome.edges_inserted += 1;
                            id
                        }
                    };
                    outcome.edge_ids.push(id);
                }
                WriteOp::EdgeUpdate { id, attrs } => {
                    if !edge_exists(&tx, *id)? {
                        return Err(GraphError::EdgeNotFound(format!("id {id}")));
                    }
                    outcome
                        .columns_added
                        .extend(schema.ensure_columns(&tx, Table::Edges, attrs)?);
                    update_row(&tx, schema.table(Table::Edges), "_id", id, attrs)?;
                    outcome.edge_ids.push(*id);
                }
            }
        }
        store::record_batch(&tx, features)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn invalidate_caches(&mut self) {
        if let Some(cache) = self.known_nodes.as_mut() {
            cache.clear();
        }
        match Schema::load(&self.conn) {
            Ok(schema) => self.schema = schema,
            Err(err) => warn!(error = %err, "graph.schema.reload_failed"),
        }
    }
}

fn remember(cache: &mut Option<LruCache<String, ()>>, key: &NodeKey) {
    if let Some(cache) = cache.as_mut() {
        cache.put(key.as_str().to_string(), ());
    }
}

/// Upserts an edge endpoint unless the cache already saw it. Returns `true` if created.
fn ensure_endpoint(
    conn: &Connection,
    cache: &mut Option<LruCache<String, ()>>,
    key: &NodeKey,
) -> Result<bool> {
    if let Some(cache) = cache.as_mut() {
        if cache.get(key.as_str()).is_some() {
            return Ok(false);
        }
    }
    let created = insert_node(conn, key)?;
    remember(cache, key);
    Ok(created)
}

fn insert_node(conn: &Connection, key: &NodeKey) -> Result<bool> {
    let coord = key.coord();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO nodes (_key, _x, _y) VALUES (?1, ?2, ?3) ON CONFLICT (_key) DO NOTHING",
    )?;
    let changed = stmt.execute(params![key.as_str(), coord.x, coord.y])?;
    Ok(changed > 0)
}

fn first_edge_between(conn: &Connection, u: &NodeKey, v: &NodeKey) -> Result<Option<EdgeId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT _id FROM edges WHERE _u = ?1 AND _v = ?2 ORDER BY _id LIMIT 1",
    )?;
    Ok(stmt
        .query_row(params![u.as_str(), v.as_str()], |row| row.get(0))
        .optional()?)
}

fn edge_exists(conn: &Connection, id: EdgeId) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM edges WHERE _id = ?1")?;
    let found: Option<i64> = stmt.query_row([id], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

/// Attributes that map onto an existing column, paired with that column's stored name.
///
/// Null-valued keys with no column yet are dropped here; they stay out of the schema.
fn writable<'a>(
    schema: &'a TableSchema,
    attrs: &'a Attributes,
) -> impl Iterator<Item = (&'a str, &'a dyn ToSql)> {
    attrs.iter().filter_map(move |(key, value)| {
        schema
            .lookup(key)
            .map(|column| (column.name.as_str(), value as &dyn ToSql))
    })
}

fn insert_edge(
    conn: &Connection,
    schema: &TableSchema,
    u: &NodeKey,
    v: &NodeKey,
    attrs: &Attributes,
) -> Result<EdgeId> {
    let (u_key, v_key) = (u.as_str(), v.as_str());
    let mut columns = vec!["_u".to_string(), "_v".to_string()];
    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(attrs.len() + 2);
    values.push(&u_key);
    values.push(&v_key);
    for (name, value) in writable(schema, attrs) {
        columns.push(quote_ident(name));
        values.push(value);
    }
    let placeholders = (1..=values.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO edges ({}) VALUES ({placeholders})",
        columns.join(", ")
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(values.as_slice())?;
    Ok(conn.last_insert_rowid())
}

fn update_row(
    conn: &Connection,
    schema: &TableSchema,
    key_column: &str,
    key: &dyn ToSql,
    attrs: &Attributes,
) -> Result<()> {
    let mut assignments = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();
    for (name, value) in writable(schema, attrs) {
        values.push(value);
        assignments.push(format!("{} = ?{}", quote_ident(name), values.len()));
    }
    if assignments.is_empty() {
        return Ok(());
    }
    values.push(key);
    let sql = format!(
        "UPDATE {} SET {} WHERE {key_column} = ?{}",
        schema.table().name(),
        assignments.join(", "),
        values.len()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(values.as_slice())?;
    Ok(())
}
