use rusqlite::{params, OptionalExtension, Row};

use crate::error::{GraphError, Result};
use crate::graph::scan::NodeIter;
use crate::graph::GraphDb;
use crate::key::NodeKey;
use crate::store::schema::TableSchema;
use crate::store::Table;
use crate::types::{Attributes, NodeRecord, PropValue};

impl GraphDb {
    /// Lazy sequence of every node in row order.
    ///
    /// Each call starts a new scan; iterators never share cursor state.
    pub fn nodes(&self) -> NodeIter<'_> {
        NodeIter::new(self)
    }

    /// Attributes of the node with `key`.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] if the key is not in the store.
    pub fn node(&self, key: &NodeKey) -> Result<NodeRecord> {
        let schema = self.schema.table(Table::Nodes);
        let sql = format!(
            "SELECT {} FROM nodes WHERE _key = ?1",
            schema.select_list()
        );
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let mut rows = stmt.query([key.as_str()])?;
        let node = match rows.next()? {
            Some(row) => decode_node(row, schema)?.1,
            None => return Err(GraphError::NodeNotFound(key.to_string())),
        };
        Ok(node)
    }

    /// Whether a node with `key` exists. Resolved through the unique index on `_key`.
    pub fn has_node(&self, key: &NodeKey) -> Result<bool> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT 1 FROM nodes WHERE _key = ?1")?;
        let found: Option<i64> = stmt
            .query_row([key.as_str()], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of node rows.
    pub fn node_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub(crate) fn node_page(&self, after: i64, limit: usize) -> Result<Vec<(i64, NodeRecord)>> {
        let schema = self.schema.table(Table::Nodes);
        let sql = format!(
            "SELECT {} FROM nodes WHERE _id > ?1 ORDER BY _id LIMIT ?2",
            schema.select_list()
        );
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let mut rows = stmt.query(params![after, limit_param(limit)])?;
        let mut page = Vec::with_capacity(limit);
        while let Some(row) = rows.next()? {
            page.push(decode_node(row, schema)?);
        }
        Ok(page)
    }

    pub(crate) fn nodes_by_ids(&self, ids: &[i64]) -> Result<Vec<NodeRecord>> {
        let schema = self.schema.table(Table::Nodes);
        let sql = format!("SELECT {} FROM nodes WHERE _id = ?1", schema.select_list());
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let mut rows = stmt.query([id])?;
            if let Some(row) = rows.next()? {
                out.push(decode_node(row, schema)?.1);
            }
        }
        Ok(out)
    }
}

pub(crate) fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn decode_node(row: &Row<'_>, schema: &TableSchema) -> Result<(i64, NodeRecord)> {
    let id: i64 = row.get(schema.position("_id")?)?;
    let key: String = row.get(schema.position("_key")?)?;
    let mut attrs = Attributes::new();
    for (idx, column) in schema.attribute_columns() {
        let value = PropValue::from_sql(row.get_ref(idx)?, column.ty)?;
        attrs.insert(column.name.clone(), value);
    }
    Ok((
        id,
        NodeRecord {
            key: NodeKey::parse(&key)?,
            attrs,
        },
    ))
}
