use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::error::{GraphError, Result};
use crate::graph::nodes::limit_param;
use crate::graph::scan::{EdgeFilter, EdgeIter};
use crate::graph::GraphDb;
use crate::key::NodeKey;
use crate::store::schema::{quote_ident, TableSchema};
use crate::store::Table;
use crate::types::{Attributes, EdgeId, EdgeRecord, PropValue};

impl GraphDb {
    /// Lazy sequence of every edge in row order.
    pub fn edges(&self) -> EdgeIter<'_> {
        EdgeIter::new(self, EdgeFilter::All)
    }

    /// Lazy sequence of the edges leaving `u`, resolved through the `_u` index.
    ///
    /// Each item carries the successor (`edge.v`) and the edge attributes. A key with no
    /// outgoing edges, or no node at all, yields an empty sequence.
    pub fn successors(&self, u: &NodeKey) -> EdgeIter<'_> {
        EdgeIter::new(self, EdgeFilter::From(u.clone()))
    }

    /// Lazy sequence of the edges entering `v`, resolved through the `_v` index.
    pub fn predecessors(&self, v: &NodeKey) -> EdgeIter<'_> {
        EdgeIter::new(self, EdgeFilter::To(v.clone()))
    }

    /// Lazy sequence of every parallel edge from `u` to `v`.
    pub fn edges_between(&self, u: &NodeKey, v: &NodeKey) -> EdgeIter<'_> {
        EdgeIter::new(self, EdgeFilter::Between(u.clone(), v.clone()))
    }

    /// The edge with row id `id`.
    pub fn edge(&self, id: EdgeId) -> Result<EdgeRecord> {
        let schema = self.schema.table(Table::Edges);
        let sql = format!("SELECT {} FROM edges WHERE _id = ?1", schema.select_list());
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let mut rows = stmt.query([id])?;
        let edge = match rows.next()? {
            Some(row) => decode_edge(row, schema)?,
            None => return Err(GraphError::EdgeNotFound(format!("id {id}"))),
        };
        Ok(edge)
    }

    /// Whether at least one edge runs from `u` to `v`. Resolved through the `(_u, _v)` index.
    pub fn has_edge(&self, u: &NodeKey, v: &NodeKey) -> Result<bool> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT 1 FROM edges WHERE _u = ?1 AND _v = ?2 LIMIT 1")?;
        let found: Option<i64> = stmt
            .query_row(params![u.as_str(), v.as_str()], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of edge rows, parallel edges included.
    pub fn edge_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Sum of the `weight` attribute over all edges, counting edges without a value as 1.
    ///
    /// With no attribute, or one that has no column yet, this is the edge count. Non-numeric
    /// values contribute 0.
    pub fn size(&self, weight: Option<&str>) -> Result<f64> {
        let column = weight.and_then(|key| self.schema.table(Table::Edges).lookup(key));
        let Some(column) = column else {
            return Ok(self.edge_count()? as f64);
        };
        let sql = format!(
            "SELECT total(coalesce({}, 1)) FROM edges",
            quote_ident(&column.name)
        );
        Ok(self.conn().query_row(&sql, [], |row| row.get(0))?)
    }

    pub(crate) fn edge_page(
        &self,
        filter: &EdgeFilter,
        after: i64,
        limit: usize,
    ) -> Result<Vec<EdgeRecord>> {
        let schema = self.schema.table(Table::Edges);
        let mut args: Vec<Value> = vec![Value::Integer(after)];
        let condition = match filter {
            EdgeFilter::All => "",
            EdgeFilter::From(u) => {
                args.push(Value::Text(u.as_str().to_string()));
                "AND _u = ?2"
            }
            EdgeFilter::To(v) => {
                args.push(Value::Text(v.as_str().to_string()));
                "AND _v = ?2"
            }
            EdgeFilter::Between(u, v) => {
                args.push(Value::Text(u.as_str().to_string()));
                args.push(Value::Text(v.as_str().to_string()));
                "AND _u = ?2 AND _v = ?3"
            }
        };
        args.push(Value::Integer(limit_param(limit)));
        let sql = format!(
            "SELECT {} FROM edges WHERE _id > ?1 {condition} ORDER BY _id LIMIT ?{}",
            schema.select_list(),
            args.len()
        );
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut page = Vec::with_capacity(limit);
        while let Some(row) = rows.next()? {
            page.push(decode_edge(row, schema)?);
        }
        Ok(page)
    }

    pub(crate) fn edges_by_ids(&self, ids: &[i64]) -> Result<Vec<EdgeRecord>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.edge(*id) {
                Ok(edge) => out.push(edge),
                Err(GraphError::EdgeNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }
}

fn decode_edge(row: &Row<'_>, schema: &TableSchema) -> Result<EdgeRecord> {
    let id: i64 = row.get(schema.position("_id")?)?;
    let u: String = row.get(schema.position("_u")?)?;
    let v: String = row.get(schema.position("_v")?)?;
    let mut attrs = Attributes::new();
    for (idx, column) in schema.attribute_columns() {
        let value = PropValue::from_sql(row.get_ref(idx)?, column.ty)?;
        attrs.insert(column.name.clone(), value);
    }
    Ok(EdgeRecord {
        id,
        u: NodeKey::parse(&u)?,
        v: NodeKey::parse(&v)?,
        attrs,
    })
}
