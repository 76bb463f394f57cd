use rusqlite::params;

use crate::error::{GraphError, Result};
use crate::graph::GraphDb;
use crate::store::spatial::{self, decode_line, distance_to_line};
use crate::store::{self, BoundingBox};
use crate::types::{EdgeRecord, NodeRecord, GEOMETRY_ATTR};

impl GraphDb {
    /// Builds the R*Tree index over nodes and edges and keeps it current from then on.
    ///
    /// # Errors
    ///
    /// [`GraphError::Unsupported`] if SQLite was built without the R*Tree module.
    pub fn enable_spatial_index(&mut self) -> Result<()> {
        self.ensure_writable()?;
        spatial::enable(&mut self.conn)
    }

    /// Drops the spatial index. Core operations are unaffected.
    pub fn drop_spatial_index(&mut self) -> Result<()> {
        self.ensure_writable()?;
        spatial::disable(&mut self.conn)
    }

    /// Whether the spatial index is maintained.
    pub fn has_spatial_index(&self) -> Result<bool> {
        store::spatial_enabled(&self.conn)
    }

    /// Nodes whose point lies inside `bbox`, in row order.
    pub fn nodes_in_bbox(&self, bbox: &BoundingBox) -> Result<Vec<NodeRecord>> {
        let ids = self.rtree_hits("rtree_nodes", bbox)?;
        let mut nodes = self.nodes_by_ids(&ids)?;
        // R*Tree boxes are float32, rounded outward; recheck against the stored coordinates.
        nodes.retain(|node| {
            let c = node.key.coord();
            bbox.contains(c.x, c.y)
        });
        Ok(nodes)
    }

    /// Edges whose endpoint box intersects `bbox`, in row order.
    pub fn edges_in_bbox(&self, bbox: &BoundingBox) -> Result<Vec<EdgeRecord>> {
        let ids = self.rtree_hits("rtree_edges", bbox)?;
        let mut edges = self.edges_by_ids(&ids)?;
        edges.retain(|edge| bbox.intersects(&endpoint_box(edge)));
        Ok(edges)
    }

    /// Edges within `distance` of `(x, y)`, paired with that distance.
    ///
    /// Distances are planar, in store units, measured against the stored `_geometry` when
    /// the edge has one and against the straight segment between its endpoints otherwise.
    /// Candidates come from the endpoint boxes, so a line that bulges far outside the box
    /// spanned by its endpoints can be missed. With `sort` the result is ordered nearest
    /// first; otherwise it keeps row order.
    pub fn edges_dwithin(
        &self,
        x: f64,
        y: f64,
        distance: f64,
        sort: bool,
    ) -> Result<Vec<(EdgeRecord, f64)>> {
        if !distance.is_finite() || distance < 0.0 || !x.is_finite() || !y.is_finite() {
            return Err(GraphError::InvalidArgument(format!(
                "dwithin needs a finite point and a non-negative distance, got ({x}, {y}) and {distance}"
            )));
        }
        let candidates = self.edges_in_bbox(&BoundingBox::around(x, y, distance))?;
        let mut hits: Vec<(EdgeRecord, f64)> = candidates
            .into_iter()
            .filter_map(|edge| {
                let line = edge_line(&edge);
                let d = distance_to_line(x, y, &line);
                (d <= distance).then_some((edge, d))
            })
            .collect();
        if sort {
            hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)));
        }
        Ok(hits)
    }

    fn rtree_hits(&self, table: &str, bbox: &BoundingBox) -> Result<Vec<i64>> {
        spatial::require(&self.conn)?;
        let sql = format!(
            "SELECT id FROM {table}
              WHERE minx <= ?3 AND maxx >= ?1 AND miny <= ?4 AND maxy >= ?2
              ORDER BY id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y],
            |row| row.get(0),
        )?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }
}

fn endpoint_box(edge: &EdgeRecord) -> BoundingBox {
    let (a, b) = (edge.u.coord(), edge.v.coord());
    BoundingBox::new(a.x, a.y, b.x, b.y)
}

fn edge_line(edge: &EdgeRecord) -> Vec<(f64, f64)> {
    let stored = edge
        .get(GEOMETRY_ATTR)
        .and_then(|value| value.as_str())
        .and_then(decode_line);
    match stored {
        Some(line) if !line.is_empty() => line,
        _ => {
            let (a, b) = (edge.u.coord(), edge.v.coord());
            vec![(a.x, a.y), (b.x, b.y)]
        }
    }
}
