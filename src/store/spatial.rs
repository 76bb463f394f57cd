//! Optional R*Tree index over node points and edge bounding boxes.
//!
//! The index is maintained by triggers, so writers do not need to know whether it exists.
//! Edge boxes cover the two endpoint nodes only, not intermediate vertices of the line.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{GraphError, Result};
use crate::store::meta;

const CREATE_INDEX: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS rtree_nodes USING rtree(id, minx, maxx, miny, maxy);
CREATE VIRTUAL TABLE IF NOT EXISTS rtree_edges USING rtree(id, minx, maxx, miny, maxy);

INSERT OR REPLACE INTO rtree_nodes
    SELECT _id, _x, _x, _y, _y FROM nodes;
INSERT OR REPLACE INTO rtree_edges
    SELECT e._id, min(a._x, b._x), max(a._x, b._x), min(a._y, b._y), max(a._y, b._y)
      FROM edges e
      JOIN nodes a ON a._key = e._u
      JOIN nodes b ON b._key = e._v;

CREATE TRIGGER IF NOT EXISTS rtree_nodes_insert AFTER INSERT ON nodes BEGIN
    INSERT OR REPLACE INTO rtree_nodes VALUES (NEW._id, NEW._x, NEW._x, NEW._y, NEW._y);
END;
CREATE TRIGGER IF NOT EXISTS rtree_nodes_delete AFTER DELETE ON nodes BEGIN
    DELETE FROM rtree_nodes WHERE id = OLD._id;
END;
CREATE TRIGGER IF NOT EXISTS rtree_edges_insert AFTER INSERT ON edges BEGIN
    INSERT OR REPLACE INTO rtree_edges
        SELECT NEW._id, min(a._x, b._x), max(a._x, b._x), min(a._y, b._y), max(a._y, b._y)
          FROM nodes a, nodes b
         WHERE a._key = NEW._u AND b._key = NEW._v;
END;
CREATE TRIGGER IF NOT EXISTS rtree_edges_delete AFTER DELETE ON edges BEGIN
    DELETE FROM rtree_edges WHERE id = OLD._id;
END;
";

const DROP_INDEX: &str = "
DROP TRIGGER IF EXISTS rtree_nodes_insert;
DROP TRIGGER IF EXISTS rtree_nodes_delete;
DROP TRIGGER IF EXISTS rtree_edges_insert;
DROP TRIGGER IF EXISTS rtree_edges_delete;
DROP TABLE IF EXISTS rtree_nodes;
DROP TABLE IF EXISTS rtree_edges;
";

/// Axis-aligned bounding box in store coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Smallest x.
    pub min_x: f64,
    /// Smallest y.
    pub min_y: f64,
    /// Largest x.
    pub max_x: f64,
    /// Largest y.
    pub max_y: f64,
}

impl BoundingBox {
    /// Builds a box from two corners in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Square of half-width `radius` centred on `(x, y)`.
    pub fn around(x: f64, y: f64, radius: f64) -> Self {
        Self::new(x - radius, y - radius, x + radius, y + radius)
    }

    /// Whether the point lies inside or on the border.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Whether two boxes touch or overlap.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// Builds the index and its triggers. Idempotent.
pub(crate) fn enable(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    if let Err(err) = tx.execute_batch(CREATE_INDEX) {
        if err.to_string().contains("no such module") {
            warn!(error = %err, "store.spatial.unavailable");
            return Err(GraphError::Unsupported(
                "spatial index (SQLite was built without R*Tree)",
            ));
        }
        return Err(err.into());
    }
    meta::set_spatial(&tx, true)?;
    tx.commit()?;
    info!("store.spatial.enabled");
    Ok(())
}

/// Removes the index and its triggers. Idempotent.
pub(crate) fn disable(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(DROP_INDEX)?;
    meta::set_spatial(&tx, false)?;
    tx.commit()?;
    info!("store.spatial.dropped");
    Ok(())
}

/// Fails with [`GraphError::Unsupported`] unless the index is maintained.
pub(crate) fn require(conn: &Connection) -> Result<()> {
    if meta::spatial_enabled(conn)? {
        Ok(())
    } else {
        Err(GraphError::Unsupported("spatial index is not enabled"))
    }
}

/// Renders a polyline as GeoJSON `LineString` text.
pub(crate) fn encode_line(line: &[(f64, f64)]) -> String {
    let coordinates: Vec<[f64; 2]> = line.iter().map(|(x, y)| [*x, *y]).collect();
    serde_json::json!({ "type": "LineString", "coordinates": coordinates }).to_string()
}

/// Parses text written by [`encode_line`]. Anything else yields `None`.
pub(crate) fn decode_line(text: &str) -> Option<Vec<(f64, f64)>> {
    #[derive(serde::Deserialize)]
    struct LineString {
        #[serde(rename = "type")]
        kind: String,
        coordinates: Vec<[f64; 2]>,
    }
    let parsed: LineString = serde_json::from_str(text).ok()?;
    if parsed.kind != "LineString" {
        return None;
    }
    Some(parsed.coordinates.into_iter().map(|[x, y]| (x, y)).collect())
}

/// Planar distance from a point to the polyline `line`.
pub(crate) fn distance_to_line(x: f64, y: f64, line: &[(f64, f64)]) -> f64 {
    match line {
        [] => f64::INFINITY,
        [(px, py)] => (x - px).hypot(y - py),
        _ => line
            .windows(2)
            .map(|w| distance_to_segment(x, y, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn distance_to_segment(x: f64, y: f64, a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (x - a.0).hypot(y - a.1);
    }
    let t = (((x - a.0) * dx + (y - a.1) * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (x - cx).hypot(y - cy)
}
