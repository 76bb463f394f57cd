//! Node identity derived from rounded coordinates.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{GraphError, Result};

/// Default number of decimal digits kept when rounding coordinates.
pub const DEFAULT_PRECISION: u32 = 7;
/// Largest precision accepted. Beyond this, `f64` scaling stops being exact for lon/lat ranges.
pub const MAX_PRECISION: u32 = 12;

/// A raw coordinate pair as read from an input geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    /// Horizontal component (longitude).
    pub x: f64,
    /// Vertical component (latitude).
    pub y: f64,
}

impl Coord {
    /// Creates a coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Coord {
    fn from(value: [f64; 2]) -> Self {
        Coord::new(value[0], value[1])
    }
}

/// Rounds `value` to `precision` decimal digits. Negative zero collapses to zero.
pub fn round_coord(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub(crate) fn check_precision(precision: u32) -> Result<u32> {
    if precision > MAX_PRECISION {
        return Err(GraphError::InvalidArgument(format!(
            "precision {precision} exceeds maximum of {MAX_PRECISION}"
        )));
    }
    Ok(precision)
}

/// Canonical identifier of a graph vertex.
///
/// The text form is `"{x}, {y}"` of the rounded coordinates. Equality, ordering and hashing
/// only look at that text.
#[derive(Debug, Clone)]
pub struct NodeKey {
    text: String,
    x: f64,
    y: f64,
}

impl NodeKey {
    /// Derives the key of a coordinate at the given precision.
    ///
    /// # Errors
    ///
    /// [`GraphError::Identity`] when a component is not finite before or after rounding, or
    /// [`GraphError::InvalidArgument`] when `precision` is out of range.
    pub fn from_coord(coord: Coord, precision: u32) -> Result<NodeKey> {
        check_precision(precision)?;
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(GraphError::Identity(format!(
                "coordinate ({}, {}) is not finite",
                coord.x, coord.y
            )));
        }
        let x = round_coord(coord.x, precision);
        let y = round_coord(coord.y, precision);
        if !x.is_finite() || !y.is_finite() {
            return Err(GraphError::Identity(format!(
                "coordinate ({}, {}) overflows at precision {precision}",
                coord.x, coord.y
            )));
        }
        Ok(NodeKey::from_rounded(x, y))
    }

    /// Parses a stored key. The result is re-rendered, so `"1.50, 2"` becomes `"1.5, 2"`.
    pub fn parse(text: &str) -> Result<NodeKey> {
        let invalid = || GraphError::Identity(format!("malformed node key '{text}'"));
        let (x, y) = text.split_once(',').ok_or_else(invalid)?;
        let x: f64 = x.trim().parse().map_err(|_| invalid())?;
        let y: f64 = y.trim().parse().map_err(|_| invalid())?;
        if !x.is_finite() || !y.is_finite() {
            return Err(invalid());
        }
        Ok(NodeKey::from_rounded(x, y))
    }

    fn from_rounded(x: f64, y: f64) -> NodeKey {
        NodeKey {
            text: format!("{x}, {y}"),
            x,
            y,
        }
    }

    /// Key text as stored in the `_key` column.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Rounded coordinate pair.
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

impl PartialEq for NodeKey {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for NodeKey {}

impl Hash for NodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for NodeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
