//! Line features and the ways a single feature can be rejected.

use thiserror::Error;

use crate::error::GraphError;
use crate::key::Coord;
use crate::types::Attributes;

/// One input line: an ordered coordinate list plus its property mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFeature {
    /// Vertices in drawing order. The first and last become the edge endpoints.
    pub coordinates: Vec<Coord>,
    /// Properties copied onto the edge.
    pub properties: Attributes,
}

impl LineFeature {
    /// Builds a feature from coordinates and properties.
    pub fn new(coordinates: Vec<Coord>, properties: Attributes) -> Self {
        Self {
            coordinates,
            properties,
        }
    }

    /// Checks the geometry and returns the two endpoints.
    pub fn endpoints(&self) -> Result<(Coord, Coord), FeatureError> {
        for (index, c) in self.coordinates.iter().enumerate() {
            if !c.x.is_finite() || !c.y.is_finite() {
                return Err(FeatureError::InvalidCoordinate { index });
            }
        }
        match self.coordinates.as_slice() {
            [first, .., last] => Ok((*first, *last)),
            other => Err(FeatureError::TooFewCoordinates(other.len())),
        }
    }

    /// Vertices as `(x, y)` pairs.
    pub fn line(&self) -> Vec<(f64, f64)> {
        self.coordinates.iter().map(|c| (c.x, c.y)).collect()
    }
}

/// Why a feature was skipped.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// The feature carries no geometry.
    #[error("feature has no geometry")]
    MissingGeometry,
    /// The geometry is not a `LineString`.
    #[error("geometry type '{0}' is not a LineString")]
    UnsupportedGeometry(String),
    /// Fewer than two vertices.
    #[error("line has {0} coordinate(s), at least 2 are required")]
    TooFewCoordinates(usize),
    /// A vertex is not a pair of finite numbers.
    #[error("coordinate {index} is not a pair of finite numbers")]
    InvalidCoordinate {
        /// Position of the offending vertex.
        index: usize,
    },
    /// The input could not be read as a feature at all.
    #[error("malformed feature: {0}")]
    Malformed(String),
    /// The graph rejected the feature's node keys or properties.
    #[error(transparent)]
    Rejected(#[from] GraphError),
}

/// A skipped feature, as recorded in the ingestion report.
#[derive(Debug)]
pub struct FeatureFailure {
    /// Zero-based position of the feature in the ingestion run.
    pub index: u64,
    /// Layer the feature came from, if known.
    pub layer: Option<String>,
    /// What was wrong with it.
    pub error: FeatureError,
}

impl std::fmt::Display for FeatureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.layer {
            Some(layer) => write!(f, "{layer} feature #{}: {}", self.index, self.error),
            None => write!(f, "feature #{}: {}", self.index, self.error),
        }
    }
}
