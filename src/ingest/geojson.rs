//! Minimal GeoJSON reader.
//!
//! Only `LineString` geometries and flat properties are extracted. A document may be a
//! `FeatureCollection` or a single `Feature`; each feature is decoded on its own so one bad
//! entry does not spoil the rest of the file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::ingest::feature::{FeatureError, LineFeature};
use crate::key::Coord;
use crate::types::{Attributes, PropValue};

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Document {
    FeatureCollection { features: Vec<Value> },
    Feature(Map<String, Value>),
}

/// Features of one GeoJSON document, not yet decoded.
#[derive(Debug, Clone)]
pub struct GeoJsonLayer {
    name: Option<String>,
    features: Vec<Value>,
}

impl GeoJsonLayer {
    /// Reads the file at `path`. The layer is named after the file stem.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut layer = Self::from_reader(BufReader::new(file))?;
        layer.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Ok(layer)
    }

    /// Reads a document from `reader`. The layer is unnamed.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let document: Document = serde_json::from_reader(reader).map_err(|err| {
            if err.is_data() {
                GraphError::InvalidArgument(format!("not a GeoJSON Feature or FeatureCollection: {err}"))
            } else {
                GraphError::Json(err)
            }
        })?;
        let features = match document {
            Document::FeatureCollection { features } => features,
            Document::Feature(mut fields) => {
                fields.insert("type".into(), Value::String("Feature".into()));
                vec![Value::Object(fields)]
            }
        };
        Ok(Self {
            name: None,
            features,
        })
    }

    /// Layer name, usually the file stem.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of features in the document, decodable or not.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the document holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Decodes the features in document order.
    pub fn features(&self) -> impl Iterator<Item = std::result::Result<LineFeature, FeatureError>> + '_ {
        self.features.iter().map(parse_feature)
    }
}

/// Decodes one GeoJSON `Feature` object.
pub fn parse_feature(value: &Value) -> std::result::Result<LineFeature, FeatureError> {
    let object = value
        .as_object()
        .ok_or_else(|| FeatureError::Malformed("feature is not an object".into()))?;
    match object.get("type").and_then(Value::as_str) {
        Some("Feature") => {}
        other => {
            return Err(FeatureError::Malformed(format!(
                "expected type 'Feature', found {}",
                other.unwrap_or("nothing")
            )))
        }
    }
    let geometry = match object.get("geometry") {
        None | Some(Value::Null) => return Err(FeatureError::MissingGeometry),
        Some(geometry) => geometry,
    };
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| FeatureError::Malformed("geometry has no type".into()))?;
    if kind != "LineString" {
        return Err(FeatureError::UnsupportedGeometry(kind.to_string()));
    }
    let raw = geometry
        .get("coordinates")
        .and_then(Value::as_array)
        .ok_or_else(|| FeatureError::Malformed("LineString has no coordinate array".into()))?;
    let mut coordinates = Vec::with_capacity(raw.len());
    for (index, position) in raw.iter().enumerate() {
        coordinates.push(parse_position(position).ok_or(FeatureError::InvalidCoordinate { index })?);
    }
    let properties = match object.get("properties") {
        None | Some(Value::Null) => Attributes::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| (key.clone(), PropValue::from_json(value)))
            .collect(),
        Some(_) => return Err(FeatureError::Malformed("properties is not an object".into())),
    };
    let feature = LineFeature::new(coordinates, properties);
    feature.endpoints()?;
    Ok(feature)
}

/// `[x, y]` or `[x, y, z]`; any elevation is dropped.
fn parse_position(value: &Value) -> Option<Coord> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    let x = items[0].as_f64()?;
    let y = items[1].as_f64()?;
    Some(Coord::new(x, y))
}
