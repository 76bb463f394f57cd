//! Attribute values and the records handed out by the graph adapter.

use std::collections::BTreeMap;

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde_json::Value as JsonValue;

use crate::error::{GraphError, Result};
use crate::key::NodeKey;

/// Edge attribute holding the name of the layer a feature was read from.
pub const LAYER_ATTR: &str = "_layer";

/// Edge attribute holding the full line geometry as GeoJSON `LineString` text.
pub const GEOMETRY_ATTR: &str = "_geometry";

/// Row identifier of an edge. Parallel edges between the same pair differ only by this id.
pub type EdgeId = i64;

/// Attribute mapping of a node or an edge.
///
/// A key mapped to [`PropValue::Null`] is a column the row has no value for; a key that is
/// missing entirely is not part of the table schema.
pub type Attributes = BTreeMap<String, PropValue>;

/// Tagged attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Explicit absence of a value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integral number.
    Int(i64),
    /// Floating point number.
    Real(f64),
    /// Text value.
    Text(String),
}

impl PropValue {
    /// Returns `true` for [`PropValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Int(i) => Some(*i as f64),
            PropValue::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Storage type a new column gets when this is the first value seen for it.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            PropValue::Null => None,
            PropValue::Bool(_) => Some(ColumnType::Boolean),
            PropValue::Int(_) => Some(ColumnType::Integer),
            PropValue::Real(_) => Some(ColumnType::Real),
            PropValue::Text(_) => Some(ColumnType::Text),
        }
    }

    /// Arithmetic negation for numbers; `None` for everything else.
    pub fn negated(&self) -> Option<PropValue> {
        match self {
            PropValue::Int(i) => i.checked_neg().map(PropValue::Int),
            PropValue::Real(f) => Some(PropValue::Real(-f)),
            _ => None,
        }
    }

    /// Converts a JSON value. Arrays and objects are flattened into their JSON text.
    pub fn from_json(value: &JsonValue) -> PropValue {
        match value {
            JsonValue::Null => PropValue::Null,
            JsonValue::Bool(b) => PropValue::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => PropValue::Int(i),
                None => n.as_f64().map(PropValue::Real).unwrap_or(PropValue::Null),
            },
            JsonValue::String(s) => PropValue::Text(s.clone()),
            other => PropValue::Text(other.to_string()),
        }
    }

    /// JSON rendering of the value. Non-finite reals become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            PropValue::Null => JsonValue::Null,
            PropValue::Bool(b) => JsonValue::Bool(*b),
            PropValue::Int(i) => JsonValue::from(*i),
            PropValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            PropValue::Text(s) => JsonValue::String(s.clone()),
        }
    }

    pub(crate) fn from_sql(value: ValueRef<'_>, declared: Option<ColumnType>) -> Result<PropValue> {
        Ok(match value {
            ValueRef::Null => PropValue::Null,
            ValueRef::Integer(i) if declared == Some(ColumnType::Boolean) => PropValue::Bool(i != 0),
            ValueRef::Integer(i) => PropValue::Int(i),
            ValueRef::Real(f) => PropValue::Real(f),
            ValueRef::Text(bytes) => PropValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(_) => {
                return Err(GraphError::Schema(
                    "blob values are not supported as attributes".into(),
                ))
            }
        })
    }
}

impl ToSql for PropValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            PropValue::Null => ToSqlOutput::Owned(Value::Null),
            PropValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            PropValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            PropValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            PropValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Real(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

/// Storage type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `TEXT`
    Text,
    /// `INTEGER`
    Integer,
    /// `REAL`
    Real,
    /// `BOOLEAN`, stored as 0/1.
    Boolean,
}

impl ColumnType {
    /// Declared SQL type used in `ALTER TABLE ... ADD COLUMN`.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    /// Maps a declared column type back. Unknown declarations yield `None`.
    pub fn from_declared(declared: &str) -> Option<ColumnType> {
        match declared.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Some(ColumnType::Text),
            "INTEGER" => Some(ColumnType::Integer),
            "REAL" => Some(ColumnType::Real),
            "BOOLEAN" => Some(ColumnType::Boolean),
            _ => None,
        }
    }
}

/// A node row: its key plus every attribute column, coordinates included.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Canonical node key.
    pub key: NodeKey,
    /// Attributes, including the `_x` and `_y` coordinate columns.
    pub attrs: Attributes,
}

/// An edge row.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    /// Row id.
    pub id: EdgeId,
    /// Source node.
    pub u: NodeKey,
    /// Target node.
    pub v: NodeKey,
    /// Attributes; columns this row has no value for map to [`PropValue::Null`].
    pub attrs: Attributes,
}

impl EdgeRecord {
    /// Looks up one attribute, treating explicit nulls as absent.
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.attrs.get(key).filter(|value| !value.is_null())
    }
}
