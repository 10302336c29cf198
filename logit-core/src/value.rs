use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Attribute value attached to spans and events.
///
/// Closed union of the JSON-representable scalar, array, and map shapes.
/// Values that cannot be represented exactly (for example a u64 above
/// i64::MAX) are stringified rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<AttrValue>),
    Map(HashMap<String, AttrValue>),
}

impl AttrValue {
    /// Name of the contained type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::String(_) => "string",
            AttrValue::Array(_) => "array",
            AttrValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("null"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        AttrValue::Int(i64::from(i))
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<u32> for AttrValue {
    fn from(u: u32) -> Self {
        AttrValue::Int(i64::from(u))
    }
}

impl From<u64> for AttrValue {
    fn from(u: u64) -> Self {
        match i64::try_from(u) {
            Ok(i) => AttrValue::Int(i),
            Err(_) => AttrValue::String(u.to_string()),
        }
    }
}

impl From<f32> for AttrValue {
    fn from(f: f32) -> Self {
        AttrValue::Float(f64::from(f))
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(items: Vec<AttrValue>) -> Self {
        AttrValue::Array(items)
    }
}

impl From<HashMap<String, AttrValue>> for AttrValue {
    fn from(entries: HashMap<String, AttrValue>) -> Self {
        AttrValue::Map(entries)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => AttrValue::Null,
        }
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttrValue::Null,
            serde_json::Value::Bool(b) => AttrValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttrValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    AttrValue::Float(f)
                } else {
                    AttrValue::String(n.to_string())
                }
            }
            serde_json::Value::String(s) => AttrValue::String(s),
            serde_json::Value::Array(items) => {
                AttrValue::Array(items.into_iter().map(AttrValue::from).collect())
            }
            serde_json::Value::Object(entries) => AttrValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, AttrValue::from(value)))
                    .collect(),
            ),
        }
    }
}
