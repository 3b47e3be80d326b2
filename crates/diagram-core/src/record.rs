//! Record identity: schema-free data, user-facing keys and store handles.

use std::fmt;

use serde_json::{Map, Value};

/// A node or link record: an open-ended JSON object.
pub type ObjectData = Map<String, Value>;

/// A record key as stored in its key property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Number(i64),
    Text(String),
}

impl Key {
    /// Reads a key out of a property value.
    ///
    /// Missing, `null`, empty strings and non-integer numbers match no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Key::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(Key::Number),
            _ => None,
        }
    }

    /// The JSON value written to the key property.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(n) => Value::from(*n),
            Key::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{n}"),
            Key::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n)
    }
}

/// Opaque handle of a record inside one model.
///
/// Handles are never reused within a model and survive undo/redo, so a
/// record keeps the same handle for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) u64);

impl RecordId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which collection a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Node,
    Link,
}

impl RecordKind {
    /// Name of the serialized array holding records of this kind.
    pub fn collection_name(self) -> &'static str {
        match self {
            RecordKind::Node => "nodeDataArray",
            RecordKind::Link => "linkDataArray",
        }
    }
}
