use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Newtype pattern for TraceId
///
/// 32 lowercase hex characters, stable across one logical call tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase form used on the OTLP wire.
    pub fn as_hex_upper(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TraceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.0
    }
}

/// Newtype pattern for SpanId
///
/// 16 lowercase hex characters, unique per span and never all-zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SpanId(pub String);

impl SpanId {
    pub fn new() -> Self {
        let mut value: u64 = rand::random();
        while value == 0 {
            value = rand::random();
        }
        Self(format!("{:016x}", value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase form used on the OTLP wire.
    pub fn as_hex_upper(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SpanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<SpanId> for String {
    fn from(id: SpanId) -> Self {
        id.0
    }
}
