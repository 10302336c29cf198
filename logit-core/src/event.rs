use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{SpanId, TraceId};
use crate::level::Level;
use crate::value::AttrValue;

// ===== Source location =====

/// Where an event originated: file, line, function, and `::`-separated
/// namespace. The namespace is what backend bindings filter on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub namespace: String,
}

impl SourceLocation {
    pub fn new(
        file: impl Into<String>,
        line: u32,
        function: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
            namespace: namespace.into(),
        }
    }
}

/// Capture the current source location.
///
/// The zero-argument form records `<unknown>` as the function name; pass the
/// function name explicitly when it matters in formatted output.
#[macro_export]
macro_rules! source_location {
    () => {
        $crate::event::SourceLocation::new(file!(), line!(), "<unknown>", module_path!())
    };
    ($function:expr) => {
        $crate::event::SourceLocation::new(file!(), line!(), $function, module_path!())
    };
}

// ===== Status =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Error => "error",
        }
    }
}

// ===== Exception =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub exception_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Vec<String>>,
}

impl ExceptionInfo {
    pub fn new(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            message: message.into(),
            stacktrace: None,
        }
    }

    pub fn with_stacktrace(mut self, stacktrace: Vec<String>) -> Self {
        self.stacktrace = Some(stacktrace);
        self
    }
}

// ===== Span events =====

/// Timestamped sub-event recorded while a span was open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, AttrValue>,
}

// ===== Event =====

/// Attribute key under which instrumentation records a call's argument map.
pub const ARGUMENTS_ATTR: &str = "arguments";

/// Attribute key under which instrumentation records a call's return value.
pub const RETURN_VALUE_ATTR: &str = "return_value";

/// Immutable record of one completed span, routed to backends by the tracer.
///
/// The timestamp is the span's start time; `duration_ms` measures to its end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub name: String,
    pub level: Level,
    pub status: Status,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, AttrValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub span_events: Vec<SpanEvent>,
}

impl Event {
    /// Namespace the event was emitted from, used for backend filtering.
    pub fn namespace(&self) -> &str {
        &self.location.namespace
    }
}
