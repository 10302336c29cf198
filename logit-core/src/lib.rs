//! Core tracing pipeline: spans, events, filtering, and the backend fan-out.
//!
//! Everything here is transport-agnostic. Spans are opened through
//! [`ScopedSpan`] or the [`traced`] wrappers, flow through the task-local
//! span stack, and are fanned out to registered [`Backend`]s by the
//! [`Tracer`]. Sinks that actually write bytes live in the companion
//! backend crates.

pub mod backend;
pub mod context;
pub mod error;
pub mod event;
pub mod execution;
pub mod ids;
pub mod level;
pub mod pattern;
pub mod redact;
pub mod scoped;
pub mod span;
pub mod tracer;
pub mod value;

pub use backend::{Backend, BackendFilter};
pub use error::{LogitError, LogitResult};
pub use event::{
    Event, ExceptionInfo, SourceLocation, SpanEvent, Status, ARGUMENTS_ATTR, RETURN_VALUE_ATTR,
};
pub use ids::{SpanId, TraceId};
pub use level::Level;
pub use pattern::NamespaceBinding;
pub use redact::{RedactionSet, REDACTED};
pub use scoped::{traced, traced_result, traced_sync, ScopedSpan};
pub use span::Span;
pub use tracer::Tracer;
pub use value::AttrValue;
