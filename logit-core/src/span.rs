//! Spans and the per-task span stack.
//!
//! A span measures one operation. Creating a span inside an execution scope
//! inherits the trace id and parent span id from the span on top of the
//! stack; outside any scope it starts a fresh trace. The stack itself is
//! task-local, pushed and popped by the instrumentation layer.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::context;
use crate::event::{Event, ExceptionInfo, SourceLocation, SpanEvent, Status};
use crate::ids::{SpanId, TraceId};
use crate::level::Level;
use crate::redact;
use crate::value::AttrValue;

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub attributes: HashMap<String, AttrValue>,
    pub exception: Option<ExceptionInfo>,
    pub span_events: Vec<SpanEvent>,
}

impl Span {
    /// Starts a span, inheriting trace and parent ids from the current
    /// task's span stack when one is active.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parent(name, current_ids())
    }

    /// Starts a span with an explicit parent, or a new root when `None`.
    pub fn with_parent(name: impl Into<String>, parent: Option<(TraceId, SpanId)>) -> Self {
        let (trace_id, parent_span_id) = match parent {
            Some((trace_id, span_id)) => (trace_id, Some(span_id)),
            None => (TraceId::new(), None),
        };
        Self {
            trace_id,
            span_id: SpanId::new(),
            parent_span_id,
            name: name.into(),
            start_time: Utc::now(),
            end_time: None,
            attributes: HashMap::new(),
            exception: None,
            span_events: Vec::new(),
        }
    }

    /// Records an attribute. Values whose names match a redaction pattern
    /// are replaced before they are stored.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = redact::redact_value(&name, value.into());
        self.attributes.insert(name, value);
    }

    pub fn set_attrs<I, K, V>(&mut self, attrs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttrValue>,
    {
        for (name, value) in attrs {
            self.set_attr(name, value);
        }
    }

    pub fn set_exception(&mut self, exception: ExceptionInfo) {
        self.exception = Some(exception);
    }

    /// Appends a point-in-time event to the span's timeline.
    pub fn add_event(&mut self, name: impl Into<String>, attributes: HashMap<String, AttrValue>) {
        self.span_events.push(SpanEvent {
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
        });
    }

    /// Marks the span finished. Subsequent calls keep the first end time.
    pub fn end(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Elapsed time in milliseconds, measured to now for an open span.
    pub fn duration_ms(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        let elapsed = end - self.start_time;
        match elapsed.num_microseconds() {
            Some(micros) => micros as f64 / 1000.0,
            None => elapsed.num_milliseconds() as f64,
        }
    }

    /// Finishes the span and converts it into an emittable event. Ambient
    /// context entries become attributes; explicit span attributes win on
    /// key collisions.
    pub fn into_event(mut self, level: Level, location: SourceLocation, status: Status) -> Event {
        self.end();
        let duration_ms = self.duration_ms();
        let mut attributes: HashMap<String, AttrValue> = context::current()
            .into_iter()
            .map(|(name, value)| {
                let value = redact::redact_value(&name, AttrValue::String(value));
                (name, value)
            })
            .collect();
        attributes.extend(self.attributes);
        Event {
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_span_id: self.parent_span_id,
            timestamp: self.start_time,
            duration_ms,
            name: self.name,
            level,
            status,
            location,
            attributes,
            exception: self.exception,
            span_events: self.span_events,
        }
    }
}

// ===== Task-local span stack =====

tokio::task_local! {
    static SPAN_STACK: RefCell<Vec<Span>>;
}

/// Installs a fresh span stack around `fut`.
pub(crate) async fn scope<F>(fut: F) -> F::Output
where
    F: std::future::Future,
{
    SPAN_STACK.scope(RefCell::new(Vec::new()), fut).await
}

/// Pushes a span onto the current task's stack. When no execution scope is
/// installed the span is handed back so the caller can keep it alive.
pub fn push(span: Span) -> Option<Span> {
    let mut slot = Some(span);
    let _ = SPAN_STACK.try_with(|cell| {
        if let Some(span) = slot.take() {
            cell.borrow_mut().push(span);
        }
    });
    slot
}

pub fn pop() -> Option<Span> {
    SPAN_STACK
        .try_with(|cell| cell.borrow_mut().pop())
        .ok()
        .flatten()
}

pub fn depth() -> usize {
    SPAN_STACK
        .try_with(|cell| cell.borrow().len())
        .unwrap_or(0)
}

/// Trace and span ids of the innermost active span, if any.
pub fn current_ids() -> Option<(TraceId, SpanId)> {
    SPAN_STACK
        .try_with(|cell| {
            cell.borrow()
                .last()
                .map(|span| (span.trace_id.clone(), span.span_id.clone()))
        })
        .ok()
        .flatten()
}

/// Mutates the stacked span with the given id, innermost match first.
pub(crate) fn with_span<F>(id: &SpanId, f: F)
where
    F: FnOnce(&mut Span),
{
    let _ = SPAN_STACK.try_with(|cell| {
        let mut stack = cell.borrow_mut();
        if let Some(span) = stack.iter_mut().rev().find(|span| &span.span_id == id) {
            f(span);
        }
    });
}

/// Records an attribute on the innermost active span. No-op without one.
pub fn record_attr(name: impl Into<String>, value: impl Into<AttrValue>) {
    let (name, value) = (name.into(), value.into());
    let _ = SPAN_STACK.try_with(|cell| {
        if let Some(span) = cell.borrow_mut().last_mut() {
            span.set_attr(name, value);
        }
    });
}

pub fn record_exception(exception: ExceptionInfo) {
    let _ = SPAN_STACK.try_with(|cell| {
        if let Some(span) = cell.borrow_mut().last_mut() {
            span.set_exception(exception);
        }
    });
}

pub fn record_event(name: impl Into<String>, attributes: HashMap<String, AttrValue>) {
    let name = name.into();
    let _ = SPAN_STACK.try_with(|cell| {
        if let Some(span) = cell.borrow_mut().last_mut() {
            span.add_event(name, attributes);
        }
    });
}
