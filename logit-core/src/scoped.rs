//! RAII instrumentation around the span stack.
//!
//! `ScopedSpan` pushes a span on creation and, on drop, pops it, converts it
//! to an event, and emits it. The drop path also fires during unwinding, so
//! a panicking operation still produces an error event. `traced`,
//! `traced_result`, and `traced_sync` wrap a single operation in a guard.

use std::fmt::Display;
use std::future::Future;

use crate::context;
use crate::event::{ExceptionInfo, SourceLocation, Status};
use crate::ids::{SpanId, TraceId};
use crate::level::Level;
use crate::span::{self, Span};
use crate::tracer;
use crate::value::AttrValue;

pub struct ScopedSpan {
    level: Level,
    location: SourceLocation,
    status: Status,
    span_id: SpanId,
    // Holds the span when no execution scope is installed.
    detached: Option<Span>,
}

impl ScopedSpan {
    /// Starts a span and pushes it onto the current task's stack. Without an
    /// execution scope the guard carries the span itself and still emits it
    /// on drop.
    pub fn enter(name: impl Into<String>, level: Level, location: SourceLocation) -> Self {
        let span = Span::new(name);
        let span_id = span.span_id.clone();
        let detached = span::push(span);
        Self {
            level,
            location,
            status: Status::Ok,
            span_id,
            detached,
        }
    }

    pub fn trace_id(&self) -> Option<TraceId> {
        match &self.detached {
            Some(span) => Some(span.trace_id.clone()),
            None => {
                let mut found = None;
                span::with_span(&self.span_id, |span| found = Some(span.trace_id.clone()));
                found
            }
        }
    }

    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    /// Records an attribute on this guard's span, even when a child span is
    /// currently on top of the stack.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let (name, value) = (name.into(), value.into());
        match self.detached.as_mut() {
            Some(span) => span.set_attr(name, value),
            None => span::with_span(&self.span_id, |span| span.set_attr(name, value)),
        }
    }

    pub fn add_event(
        &mut self,
        name: impl Into<String>,
        attributes: std::collections::HashMap<String, AttrValue>,
    ) {
        let name = name.into();
        match self.detached.as_mut() {
            Some(span) => span.add_event(name, attributes),
            None => span::with_span(&self.span_id, |span| span.add_event(name, attributes)),
        }
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Marks the span failed and attaches the exception details.
    pub fn fail(&mut self, exception: ExceptionInfo) {
        self.status = Status::Error;
        match self.detached.as_mut() {
            Some(span) => span.set_exception(exception),
            None => span::with_span(&self.span_id, |span| span.set_exception(exception)),
        }
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        let span = match self.detached.take() {
            Some(span) => Some(span),
            None => span::pop(),
        };
        let mut span = match span {
            Some(span) => span,
            None => return,
        };
        let mut status = self.status;
        if std::thread::panicking() {
            status = Status::Error;
            if span.exception.is_none() {
                span.set_exception(ExceptionInfo::new(
                    "panic",
                    "operation panicked while the span was open",
                ));
            }
        }
        let event = span.into_event(self.level, self.location.clone(), status);
        tracer::emit(&event);
        context::clear_scoped();
    }
}

/// Runs `f` inside a span and emits the result. When no backend would accept
/// an event at this level and namespace the operation runs untraced.
pub async fn traced<F, T>(name: &str, level: Level, location: SourceLocation, f: F) -> T
where
    F: Future<Output = T>,
{
    if !tracer::should_emit(level, Some(&location.namespace)) {
        return f.await;
    }
    let _guard = ScopedSpan::enter(name, level, location);
    f.await
}

/// Like [`traced`], but marks the span failed when `f` resolves to `Err`.
pub async fn traced_result<F, T, E>(
    name: &str,
    level: Level,
    location: SourceLocation,
    f: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    if !tracer::should_emit(level, Some(&location.namespace)) {
        return f.await;
    }
    let mut guard = ScopedSpan::enter(name, level, location);
    let result = f.await;
    if let Err(err) = &result {
        guard.fail(ExceptionInfo::new(
            std::any::type_name::<E>(),
            err.to_string(),
        ));
    }
    result
}

/// Synchronous counterpart of [`traced`] for blocking sections.
pub fn traced_sync<F, T>(name: &str, level: Level, location: SourceLocation, f: F) -> T
where
    F: FnOnce() -> T,
{
    if !tracer::should_emit(level, Some(&location.namespace)) {
        return f();
    }
    let _guard = ScopedSpan::enter(name, level, location);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution;

    fn loc(namespace: &str) -> SourceLocation {
        SourceLocation::new("lib.rs", 1, "op", namespace)
    }

    #[tokio::test]
    async fn test_guard_pushes_and_pops() {
        execution::scope(async {
            {
                let _guard = ScopedSpan::enter("outer", Level::Info, loc("app"));
                assert_eq!(span::depth(), 1);
                {
                    let _inner = ScopedSpan::enter("inner", Level::Info, loc("app"));
                    assert_eq!(span::depth(), 2);
                }
                assert_eq!(span::depth(), 1);
            }
            assert_eq!(span::depth(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_outer_guard_targets_own_span() {
        execution::scope(async {
            let mut outer = ScopedSpan::enter("outer", Level::Info, loc("app"));
            let _inner = ScopedSpan::enter("inner", Level::Info, loc("app"));
            outer.set_attr("who", "outer");
            let inner_span = span::pop().expect("inner");
            assert!(inner_span.attributes.is_empty());
            let outer_span = span::pop().expect("outer");
            assert_eq!(
                outer_span.attributes.get("who"),
                Some(&AttrValue::String("outer".to_string()))
            );
        })
        .await;
    }

    #[test]
    fn test_detached_guard_keeps_span() {
        let mut guard = ScopedSpan::enter("detached", Level::Info, loc("app"));
        guard.set_attr("k", "v");
        assert!(guard.trace_id().is_some());
        assert_eq!(span::depth(), 0);
    }
}
