//! Per-task execution scopes.
//!
//! Span stacks and context maps are task-local, so every task that wants
//! tracing must run inside a scope. `scope` wraps a single future;
//! `spawn_scoped` is the spawn-and-wrap shorthand. Nested scopes shadow the
//! outer one for the duration of the inner future.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::{context, span};

/// Runs `fut` with a fresh span stack and fresh context maps.
pub async fn scope<F>(fut: F) -> F::Output
where
    F: Future,
{
    span::scope(context::scope(fut)).await
}

/// Spawns `fut` on the Tokio runtime inside its own execution scope.
pub fn spawn_scoped<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(scope(fut))
}
