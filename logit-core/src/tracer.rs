use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use crate::backend::Backend;
use crate::event::Event;
use crate::level::Level;

/// Fans finished events out to registered backends.
///
/// Backends are held behind a mutex; every operation snapshots the list and
/// releases the lock before touching any backend, so a slow backend never
/// blocks registration. A failing backend is reported to the diagnostic log
/// and skipped, it cannot take the others down with it.
pub struct Tracer {
    backends: Mutex<Vec<Arc<dyn Backend>>>,
}

static GLOBAL_TRACER: Lazy<Tracer> = Lazy::new(Tracer::new);

impl Tracer {
    pub fn new() -> Self {
        Self {
            backends: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide tracer. Starts with no backends, so emitting before
    /// registration is a cheap no-op.
    pub fn global() -> &'static Tracer {
        &GLOBAL_TRACER
    }

    pub fn add_backend(&self, backend: Arc<dyn Backend>) {
        self.lock().push(backend);
    }

    /// Removes every backend with the given name. Returns true when at
    /// least one was removed.
    pub fn remove_backend(&self, name: &str) -> bool {
        let mut backends = self.lock();
        let before = backends.len();
        backends.retain(|backend| backend.name() != name);
        backends.len() != before
    }

    /// Drops all backends. Tests use this to reset the global tracer.
    pub fn clear_backends(&self) {
        self.lock().clear();
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|backend| backend.name().to_string())
            .collect()
    }

    pub fn backend_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `event` to every backend whose filter accepts it.
    pub fn emit(&self, event: &Event) {
        for backend in self.snapshot() {
            if !backend.should_log(event) {
                continue;
            }
            if let Err(err) = backend.log(event) {
                tracing::warn!(backend = backend.name(), error = %err, "Backend failed to log event");
            }
        }
    }

    /// True when at least one backend would accept an event at `level` from
    /// `namespace`. Lets callers skip building events nobody wants.
    pub fn should_emit(&self, level: Level, namespace: Option<&str>) -> bool {
        self.snapshot()
            .iter()
            .any(|backend| backend.should_log_level(level, namespace))
    }

    pub async fn flush(&self) {
        for backend in self.snapshot() {
            if let Err(err) = backend.flush().await {
                tracing::warn!(backend = backend.name(), error = %err, "Backend flush failed");
            }
        }
    }

    pub async fn close(&self) {
        for backend in self.snapshot() {
            if let Err(err) = backend.close().await {
                tracing::warn!(backend = backend.name(), error = %err, "Backend close failed");
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Backend>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Backend>>> {
        self.backends.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Global convenience functions =====

pub fn add_backend(backend: Arc<dyn Backend>) {
    Tracer::global().add_backend(backend);
}

pub fn remove_backend(name: &str) -> bool {
    Tracer::global().remove_backend(name)
}

pub fn clear_backends() {
    Tracer::global().clear_backends();
}

pub fn emit(event: &Event) {
    Tracer::global().emit(event);
}

pub fn should_emit(level: Level, namespace: Option<&str>) -> bool {
    Tracer::global().should_emit(level, namespace)
}

pub async fn flush() {
    Tracer::global().flush().await;
}

pub async fn close() {
    Tracer::global().close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendFilter;
    use crate::error::{LogitError, LogitResult};
    use crate::event::{SourceLocation, Status};
    use crate::span::Span;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        name: String,
        filter: BackendFilter,
        logged: AtomicUsize,
        fail: bool,
    }

    impl CountingBackend {
        fn new(name: &str, level: Level) -> Self {
            Self {
                name: name.to_string(),
                filter: BackendFilter::new(level),
                logged: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, Level::Trace)
            }
        }

        fn count(&self) -> usize {
            self.logged.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Backend for CountingBackend {
        fn name(&self) -> &str {
            &self.name
        }

        fn filter(&self) -> &BackendFilter {
            &self.filter
        }

        fn log(&self, _event: &Event) -> LogitResult<()> {
            if self.fail {
                return Err(LogitError::InvalidConfig("boom".to_string()));
            }
            self.logged.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_event(level: Level, namespace: &str) -> Event {
        let span = Span::new("op");
        let location = SourceLocation::new("lib.rs", 1, "f", namespace);
        span.into_event(level, location, Status::Ok)
    }

    #[test]
    fn test_emit_respects_filters() {
        let tracer = Tracer::new();
        let verbose = Arc::new(CountingBackend::new("verbose", Level::Trace));
        let quiet = Arc::new(CountingBackend::new("quiet", Level::Error));
        tracer.add_backend(verbose.clone());
        tracer.add_backend(quiet.clone());

        tracer.emit(&sample_event(Level::Info, "App"));
        assert_eq!(verbose.count(), 1);
        assert_eq!(quiet.count(), 0);

        tracer.emit(&sample_event(Level::Error, "App"));
        assert_eq!(verbose.count(), 2);
        assert_eq!(quiet.count(), 1);
    }

    #[test]
    fn test_failing_backend_is_isolated() {
        let tracer = Tracer::new();
        let failing = Arc::new(CountingBackend::failing("bad"));
        let healthy = Arc::new(CountingBackend::new("good", Level::Trace));
        tracer.add_backend(failing);
        tracer.add_backend(healthy.clone());

        tracer.emit(&sample_event(Level::Info, "App"));
        assert_eq!(healthy.count(), 1);
    }

    #[test]
    fn test_remove_backend() {
        let tracer = Tracer::new();
        tracer.add_backend(Arc::new(CountingBackend::new("a", Level::Info)));
        tracer.add_backend(Arc::new(CountingBackend::new("b", Level::Info)));
        assert!(tracer.remove_backend("a"));
        assert!(!tracer.remove_backend("a"));
        assert_eq!(tracer.backend_names(), vec!["b".to_string()]);
    }

    #[test]
    fn test_should_emit() {
        let tracer = Tracer::new();
        assert!(!tracer.should_emit(Level::Fatal, Some("App")));

        tracer.add_backend(Arc::new(CountingBackend::new("quiet", Level::Warn)));
        assert!(!tracer.should_emit(Level::Info, Some("App")));
        assert!(tracer.should_emit(Level::Warn, Some("App")));
    }
}
