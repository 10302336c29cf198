use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::LogitResult;
use crate::event::Event;
use crate::level::Level;
use crate::pattern::NamespaceBinding;

/// Per-backend level filtering: a default level plus namespace bindings.
///
/// Binding the same pattern twice replaces the earlier binding. When several
/// bindings match a namespace, the most specific one decides; on equal
/// specificity the most recently bound wins.
#[derive(Debug)]
pub struct BackendFilter {
    default_level: Level,
    bindings: Mutex<Vec<NamespaceBinding>>,
}

impl BackendFilter {
    pub fn new(default_level: Level) -> Self {
        Self {
            default_level,
            bindings: Mutex::new(Vec::new()),
        }
    }

    pub fn default_level(&self) -> Level {
        self.default_level
    }

    /// Registers a minimum level for namespaces matching `pattern`.
    pub fn bind(&self, pattern: impl Into<String>, level: Level) -> LogitResult<()> {
        let binding = NamespaceBinding::new(pattern, level)?;
        let mut bindings = self.lock();
        bindings.retain(|existing| existing.pattern() != binding.pattern());
        bindings.push(binding);
        Ok(())
    }

    pub fn bindings(&self) -> Vec<NamespaceBinding> {
        self.lock().clone()
    }

    /// The level in force for `namespace`.
    pub fn effective_level(&self, namespace: &str) -> Level {
        let bindings = self.bindings();
        let mut best: Option<&NamespaceBinding> = None;
        for binding in &bindings {
            if !binding.matches(namespace) {
                continue;
            }
            match best {
                Some(current) if binding.specificity() < current.specificity() => {}
                _ => best = Some(binding),
            }
        }
        best.map(NamespaceBinding::level).unwrap_or(self.default_level)
    }

    /// The most permissive level any namespace could be accepted at. Used to
    /// pre-filter events that carry no namespace.
    pub fn floor_level(&self) -> Level {
        self.lock()
            .iter()
            .map(NamespaceBinding::level)
            .chain(std::iter::once(self.default_level))
            .min()
            .unwrap_or(self.default_level)
    }

    pub fn allows(&self, level: Level, namespace: Option<&str>) -> bool {
        match namespace {
            Some(namespace) => level >= self.effective_level(namespace),
            None => level >= self.floor_level(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NamespaceBinding>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BackendFilter {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

/// A destination for finished events.
///
/// `log` must not block: backends either write to fast local sinks or hand
/// the event to a background worker. Flushing and closing are async so
/// buffered backends can drain in-flight work.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn filter(&self) -> &BackendFilter;

    fn log(&self, event: &Event) -> LogitResult<()>;

    async fn flush(&self) -> LogitResult<()> {
        Ok(())
    }

    async fn close(&self) -> LogitResult<()> {
        Ok(())
    }

    fn bind(&self, pattern: &str, level: Level) -> LogitResult<()> {
        self.filter().bind(pattern, level)
    }

    fn should_log(&self, event: &Event) -> bool {
        self.filter().allows(event.level, Some(event.namespace()))
    }

    fn should_log_level(&self, level: Level, namespace: Option<&str>) -> bool {
        self.filter().allows(level, namespace)
    }
}
