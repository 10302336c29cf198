//! Ambient key/value context carried per task.
//!
//! Two maps ride along with every execution scope: a persistent map that
//! survives until explicitly cleared, and a scoped map that instrumentation
//! wipes after each traced call. Both are task-local, so concurrent tasks
//! never observe each other's entries. Outside a scope every operation
//! degrades to a no-op and reads return nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;

tokio::task_local! {
    static PERSISTENT_CONTEXT: RefCell<HashMap<String, String>>;
    static SCOPED_CONTEXT: RefCell<HashMap<String, String>>;
}

/// Installs fresh context maps around `fut`.
pub(crate) async fn scope<F>(fut: F) -> F::Output
where
    F: Future,
{
    PERSISTENT_CONTEXT
        .scope(
            RefCell::new(HashMap::new()),
            SCOPED_CONTEXT.scope(RefCell::new(HashMap::new()), fut),
        )
        .await
}

pub fn set_persistent(key: impl Into<String>, value: impl Into<String>) {
    let (key, value) = (key.into(), value.into());
    let _ = PERSISTENT_CONTEXT.try_with(|cell| {
        cell.borrow_mut().insert(key, value);
    });
}

pub fn set_scoped(key: impl Into<String>, value: impl Into<String>) {
    let (key, value) = (key.into(), value.into());
    let _ = SCOPED_CONTEXT.try_with(|cell| {
        cell.borrow_mut().insert(key, value);
    });
}

pub fn get_persistent(key: &str) -> Option<String> {
    PERSISTENT_CONTEXT
        .try_with(|cell| cell.borrow().get(key).cloned())
        .ok()
        .flatten()
}

pub fn get_scoped(key: &str) -> Option<String> {
    SCOPED_CONTEXT
        .try_with(|cell| cell.borrow().get(key).cloned())
        .ok()
        .flatten()
}

/// Merged view of both maps. Scoped entries shadow persistent ones.
pub fn current() -> HashMap<String, String> {
    let mut merged = PERSISTENT_CONTEXT
        .try_with(|cell| cell.borrow().clone())
        .unwrap_or_default();
    if let Ok(scoped) = SCOPED_CONTEXT.try_with(|cell| cell.borrow().clone()) {
        merged.extend(scoped);
    }
    merged
}

pub fn clear_persistent() {
    let _ = PERSISTENT_CONTEXT.try_with(|cell| cell.borrow_mut().clear());
}

pub fn clear_scoped() {
    let _ = SCOPED_CONTEXT.try_with(|cell| cell.borrow_mut().clear());
}

/// Runs `fut` with `entries` merged into the persistent map, restoring the
/// previous contents afterwards. The restore happens in a drop guard, so it
/// also runs when the future is cancelled or panics.
pub async fn with_scoped<F, T, I>(entries: I, fut: F) -> T
where
    F: Future<Output = T>,
    I: IntoIterator<Item = (String, String)>,
{
    let saved = PERSISTENT_CONTEXT
        .try_with(|cell| {
            let saved = cell.borrow().clone();
            cell.borrow_mut().extend(entries);
            saved
        })
        .ok();
    let _restore = RestoreGuard { saved };
    fut.await
}

struct RestoreGuard {
    saved: Option<HashMap<String, String>>,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            let _ = PERSISTENT_CONTEXT.try_with(|cell| *cell.borrow_mut() = saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get_inside_scope() {
        scope(async {
            set_persistent("request_id", "r-1");
            set_scoped("attempt", "2");
            assert_eq!(get_persistent("request_id").as_deref(), Some("r-1"));
            assert_eq!(get_scoped("attempt").as_deref(), Some("2"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_noop_outside_scope() {
        set_persistent("request_id", "r-1");
        assert_eq!(get_persistent("request_id"), None);
        assert!(current().is_empty());
    }

    #[tokio::test]
    async fn test_current_scoped_wins() {
        scope(async {
            set_persistent("user", "persistent");
            set_persistent("region", "eu");
            set_scoped("user", "scoped");
            let merged = current();
            assert_eq!(merged.get("user").map(String::as_str), Some("scoped"));
            assert_eq!(merged.get("region").map(String::as_str), Some("eu"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_clear() {
        scope(async {
            set_persistent("a", "1");
            set_scoped("b", "2");
            clear_persistent();
            clear_scoped();
            assert!(current().is_empty());
        })
        .await;
    }

    #[tokio::test]
    async fn test_tasks_are_isolated() {
        scope(async {
            set_persistent("owner", "outer");
            let inner = tokio::spawn(scope(async { get_persistent("owner") }));
            assert_eq!(inner.await.unwrap(), None);
            assert_eq!(get_persistent("owner").as_deref(), Some("outer"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_with_scoped_restores_on_completion() {
        scope(async {
            set_persistent("tenant", "base");
            let entries = vec![("tenant".to_string(), "override".to_string())];
            with_scoped(entries, async {
                assert_eq!(get_persistent("tenant").as_deref(), Some("override"));
            })
            .await;
            assert_eq!(get_persistent("tenant").as_deref(), Some("base"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_with_scoped_removes_added_keys() {
        scope(async {
            let entries = vec![("extra".to_string(), "1".to_string())];
            with_scoped(entries, async {
                assert_eq!(get_persistent("extra").as_deref(), Some("1"));
            })
            .await;
            assert_eq!(get_persistent("extra"), None);
        })
        .await;
    }

    #[tokio::test]
    async fn test_with_scoped_restores_on_cancel() {
        scope(async {
            set_persistent("tenant", "base");
            let entries = vec![("tenant".to_string(), "override".to_string())];
            {
                let mut task = std::pin::pin!(with_scoped(entries, async {
                    assert_eq!(get_persistent("tenant").as_deref(), Some("override"));
                    std::future::pending::<()>().await;
                }));
                // Poll once so the guard is armed, then drop mid-flight.
                futures_poll_once(task.as_mut()).await;
            }
            assert_eq!(get_persistent("tenant").as_deref(), Some("base"));
        })
        .await;
    }

    async fn futures_poll_once<F: Future>(fut: std::pin::Pin<&mut F>) {
        use std::task::Poll;
        let mut fut = Some(fut);
        std::future::poll_fn(move |cx| {
            if let Some(f) = fut.take() {
                let _ = f.poll(cx);
            }
            Poll::Ready(())
        })
        .await;
    }
}
