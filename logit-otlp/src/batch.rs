//! Batching layer between the synchronous log path and the async exporter.
//!
//! `add` only pushes onto an in-memory buffer and nudges the worker when the
//! batch size is reached, so callers never wait on the network. The worker
//! drains on size triggers, on a periodic timer, and once more on shutdown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use logit_core::Event;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receives drained batches. Delivery failures are the exporter's problem;
/// the processor never retries a batch.
#[async_trait]
pub trait BatchExporter: Send + Sync {
    async fn export(&self, events: Vec<Event>);
}

pub struct BatchProcessor {
    buffer: Arc<Mutex<Vec<Event>>>,
    batch_size: usize,
    exporter: Arc<dyn BatchExporter>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchProcessor {
    /// Starts the background export worker. Must run inside a Tokio runtime.
    pub fn spawn(
        exporter: Arc<dyn BatchExporter>,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_loop(
            buffer.clone(),
            exporter.clone(),
            notify.clone(),
            cancel.clone(),
            flush_interval,
        ));
        Self {
            buffer,
            batch_size,
            exporter,
            notify,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Buffers one event. Wakes the worker when the batch size is reached.
    pub fn add(&self, event: Event) {
        let should_flush = {
            let mut buffer = lock(&self.buffer);
            buffer.push(event);
            buffer.len() >= self.batch_size
        };
        if should_flush {
            self.notify.notify_one();
        }
    }

    pub fn pending(&self) -> usize {
        lock(&self.buffer).len()
    }

    /// Exports everything currently buffered, waiting for delivery.
    pub async fn flush(&self) {
        drain(&self.buffer, self.exporter.as_ref()).await;
    }

    /// Stops the worker and drains the remaining events. Safe to call more
    /// than once.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let worker = lock_worker(&self.worker).take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "Export worker ended abnormally");
            }
        }
        self.flush().await;
    }
}

async fn run_loop(
    buffer: Arc<Mutex<Vec<Event>>>,
    exporter: Arc<dyn BatchExporter>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
    flush_interval: Duration,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = notify.notified() => drain(&buffer, exporter.as_ref()).await,
            _ = tokio::time::sleep(flush_interval) => drain(&buffer, exporter.as_ref()).await,
        }
    }
}

/// Swaps the buffer out under the lock, then exports without holding it.
async fn drain(buffer: &Mutex<Vec<Event>>, exporter: &dyn BatchExporter) {
    let batch = {
        let mut buffer = lock(buffer);
        std::mem::take(&mut *buffer)
    };
    if batch.is_empty() {
        return;
    }
    exporter.export(batch).await;
}

fn lock(buffer: &Mutex<Vec<Event>>) -> MutexGuard<'_, Vec<Event>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_worker(worker: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    worker.lock().unwrap_or_else(PoisonError::into_inner)
}
