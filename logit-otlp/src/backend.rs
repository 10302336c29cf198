use std::sync::Arc;

use async_trait::async_trait;
use logit_core::{Backend, BackendFilter, Event, LogitResult};

use crate::batch::{BatchExporter, BatchProcessor};
use crate::client::OtlpHttpClient;
use crate::config::OtlpConfig;
use crate::payload::PayloadBuilder;

/// Builds the OTLP payload for a drained batch and posts it.
struct OtlpDelivery {
    payload: PayloadBuilder,
    client: OtlpHttpClient,
}

#[async_trait]
impl BatchExporter for OtlpDelivery {
    async fn export(&self, events: Vec<Event>) {
        let count = events.len();
        let payload = self.payload.build(&events);
        if self.client.send(&payload).await {
            tracing::debug!(events = count, "Exported batch");
        }
    }
}

/// Ships events to an OTLP/HTTP collector via a background batch worker.
///
/// `log` never touches the network; it clones the event into the batch
/// buffer. Delivery is at-most-once: batches the collector refuses are
/// dropped, not retried.
pub struct OtlpBackend {
    name: String,
    filter: BackendFilter,
    processor: BatchProcessor,
}

impl OtlpBackend {
    /// Validates the config and starts the export worker. Must be called
    /// from within a Tokio runtime.
    pub fn new(config: OtlpConfig) -> LogitResult<Self> {
        config.validate()?;
        let delivery = Arc::new(OtlpDelivery {
            payload: PayloadBuilder::new(&config),
            client: OtlpHttpClient::new(&config)?,
        });
        let processor = BatchProcessor::spawn(delivery, config.batch_size, config.flush_interval);
        Ok(Self {
            name: config.name,
            filter: BackendFilter::new(config.level),
            processor,
        })
    }
}

impl std::fmt::Debug for OtlpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtlpBackend")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for OtlpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter(&self) -> &BackendFilter {
        &self.filter
    }

    fn log(&self, event: &Event) -> LogitResult<()> {
        self.processor.add(event.clone());
        Ok(())
    }

    async fn flush(&self) -> LogitResult<()> {
        self.processor.flush().await;
        Ok(())
    }

    async fn close(&self) -> LogitResult<()> {
        self.processor.stop().await;
        Ok(())
    }
}
