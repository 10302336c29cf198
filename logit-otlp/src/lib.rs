//! OTLP/HTTP log export for the tracing pipeline.
//!
//! Events are buffered by a [`BatchProcessor`], converted to the OTLP JSON
//! logs format by [`PayloadBuilder`], and posted to a collector by
//! [`OtlpHttpClient`]. [`OtlpBackend`] wires the three together behind the
//! core `Backend` trait.

pub mod backend;
pub mod batch;
pub mod client;
pub mod config;
pub mod payload;

pub use backend::OtlpBackend;
pub use batch::{BatchExporter, BatchProcessor};
pub use client::OtlpHttpClient;
pub use config::{
    OtlpConfig, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL, DEFAULT_LOGS_PATH, DEFAULT_TIMEOUT,
};
pub use payload::PayloadBuilder;
