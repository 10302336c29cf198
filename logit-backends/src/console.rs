use std::io::Write;

use async_trait::async_trait;
use logit_core::{Backend, BackendFilter, Event, Level, LogitResult};

use crate::buffer::WriteBuffer;
use crate::format::{EventFormatter, JsonFormatter, TextFormatter};

/// Configuration for [`ConsoleBackend`].
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub name: String,
    pub level: Level,
    pub color: bool,
    pub json: bool,
    pub buffer_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            name: "console".to_string(),
            level: Level::Info,
            color: true,
            json: false,
            buffer_capacity: 0,
        }
    }
}

impl ConsoleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

/// Writes formatted events to standard output.
pub struct ConsoleBackend {
    name: String,
    filter: BackendFilter,
    formatter: Box<dyn EventFormatter>,
    writer: WriteBuffer,
}

impl ConsoleBackend {
    pub fn new(config: ConsoleConfig) -> Self {
        let stdout = Box::new(std::io::stdout());
        Self::with_writer(config, stdout)
    }

    /// Builds the backend over an arbitrary writer. Tests use this to
    /// capture output.
    pub fn with_writer(config: ConsoleConfig, writer: Box<dyn Write + Send>) -> Self {
        let formatter: Box<dyn EventFormatter> = if config.json {
            Box::new(JsonFormatter::new())
        } else {
            Box::new(TextFormatter::new().with_color(config.color))
        };
        Self {
            name: config.name,
            filter: BackendFilter::new(config.level),
            formatter,
            writer: WriteBuffer::new(writer, config.buffer_capacity),
        }
    }
}

#[async_trait]
impl Backend for ConsoleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter(&self) -> &BackendFilter {
        &self.filter
    }

    fn log(&self, event: &Event) -> LogitResult<()> {
        self.writer.write_line(&self.formatter.format(event))
    }

    async fn flush(&self) -> LogitResult<()> {
        self.writer.flush()
    }

    async fn close(&self) -> LogitResult<()> {
        self.writer.flush()
    }
}
