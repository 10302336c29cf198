//! Event rendering for local sinks.

use std::collections::BTreeMap;

use colored::Colorize;
use logit_core::{AttrValue, Event, Level, Status, ARGUMENTS_ATTR, RETURN_VALUE_ATTR};

/// Renders one event as a single line, without a trailing newline.
pub trait EventFormatter: Send + Sync {
    fn format(&self, event: &Event) -> String;
}

/// Human-readable single-line format with optional ANSI colors.
#[derive(Debug, Clone)]
pub struct TextFormatter {
    color: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self { color: true }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn paint_level(&self, level: Level, text: String) -> String {
        if !self.color {
            return text;
        }
        match level {
            Level::Trace => text.as_str().dimmed().to_string(),
            Level::Debug => text.as_str().blue().to_string(),
            Level::Info => text.as_str().green().to_string(),
            Level::Warn => text.as_str().yellow().to_string(),
            Level::Error => text.as_str().red().to_string(),
            Level::Fatal => text.as_str().red().bold().to_string(),
        }
    }

    fn paint_bold(&self, text: String) -> String {
        if self.color {
            text.as_str().bold().to_string()
        } else {
            text
        }
    }

    fn paint_dimmed(&self, text: String) -> String {
        if self.color {
            text.as_str().dimmed().to_string()
        } else {
            text
        }
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFormatter for TextFormatter {
    fn format(&self, event: &Event) -> String {
        let timestamp = event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let level = self.paint_level(event.level, format!("{:<5}", event.level.as_str()));
        let target = self.paint_bold(format!(
            "{}#{}",
            event.location.namespace, event.location.function
        ));
        let source = self.paint_dimmed(format!(
            "({}:{})",
            event.location.file, event.location.line
        ));

        let mut line = format!(
            "{} {} {} {} ({:.1}ms)",
            timestamp, level, target, event.name, event.duration_ms
        );
        if let Some(value) = event.attributes.get(RETURN_VALUE_ATTR) {
            line.push_str(&format!(" -> {}", value));
        }
        line.push(' ');
        line.push_str(&source);
        if event.status == Status::Error {
            line.push_str(" status=error");
        }

        if let Some(value) = event.attributes.get(ARGUMENTS_ATTR) {
            let rendered = match value {
                AttrValue::Map(arguments) => {
                    // Sort keys so output is stable across runs.
                    let arguments: BTreeMap<_, _> = arguments.iter().collect();
                    arguments
                        .into_iter()
                        .map(|(key, value)| format!("{}={}", key, value))
                        .collect::<Vec<_>>()
                        .join(", ")
                }
                other => other.to_string(),
            };
            line.push_str(&format!("\n    args: {}", rendered));
        }

        let extra: BTreeMap<_, _> = event
            .attributes
            .iter()
            .filter(|(key, _)| key.as_str() != ARGUMENTS_ATTR && key.as_str() != RETURN_VALUE_ATTR)
            .collect();
        if !extra.is_empty() {
            line.push_str("\n   ");
            for (key, value) in extra {
                line.push_str(&format!(" {}={}", key, value));
            }
        }

        if let Some(exception) = &event.exception {
            line.push_str(&format!(
                "\n    error: {}: {}",
                exception.exception_type, exception.message
            ));
        }

        line
    }
}

/// One JSON object per event, matching the event's serde layout.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl EventFormatter for JsonFormatter {
    fn format(&self, event: &Event) -> String {
        match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to serialize event, emitting fallback record");
                serde_json::json!({
                    "name": event.name,
                    "level": event.level,
                    "serialization_error": err.to_string(),
                })
                .to_string()
            }
        }
    }
}
