//! OTLP/HTTP JSON payload assembly.
//!
//! Builds the `resourceLogs` envelope defined by the OTLP logs data model.
//! Scalar values map onto the protocol's `AnyValue` encoding, where 64-bit
//! integers travel as strings.

use std::collections::BTreeMap;

use logit_core::{AttrValue, Event, Level};
use serde_json::{json, Value};

use crate::config::OtlpConfig;

/// Converts event batches into OTLP JSON. The resource and scope blocks are
/// fixed at construction and shared by every payload.
pub struct PayloadBuilder {
    resource: Value,
    scope: Value,
}

impl PayloadBuilder {
    pub fn new(config: &OtlpConfig) -> Self {
        let attributes: Vec<Value> = config
            .resource_attributes
            .iter()
            .map(|(key, value)| key_value(key, value))
            .collect();
        Self {
            resource: json!({ "attributes": attributes }),
            scope: json!({ "name": config.scope_name, "version": config.scope_version }),
        }
    }

    pub fn build(&self, events: &[Event]) -> Value {
        let records: Vec<Value> = events.iter().map(|event| self.log_record(event)).collect();
        json!({
            "resourceLogs": [{
                "resource": self.resource,
                "scopeLogs": [{
                    "scope": self.scope,
                    "logRecords": records,
                }],
            }],
        })
    }

    fn log_record(&self, event: &Event) -> Value {
        let timestamp = unix_nanos(event);

        let mut attributes = vec![
            string_attr("code.function", &event.location.function),
            string_attr("code.namespace", &event.location.namespace),
            string_attr("code.filepath", &event.location.file),
            int_attr("code.lineno", i64::from(event.location.line)),
            double_attr("logit.duration_ms", event.duration_ms),
            string_attr("logit.status", event.status.as_str()),
        ];
        if let Some(parent) = &event.parent_span_id {
            attributes.push(string_attr("logit.parent_span_id", &parent.as_hex_upper()));
        }
        if let Some(exception) = &event.exception {
            attributes.push(string_attr("exception.type", &exception.exception_type));
            attributes.push(string_attr("exception.message", &exception.message));
            if let Some(stacktrace) = &exception.stacktrace {
                attributes.push(string_attr("exception.stacktrace", &stacktrace.join("\n")));
            }
        }
        let user_attrs: BTreeMap<_, _> = event.attributes.iter().collect();
        for (key, value) in user_attrs {
            attributes.push(key_value(key, value));
        }

        json!({
            "timeUnixNano": timestamp,
            "observedTimeUnixNano": timestamp,
            "severityNumber": severity_number(event.level),
            "severityText": event.level.as_str(),
            "body": { "stringValue": event.name },
            "attributes": attributes,
            "flags": 1,
            "traceId": event.trace_id.as_hex_upper(),
            "spanId": event.span_id.as_hex_upper(),
        })
    }
}

/// OTLP severity numbers sit on a 1..=24 scale; each of our levels maps to
/// the first slot of its band.
fn severity_number(level: Level) -> u32 {
    match level {
        Level::Trace => 1,
        Level::Debug => 5,
        Level::Info => 9,
        Level::Warn => 13,
        Level::Error => 17,
        Level::Fatal => 21,
    }
}

fn unix_nanos(event: &Event) -> String {
    match event.timestamp.timestamp_nanos_opt() {
        Some(nanos) => nanos.to_string(),
        // Out of i64 nanosecond range; fall back to microsecond precision.
        None => format!("{}000", event.timestamp.timestamp_micros()),
    }
}

fn key_value(key: &str, value: &AttrValue) -> Value {
    json!({ "key": key, "value": any_value(value) })
}

fn string_attr(key: &str, value: &str) -> Value {
    json!({ "key": key, "value": { "stringValue": value } })
}

fn int_attr(key: &str, value: i64) -> Value {
    json!({ "key": key, "value": { "intValue": value.to_string() } })
}

fn double_attr(key: &str, value: f64) -> Value {
    json!({ "key": key, "value": { "doubleValue": value } })
}

fn any_value(value: &AttrValue) -> Value {
    match value {
        AttrValue::Null => json!({ "stringValue": "" }),
        AttrValue::Bool(b) => json!({ "boolValue": b }),
        AttrValue::Int(i) => json!({ "intValue": i.to_string() }),
        AttrValue::Float(f) => json!({ "doubleValue": f }),
        AttrValue::String(s) => json!({ "stringValue": s }),
        AttrValue::Array(items) => {
            let values: Vec<Value> = items.iter().map(any_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        AttrValue::Map(entries) => {
            let entries: BTreeMap<_, _> = entries.iter().collect();
            let values: Vec<Value> = entries
                .into_iter()
                .map(|(key, value)| json!({ "key": key, "value": any_value(value) }))
                .collect();
            json!({ "kvlistValue": { "values": values } })
        }
    }
}
