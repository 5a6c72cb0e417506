//! Fire-and-forget usage events.
//!
//! Sinks never fail and never change control flow. The binary uses
//! [`TracingTelemetry`], which writes events as structured log lines.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

/// Event attributes, keyed by attribute name
pub type Attributes = Map<String, Value>;

/// Where an event originated, e.g. the command that opened the flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSource {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl EventSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            detail: None,
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn enabled(&self) -> bool;

    fn send_event(&self, name: &str, attributes: Attributes, source: Option<&EventSource>);
}

/// Writes events to the tracing subscriber under the `telemetry` target
pub struct TracingTelemetry {
    enabled: bool,
}

impl TracingTelemetry {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl TelemetrySink for TracingTelemetry {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn send_event(&self, name: &str, attributes: Attributes, source: Option<&EventSource>) {
        if !self.enabled {
            return;
        }
        let attributes = Value::Object(attributes);
        let source = source.map(|s| s.source.as_str()).unwrap_or_default();
        info!(target: "telemetry", event = name, %attributes, source, "Telemetry event");
    }
}

/// Drops every event
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn enabled(&self) -> bool {
        false
    }

    fn send_event(&self, _name: &str, _attributes: Attributes, _source: Option<&EventSource>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub name: String,
    pub attributes: Attributes,
    pub source: Option<EventSource>,
}

/// Keeps events in memory for assertions
#[derive(Default, Clone)]
pub struct RecordingTelemetry {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn enabled(&self) -> bool {
        true
    }

    fn send_event(&self, name: &str, attributes: Attributes, source: Option<&EventSource>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                name: name.to_string(),
                attributes,
                source: source.cloned(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_keeps_order_and_attributes() {
        let telemetry = RecordingTelemetry::new();
        let mut attributes = Attributes::new();
        attributes.insert("instance".to_string(), json!(1));

        telemetry.send_event("startWork/open", attributes, Some(&EventSource::new("cli")));
        telemetry.send_event("startWork/action", Attributes::new(), None);

        assert_eq!(telemetry.names(), vec!["startWork/open", "startWork/action"]);
        let first = &telemetry.events()[0];
        assert_eq!(first.attributes["instance"], json!(1));
        assert_eq!(first.source.as_ref().unwrap().source, "cli");
    }

    #[test]
    fn test_disabled_tracing_sink() {
        let telemetry = TracingTelemetry::new(false);
        assert!(!telemetry.enabled());
        telemetry.send_event("ignored", Attributes::new(), None);
        assert!(!NoopTelemetry.enabled());
    }
}
