//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt::Debug;
use tracing::{debug, info, warn, Level};

/// Trait for sinks that receive deployment events.
#[async_trait]
pub trait EventSink: Send + Sync + Debug {
    /// Emits an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "stack.deployed")
    /// * `data` - The event payload
    async fn emit(&self, event_type: &str, data: serde_json::Value);

    /// Emits an event without awaiting.
    ///
    /// Never fails. Sink errors are logged and suppressed.
    fn try_emit(&self, event_type: &str, data: serde_json::Value);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: serde_json::Value) {}

    fn try_emit(&self, _event_type: &str, _data: serde_json::Value) {}
}

/// A sink that routes events to `tracing`.
///
/// Failure events are always logged at WARN.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: &serde_json::Value) {
        let stack = data.get("stack").and_then(serde_json::Value::as_str).unwrap_or("-");

        if event_type.ends_with(".failed") {
            warn!(event_type = %event_type, stack = %stack, event_data = %data, "Event: {}", event_type);
        } else if self.level == Level::DEBUG {
            debug!(event_type = %event_type, stack = %stack, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, stack = %stack, event_data = %data, "Event: {}", event_type);
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: serde_json::Value) {
        self.log_event(event_type, &data);
    }

    fn try_emit(&self, event_type: &str, data: serde_json::Value) {
        self.log_event(event_type, &data);
    }
}

/// A sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, serde_json::Value)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.read().clone()
    }

    /// Returns the event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, serde_json::Value)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the `stack` field of every event of exactly this type.
    #[must_use]
    pub fn stacks_for(&self, event_type: &str) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t == event_type)
            .filter_map(|(_, data)| data.get("stack").and_then(serde_json::Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: serde_json::Value) {
        self.events.write().push((event_type.to_string(), data));
    }

    fn try_emit(&self, event_type: &str, data: serde_json::Value) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_and_logging_sinks() {
        NoOpEventSink.emit("stack.started", json!({"stack": "auth"})).await;

        let sink = LoggingEventSink::debug();
        sink.emit("stack.failed", json!({"stack": "auth", "error": "boom"})).await;
        sink.try_emit("stack.deployed", json!({}));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("stack.started", json!({"stack": "auth"})).await;
        sink.try_emit("stack.deployed", json!({"stack": "auth"}));
        sink.emit("parameter.published", json!({"stack": "auth", "key": "user-pool-id"}))
            .await;

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("stack.").len(), 2);
        assert_eq!(sink.stacks_for("stack.deployed"), vec!["auth"]);
        assert_eq!(
            sink.event_types(),
            vec!["stack.started", "stack.deployed", "parameter.published"]
        );

        sink.clear();
        assert!(sink.is_empty());
    }
}
