//! Deployment lifecycle events.
//!
//! The deployer reports progress through an [`EventSink`]. Payloads are JSON
//! objects carrying at least the deployment and stack names.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use chrono::Utc;

/// A stack is about to be built and provisioned.
pub const STACK_STARTED: &str = "stack.started";
/// A stack was provisioned and its parameters published.
pub const STACK_DEPLOYED: &str = "stack.deployed";
/// A stack failed to build, provision or publish.
pub const STACK_FAILED: &str = "stack.failed";
/// A stack was not attempted because of an earlier failure.
pub const STACK_SKIPPED: &str = "stack.skipped";
/// A stack was torn down.
pub const STACK_DESTROYED: &str = "stack.destroyed";
/// A parameter was written to the shared store.
pub const PARAMETER_PUBLISHED: &str = "parameter.published";

/// Builds an event payload for a stack, merging `extra` object fields.
#[must_use]
pub fn stack_payload(deployment: &str, stack: &str, extra: serde_json::Value) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "deployment": deployment,
        "stack": stack,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let (Some(target), serde_json::Value::Object(extra)) = (payload.as_object_mut(), extra) {
        target.extend(extra);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_payload_merges_fields() {
        let payload = stack_payload("ecs-elk", "auth", serde_json::json!({"resources": 3}));

        assert_eq!(payload["deployment"], "ecs-elk");
        assert_eq!(payload["stack"], "auth");
        assert_eq!(payload["resources"], 3);
        assert!(payload["timestamp"].is_string());
    }

    #[test]
    fn test_stack_payload_ignores_non_object_extra() {
        let payload = stack_payload("ecs-elk", "auth", serde_json::Value::Null);
        assert_eq!(payload.as_object().map(serde_json::Map::len), Some(3));
    }
}
