//! Assertion helpers for plans and deployment reports.

use crate::deploy::{DeploymentReport, StackStatus};
use crate::events::CollectingEventSink;
use crate::plan::DeploymentPlan;

/// Asserts every stack comes after all of its dependencies.
pub fn assert_order_respects_dependencies(plan: &DeploymentPlan) {
    let order = plan.deployment_order();
    let position = |name: &str| order.iter().position(|s| s == name);

    for (index, stack) in order.iter().enumerate() {
        for dep in plan.dependencies_of(stack) {
            let dep_index = position(dep);
            assert!(
                dep_index.is_some_and(|d| d < index),
                "'{stack}' is ordered before its dependency '{dep}': {order:?}"
            );
        }
    }
}

/// Asserts the outcome status of one stack.
pub fn assert_stack_status(report: &DeploymentReport, stack: &str, expected: StackStatus) {
    let outcome = report
        .outcome(stack)
        .unwrap_or_else(|| panic!("No outcome for stack '{stack}'"));
    assert_eq!(
        outcome.status, expected,
        "Stack '{stack}' has status {:?}, error: {:?}",
        outcome.status, outcome.error
    );
}

/// Asserts a stack published `key` with `value`.
pub fn assert_published(report: &DeploymentReport, stack: &str, key: &str, value: &str) {
    let published = report
        .outcome(stack)
        .and_then(|o| o.deployment.as_ref())
        .and_then(|d| d.published.get(key));
    assert_eq!(
        published.map(String::as_str),
        Some(value),
        "Stack '{stack}' did not publish '{key}' = '{value}'"
    );
}

/// Asserts the events recorded for `stack`, in order.
pub fn assert_stack_events(events: &CollectingEventSink, stack: &str, expected: &[&str]) {
    let actual: Vec<String> = events
        .events()
        .into_iter()
        .filter(|(_, payload)| payload["stack"] == stack)
        .map(|(event_type, _)| event_type)
        .collect();
    assert_eq!(actual, expected, "Unexpected events for stack '{stack}'");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, EventSink};
    use crate::plan::{DeploymentPlanBuilder, StackSpec};
    use crate::stacks::EmptyStackBuilder;
    use crate::testing::{RecordingStackBuilder, TestDeployment};
    use std::sync::Arc;

    fn chain() -> DeploymentPlan {
        let mut builder = DeploymentPlanBuilder::new("chain");
        builder
            .declare(
                StackSpec::new("auth", Arc::new(RecordingStackBuilder::new().publishing("user-pool-id", "up-1")))
                    .with_export("user-pool-id"),
            )
            .unwrap();
        builder
            .declare(StackSpec::new("search", Arc::new(EmptyStackBuilder)).with_dependency("auth"))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_assert_order_respects_dependencies() {
        assert_order_respects_dependencies(&chain());
    }

    #[tokio::test]
    async fn test_report_assertions() {
        let fixture = TestDeployment::new(chain());
        let report = fixture.deployer.deploy().await;

        assert_stack_status(&report, "auth", StackStatus::Deployed);
        assert_published(&report, "auth", "user-pool-id", "up-1");
        assert_stack_events(
            &fixture.events,
            "auth",
            &[events::STACK_STARTED, events::PARAMETER_PUBLISHED, events::STACK_DEPLOYED],
        );
    }

    #[tokio::test]
    #[should_panic(expected = "Unexpected events")]
    async fn test_assert_stack_events_mismatch() {
        let sink = CollectingEventSink::new();
        sink.emit(events::STACK_FAILED, serde_json::json!({"stack": "ecs"})).await;
        assert_stack_events(&sink, "ecs", &[events::STACK_DEPLOYED]);
    }
}
