//! Span attributes and timing for deployments.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Span attributes for a deployment run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentSpanAttributes {
    /// Deployment name.
    pub deployment_name: Option<String>,
    /// Deployment run ID.
    pub run_id: Option<String>,
    /// Target account.
    pub account: Option<String>,
    /// Target region.
    pub region: Option<String>,
    /// Failure mode.
    pub failure_mode: Option<String>,
}

impl DeploymentSpanAttributes {
    /// Creates new deployment span attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deployment name.
    #[must_use]
    pub fn with_deployment_name(mut self, name: impl Into<String>) -> Self {
        self.deployment_name = Some(name.into());
        self
    }

    /// Sets the run ID.
    #[must_use]
    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    /// Sets the account and region.
    #[must_use]
    pub fn with_target(mut self, account: impl Into<String>, region: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self.region = Some(region.into());
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: impl Into<String>) -> Self {
        self.failure_mode = Some(mode.into());
        self
    }

    /// Converts to flat span attributes.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        if let Some(ref v) = self.deployment_name {
            attrs.insert("deployment.name".to_string(), v.clone());
        }
        if let Some(ref v) = self.run_id {
            attrs.insert("deployment.run_id".to_string(), v.clone());
        }
        if let Some(ref v) = self.account {
            attrs.insert("cloud.account.id".to_string(), v.clone());
        }
        if let Some(ref v) = self.region {
            attrs.insert("cloud.region".to_string(), v.clone());
        }
        if let Some(ref v) = self.failure_mode {
            attrs.insert("deployment.failure_mode".to_string(), v.clone());
        }

        attrs
    }
}

/// Span attributes for one stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackSpanAttributes {
    /// Stack name.
    pub stack_name: String,
    /// Final status.
    pub status: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Parameter keys published.
    pub published: Vec<String>,
}

impl StackSpanAttributes {
    /// Creates new stack span attributes.
    #[must_use]
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            ..Default::default()
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Sets the published keys.
    #[must_use]
    pub fn with_published(mut self, keys: Vec<String>) -> Self {
        self.published = keys;
        self
    }

    /// Converts to flat span attributes.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        attrs.insert("stack.name".to_string(), self.stack_name.clone());

        if let Some(ref v) = self.status {
            attrs.insert("stack.status".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("stack.duration_ms".to_string(), v.to_string());
        }
        if let Some(ref v) = self.error {
            attrs.insert("stack.error".to_string(), v.clone());
        }
        if !self.published.is_empty() {
            attrs.insert("stack.published".to_string(), self.published.join(","));
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}
