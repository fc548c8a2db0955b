//! Failure handling modes for a deployment.
//!
//! A failed stack never takes down stacks that already deployed. What happens
//! to the rest of the plan is decided by the [`FailureMode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How to handle stack failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop the deployment on first failure (default).
    #[default]
    FailFast,
    /// Record failure, skip only stacks that depend on a failed one.
    ContinueOnFailure,
    /// Attempt every stack, collect all failures.
    BestEffort,
}

impl std::str::FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Ok(Self::FailFast),
            "continue_on_failure" => Ok(Self::ContinueOnFailure),
            "best_effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown failure mode '{other}'")),
        }
    }
}

/// Record of a stack failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stack name.
    pub stack: String,
    /// Error message.
    pub error: String,
    /// Error type name.
    pub error_type: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Additional context.
    pub context: HashMap<String, serde_json::Value>,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stack: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            error: error.into(),
            error_type: "Error".to_string(),
            timestamp: Utc::now(),
            context: HashMap::new(),
        }
    }

    /// Sets the error type.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    /// Adds context.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Summary of failures during a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Total number of stacks.
    pub total_stacks: usize,
    /// Number of deployed stacks.
    pub completed_stacks: usize,
    /// Number of failed stacks.
    pub failed_stacks: usize,
    /// Number of stacks skipped because of earlier failures.
    pub skipped_stacks: usize,
    /// List of failure records.
    pub failures: Vec<FailureRecord>,
}

impl FailureSummary {
    /// Returns the success rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_stacks == 0 {
            return 0.0;
        }
        self.completed_stacks as f64 / self.total_stacks as f64
    }

    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Collects failures and decides which stacks may still run.
#[derive(Debug)]
pub struct FailureCollector {
    /// Failure mode.
    pub mode: FailureMode,
    failures: Vec<FailureRecord>,
    failed_stacks: HashSet<String>,
    skipped_stacks: HashSet<String>,
    completed_stacks: HashSet<String>,
}

impl FailureCollector {
    /// Creates a new failure collector.
    #[must_use]
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
            failed_stacks: HashSet::new(),
            skipped_stacks: HashSet::new(),
            completed_stacks: HashSet::new(),
        }
    }

    /// Records a stack failure.
    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failed_stacks.insert(record.stack.clone());
        self.failures.push(record);
    }

    /// Records a stack that was not attempted.
    pub fn record_skip(&mut self, stack: &str) {
        self.skipped_stacks.insert(stack.to_string());
    }

    /// Records a stack completion.
    pub fn record_completion(&mut self, stack: &str) {
        self.completed_stacks.insert(stack.to_string());
    }

    /// Returns true if the stack has failed.
    #[must_use]
    pub fn has_failed(&self, stack: &str) -> bool {
        self.failed_stacks.contains(stack)
    }

    /// Returns true if the deployment should stop.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        match self.mode {
            FailureMode::FailFast => !self.failures.is_empty(),
            FailureMode::ContinueOnFailure | FailureMode::BestEffort => false,
        }
    }

    /// Returns true if a stack with these upstream stacks can run.
    ///
    /// `upstream` should be the transitive dependencies so that a skipped
    /// stack also blocks its own dependents.
    #[must_use]
    pub fn can_run<'a>(&self, upstream: impl IntoIterator<Item = &'a String>) -> bool {
        match self.mode {
            FailureMode::FailFast => self.failures.is_empty(),
            FailureMode::ContinueOnFailure => upstream
                .into_iter()
                .all(|dep| !self.failed_stacks.contains(dep) && !self.skipped_stacks.contains(dep)),
            FailureMode::BestEffort => true,
        }
    }

    /// Creates a summary of the deployment.
    #[must_use]
    pub fn summary(&self, total_stacks: usize) -> FailureSummary {
        FailureSummary {
            total_stacks,
            completed_stacks: self.completed_stacks.len(),
            failed_stacks: self.failed_stacks.len(),
            skipped_stacks: self.skipped_stacks.len(),
            failures: self.failures.clone(),
        }
    }

    /// Returns all failures.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }
}

impl Default for FailureCollector {
    fn default() -> Self {
        Self::new(FailureMode::default())
    }
}
