//! Deployment reports.

use crate::plan::FailureSummary;
use crate::target::DeploymentTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Final status of one stack in a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    /// Provisioned with changes.
    Deployed,
    /// Provisioned, the engine reported no changes.
    Unchanged,
    /// Build, provisioning or publishing failed.
    Failed,
    /// Not attempted because of an earlier failure.
    Skipped,
}

impl StackStatus {
    /// Returns true for statuses that leave the stack deployed.
    #[must_use]
    pub fn is_deployed(self) -> bool {
        matches!(self, Self::Deployed | Self::Unchanged)
    }

    /// Returns the status as a lowercase string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// What a successful stack deployment produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDeployment {
    /// Stack name.
    pub stack: String,
    /// Template fingerprint.
    pub fingerprint: String,
    /// True if the engine reported no changes.
    pub unchanged: bool,
    /// Number of resources, counting published parameters.
    pub resource_count: usize,
    /// Published parameters and their resolved values.
    pub published: BTreeMap<String, String>,
    /// Resolved stack outputs.
    pub outputs: BTreeMap<String, String>,
}

/// Outcome of one stack in a deployment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOutcome {
    /// Stack name.
    pub stack: String,
    /// Final status.
    pub status: StackStatus,
    /// Time spent on the stack in milliseconds.
    pub duration_ms: f64,
    /// Details when the stack deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<StackDeployment>,
    /// Error message when the stack failed or was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a deployment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// Deployment name.
    pub deployment: String,
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Where the stacks were deployed.
    pub target: DeploymentTarget,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total duration in milliseconds.
    pub duration_ms: f64,
    /// Per-stack outcomes in deployment order.
    pub stacks: Vec<StackOutcome>,
    /// Failure summary.
    pub summary: FailureSummary,
}

impl DeploymentReport {
    /// Returns true if every stack deployed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.stacks.iter().all(|s| s.status.is_deployed())
    }

    /// Returns the outcome of a stack.
    #[must_use]
    pub fn outcome(&self, stack: &str) -> Option<&StackOutcome> {
        self.stacks.iter().find(|s| s.stack == stack)
    }

    /// Returns the names of stacks with the given status.
    #[must_use]
    pub fn stacks_with_status(&self, status: StackStatus) -> Vec<&str> {
        self.stacks
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.stack.as_str())
            .collect()
    }
}
