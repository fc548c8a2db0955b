//! Deployment plan building and validation.
//!
//! This module provides:
//! - Stack specifications
//! - A plan builder that rejects invalid declarations
//! - Topological deployment order with cycle reporting
//! - Failure handling modes

mod builder;
mod failure;
mod graph;
mod spec;

pub use builder::DeploymentPlanBuilder;
pub use failure::{FailureCollector, FailureMode, FailureRecord, FailureSummary};
pub use graph::DeploymentPlan;
pub use spec::StackSpec;
