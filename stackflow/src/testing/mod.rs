//! Testing utilities for stackflow deployments.
//!
//! This module provides:
//! - Recording and failing stack builders
//! - A deployer fixture wired to in-memory collaborators
//! - Assertions over plans, reports and events

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_order_respects_dependencies, assert_published, assert_stack_events,
    assert_stack_status,
};
pub use fixtures::{test_target, TestDeployment};
pub use mocks::{FailingStackBuilder, RecordingStackBuilder};
