//! Test fixtures for deployments.

use std::sync::Arc;

use crate::deploy::Deployer;
use crate::engine::InMemoryEngine;
use crate::events::CollectingEventSink;
use crate::params::InMemoryParameterStore;
use crate::plan::{DeploymentPlan, FailureMode};
use crate::target::DeploymentTarget;

/// The account and region used throughout the tests.
#[must_use]
pub fn test_target() -> DeploymentTarget {
    DeploymentTarget::new("123456789012", "us-east-1")
}

/// A deployer wired to in-memory collaborators that stay inspectable.
#[derive(Debug)]
pub struct TestDeployment {
    /// The simulated engine.
    pub engine: Arc<InMemoryEngine>,
    /// The shared store.
    pub store: Arc<InMemoryParameterStore>,
    /// Every event emitted.
    pub events: Arc<CollectingEventSink>,
    /// The deployer under test.
    pub deployer: Deployer,
}

impl TestDeployment {
    /// Wires `plan` with fail-fast semantics.
    #[must_use]
    pub fn new(plan: DeploymentPlan) -> Self {
        Self::with_mode(plan, FailureMode::FailFast)
    }

    /// Wires `plan` with the given failure mode.
    #[must_use]
    pub fn with_mode(plan: DeploymentPlan, mode: FailureMode) -> Self {
        Self::with_store(plan, mode, Arc::new(InMemoryParameterStore::new()))
    }

    /// Wires `plan` against an existing store, as a second process would.
    #[must_use]
    pub fn with_store(plan: DeploymentPlan, mode: FailureMode, store: Arc<InMemoryParameterStore>) -> Self {
        let engine = Arc::new(InMemoryEngine::new());
        let events = Arc::new(CollectingEventSink::new());
        let deployer = Deployer::new(plan, engine.clone(), store.clone(), test_target())
            .with_event_sink(events.clone())
            .with_failure_mode(mode);
        Self {
            engine,
            store,
            events,
            deployer,
        }
    }
}
