//! # Stackflow
//!
//! Declarative cloud deployments as a graph of named stacks.
//!
//! Stackflow provides:
//!
//! - **Stack registry**: declare stacks, their dependencies and the parameters
//!   they publish and read
//! - **Dependency ordering**: a deterministic topological order with cycle
//!   detection and static checks on parameter flow
//! - **Parameter exchange**: values published by one stack reach its
//!   dependents in memory and are written to a shared store for later runs
//! - **Deployment**: sequential provisioning through a pluggable engine with
//!   configurable failure handling, events and tracing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackflow::prelude::*;
//!
//! let mut plan = DeploymentPlanBuilder::new("ecs-elk");
//! plan.declare(StackSpec::new("auth", auth).with_export("user-pool-id"))?;
//! plan.declare(
//!     StackSpec::new("search", search)
//!         .with_dependency("auth")
//!         .with_requirement("user-pool-id"),
//! )?;
//!
//! let deployer = Deployer::new(plan.build()?, engine, store, target);
//! let report = deployer.deploy().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod blueprint;
pub mod cleanup;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod events;
pub mod observability;
pub mod params;
pub mod plan;
pub mod resources;
pub mod stacks;
pub mod target;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BlueprintConfig, DeploymentConfig};
    pub use crate::deploy::{Deployer, DeploymentReport, StackOutcome, StackStatus};
    pub use crate::engine::{InMemoryEngine, ProvisionReport, ProvisioningEngine};
    pub use crate::errors::{
        ContractErrorInfo, CycleDetectedError, ParameterConflictError, ParameterNotFoundError,
        PlanError, ProvisioningError, StackBuildError, StackflowError, UndeclaredDependencyError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::params::{
        InMemoryParameterStore, ParameterExchange, ParameterKey, ParameterStore, ParameterValue,
    };
    pub use crate::plan::{DeploymentPlan, DeploymentPlanBuilder, FailureMode, StackSpec};
    pub use crate::resources::{PolicyStatement, Principal, ResourceSpec, RoleSpec, StackTemplate};
    pub use crate::stacks::{FnStackBuilder, StackBuilder, StackContext};
    pub use crate::target::DeploymentTarget;
}
