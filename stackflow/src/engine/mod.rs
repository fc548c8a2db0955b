//! The provisioning engine seam.
//!
//! The engine turns a [`StackTemplate`] into real resources and reports the
//! attribute values the stack's outputs and parameters refer to. Its errors
//! are opaque and are propagated to the caller unchanged.

mod memory;

pub use memory::{EngineCall, InMemoryEngine};

use crate::errors::ProvisioningError;
use crate::resources::{ResolvedAttributes, StackTemplate};
use crate::target::DeploymentTarget;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// What the engine reports after provisioning a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// The stack that was provisioned.
    pub stack_name: String,
    /// Attribute values keyed by logical id, then attribute name.
    pub attributes: ResolvedAttributes,
    /// True if the template matched the last deployed one.
    pub unchanged: bool,
    /// Fingerprint of the provisioned template.
    pub fingerprint: String,
}

impl ProvisionReport {
    /// Looks up one attribute.
    #[must_use]
    pub fn attribute(&self, logical_id: &str, attribute: &str) -> Option<&str> {
        self.attributes
            .get(logical_id)
            .and_then(|attrs| attrs.get(attribute))
            .map(String::as_str)
    }
}

/// Trait for provisioning engines.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync + Debug {
    /// Creates or updates the stack described by `template`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects or fails the stack.
    async fn provision(&self, template: &StackTemplate) -> Result<ProvisionReport, ProvisioningError>;

    /// Tears down a stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to remove the stack.
    async fn destroy(&self, target: &DeploymentTarget, stack_name: &str) -> Result<(), ProvisioningError>;
}
