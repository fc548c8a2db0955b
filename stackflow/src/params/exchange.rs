//! Ownership-tracking front end over a shared parameter store.

use super::{ParameterKey, ParameterStore, ParameterValue, StoredParameter};
use crate::errors::{ParameterConflictError, ParameterStoreError, StackflowError};
use crate::target::DeploymentTarget;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A value published during the current deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedParameter {
    /// The stack that owns the key.
    pub owner: String,
    /// The latest value.
    pub value: ParameterValue,
}

/// Publishes and reads output parameters for one deployment target.
///
/// The store itself is last-write-wins. On top of it the exchange remembers
/// which stack owns each key: the owner may republish (a redeploy), any other
/// stack publishing the same key is rejected.
#[derive(Debug)]
pub struct ParameterExchange {
    target: DeploymentTarget,
    store: Arc<dyn ParameterStore>,
    published: RwLock<BTreeMap<ParameterKey, PublishedParameter>>,
}

impl ParameterExchange {
    /// Creates an exchange over a store.
    #[must_use]
    pub fn new(target: DeploymentTarget, store: Arc<dyn ParameterStore>) -> Self {
        Self {
            target,
            store,
            published: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the deployment target.
    #[must_use]
    pub fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ParameterStore> {
        &self.store
    }

    /// Publishes `value` under `key` on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns `ParameterConflictError` if another stack already published
    /// the key in this deployment, or a store error if the write fails.
    pub async fn publish_parameter(
        &self,
        owner: &str,
        key: &ParameterKey,
        value: ParameterValue,
    ) -> Result<StoredParameter, StackflowError> {
        let existing_owner = self.owner_of(key);
        if let Some(existing_owner) = existing_owner {
            if existing_owner != owner {
                return Err(ParameterConflictError::new(key.as_str(), existing_owner, owner).into());
            }
            debug!(key = %key, owner, "Republishing parameter");
        }

        let stored = self.store.put(&self.target, key, value.clone()).await?;
        self.published.write().insert(
            key.clone(),
            PublishedParameter {
                owner: owner.to_string(),
                value,
            },
        );

        info!(
            key = %key,
            owner,
            version = stored.version,
            target = %self.target,
            "Parameter published"
        );
        Ok(stored)
    }

    /// Reads the last published value of `key`.
    ///
    /// Values published in this deployment are served from memory; anything
    /// else falls through to the shared store.
    ///
    /// # Errors
    ///
    /// Returns `ParameterStoreError::NotFound` if nothing has ever published
    /// the key in this target.
    pub async fn read_parameter(&self, key: &ParameterKey) -> Result<ParameterValue, ParameterStoreError> {
        let local = self.published.read().get(key).map(|p| p.value.clone());
        if let Some(value) = local {
            return Ok(value);
        }
        Ok(self.store.get(&self.target, key).await?.value)
    }

    /// Returns the stack that published `key` in this deployment.
    #[must_use]
    pub fn owner_of(&self, key: &ParameterKey) -> Option<String> {
        self.published.read().get(key).map(|p| p.owner.clone())
    }

    /// Returns every key published by `stack` in this deployment.
    #[must_use]
    pub fn published_by(&self, stack: &str) -> Vec<ParameterKey> {
        self.published
            .read()
            .iter()
            .filter(|(_, p)| p.owner == stack)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Releases the keys of a torn down stack and deletes them from the store.
    ///
    /// # Errors
    ///
    /// Returns a store error if a delete fails.
    pub async fn retire_stack(&self, stack: &str) -> Result<Vec<ParameterKey>, ParameterStoreError> {
        let keys = self.published_by(stack);
        for key in &keys {
            self.store.delete(&self.target, key).await?;
            self.published.write().remove(key);
        }
        if !keys.is_empty() {
            info!(stack, count = keys.len(), "Retired stack parameters");
        }
        Ok(keys)
    }
}
