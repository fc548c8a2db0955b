//! Shared parameter store.
//!
//! A single mutable key-value namespace per deployment target. There is no
//! transactional isolation: a read returns the last successfully published
//! value, with no freshness guarantee.

use super::{ParameterKey, ParameterValue};
use crate::errors::{ParameterNotFoundError, ParameterStoreError};
use crate::target::DeploymentTarget;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

/// A value as held by the store, with its write history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredParameter {
    /// The key.
    pub key: ParameterKey,
    /// The current value.
    pub value: ParameterValue,
    /// Incremented on every overwrite, starting at 1.
    pub version: u64,
    /// When the current version was written.
    pub last_modified: DateTime<Utc>,
}

/// A namespaced key-value store reachable by every stack.
#[async_trait]
pub trait ParameterStore: Send + Sync + Debug {
    /// Writes a value, overwriting any previous one (last write wins).
    async fn put(
        &self,
        target: &DeploymentTarget,
        key: &ParameterKey,
        value: ParameterValue,
    ) -> Result<StoredParameter, ParameterStoreError>;

    /// Reads the last written value.
    ///
    /// Fails with `ParameterStoreError::NotFound` if the key was never
    /// written in this target.
    async fn get(
        &self,
        target: &DeploymentTarget,
        key: &ParameterKey,
    ) -> Result<StoredParameter, ParameterStoreError>;

    /// Deletes a key. Returns whether it existed.
    async fn delete(
        &self,
        target: &DeploymentTarget,
        key: &ParameterKey,
    ) -> Result<bool, ParameterStoreError>;

    /// Lists every parameter of a target, sorted by key.
    async fn list(&self, target: &DeploymentTarget) -> Result<Vec<StoredParameter>, ParameterStoreError>;
}

/// In-process store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    entries: DashMap<(DeploymentTarget, ParameterKey), StoredParameter>,
}

impl InMemoryParameterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn put(
        &self,
        target: &DeploymentTarget,
        key: &ParameterKey,
        value: ParameterValue,
    ) -> Result<StoredParameter, ParameterStoreError> {
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry((target.clone(), key.clone()))
            .or_insert_with(|| StoredParameter {
                key: key.clone(),
                value: value.clone(),
                version: 0,
                last_modified: now,
            });

        entry.value = value;
        entry.version += 1;
        entry.last_modified = now;

        debug!(target = %target, key = %key, version = entry.version, "Parameter stored");
        Ok(entry.clone())
    }

    async fn get(
        &self,
        target: &DeploymentTarget,
        key: &ParameterKey,
    ) -> Result<StoredParameter, ParameterStoreError> {
        self.entries
            .get(&(target.clone(), key.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ParameterNotFoundError::new(key.as_str(), target.to_string()).into())
    }

    async fn delete(
        &self,
        target: &DeploymentTarget,
        key: &ParameterKey,
    ) -> Result<bool, ParameterStoreError> {
        Ok(self.entries.remove(&(target.clone(), key.clone())).is_some())
    }

    async fn list(&self, target: &DeploymentTarget) -> Result<Vec<StoredParameter>, ParameterStoreError> {
        let mut params: Vec<StoredParameter> = self
            .entries
            .iter()
            .filter(|entry| &entry.key().0 == target)
            .map(|entry| entry.value().clone())
            .collect();
        params.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ParameterKey {
        ParameterKey::new(name).unwrap()
    }

    fn target() -> DeploymentTarget {
        DeploymentTarget::new("123456789012", "us-east-1")
    }

    #[tokio::test]
    async fn test_get_before_put_is_not_found() {
        let store = InMemoryParameterStore::new();
        let err = store.get(&target(), &key("user-pool-id")).await.unwrap_err();

        assert!(matches!(err, ParameterStoreError::NotFound(ref e) if e.key == "user-pool-id"));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = InMemoryParameterStore::new();
        let k = key("user-pool-id");

        store.put(&target(), &k, ParameterValue::string("v1")).await.unwrap();
        let second = store.put(&target(), &k, ParameterValue::string("v2")).await.unwrap();

        assert_eq!(second.version, 2);
        let read = store.get(&target(), &k).await.unwrap();
        assert_eq!(read.value.as_str(), "v2");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_targets_are_isolated() {
        let store = InMemoryParameterStore::new();
        let other = DeploymentTarget::new("123456789012", "eu-west-1");
        let k = key("user-pool-id");

        store.put(&target(), &k, ParameterValue::string("east")).await.unwrap();

        assert!(store.get(&other, &k).await.is_err());
        assert_eq!(store.list(&other).await.unwrap().len(), 0);
        assert_eq!(store.list(&target()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryParameterStore::new();
        let k = key("identity-pool-id");

        store.put(&target(), &k, ParameterValue::string("ip")).await.unwrap();
        assert!(store.delete(&target(), &k).await.unwrap());
        assert!(!store.delete(&target(), &k).await.unwrap());
        assert!(store.is_empty());
    }
}
