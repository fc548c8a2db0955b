//! Object bucket purge.

use super::CleanupReport;
use crate::errors::CleanupError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// A bucket as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSummary {
    /// Bucket name, in the provider's casing.
    pub name: String,
    /// When the bucket was created.
    pub created_at: DateTime<Utc>,
}

/// The storage operations a purge needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    /// Lists every bucket of the account.
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, CleanupError>;

    /// Deletes every object of a bucket and returns how many there were.
    async fn delete_all_objects(&self, bucket: &str) -> Result<usize, CleanupError>;

    /// Deletes an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> Result<(), CleanupError>;
}

/// Empties and deletes every bucket whose name matches `name` ignoring case.
///
/// A bucket that does not exist is reported with `removed: false`.
///
/// # Errors
///
/// Returns the first provider error.
pub async fn purge_bucket(api: &dyn ObjectStorageApi, name: &str) -> Result<CleanupReport, CleanupError> {
    let wanted = name.to_lowercase();
    let matches: Vec<BucketSummary> = api
        .list_buckets()
        .await?
        .into_iter()
        .filter(|b| b.name.to_lowercase() == wanted)
        .collect();

    if matches.is_empty() {
        info!(bucket = name, "Bucket not found, nothing to purge");
        return Ok(CleanupReport::not_found(name));
    }

    let mut items_deleted = 0;
    for bucket in matches {
        let objects = api.delete_all_objects(&bucket.name).await?;
        api.delete_bucket(&bucket.name).await?;
        info!(
            bucket = %bucket.name,
            created_at = %bucket.created_at,
            objects,
            "Bucket purged"
        );
        items_deleted += objects;
    }

    Ok(CleanupReport {
        resource: name.to_string(),
        items_deleted,
        removed: true,
    })
}

#[derive(Debug)]
struct StoredBucket {
    created_at: DateTime<Utc>,
    objects: BTreeMap<String, Vec<u8>>,
}

/// In-process object storage.
#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    buckets: Mutex<BTreeMap<String, StoredBucket>>,
}

impl InMemoryObjectStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bucket if it does not exist.
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .lock()
            .entry(bucket.to_string())
            .or_insert_with(|| StoredBucket {
                created_at: Utc::now(),
                objects: BTreeMap::new(),
            });
    }

    /// Writes an object, creating the bucket if needed.
    pub fn put_object(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.create_bucket(bucket);
        if let Some(stored) = self.buckets.lock().get_mut(bucket) {
            stored.objects.insert(key.to_string(), body.into());
        }
    }

    /// Returns true if the bucket exists.
    #[must_use]
    pub fn contains(&self, bucket: &str) -> bool {
        self.buckets.lock().contains_key(bucket)
    }
}

#[async_trait]
impl ObjectStorageApi for InMemoryObjectStorage {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, CleanupError> {
        Ok(self
            .buckets
            .lock()
            .iter()
            .map(|(name, stored)| BucketSummary {
                name: name.clone(),
                created_at: stored.created_at,
            })
            .collect())
    }

    async fn delete_all_objects(&self, bucket: &str) -> Result<usize, CleanupError> {
        let mut buckets = self.buckets.lock();
        let stored = buckets
            .get_mut(bucket)
            .ok_or_else(|| CleanupError::new(bucket, "bucket does not exist"))?;
        let count = stored.objects.len();
        stored.objects.clear();
        Ok(count)
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), CleanupError> {
        let mut buckets = self.buckets.lock();
        match buckets.get(bucket) {
            None => Err(CleanupError::new(bucket, "bucket does not exist")),
            Some(stored) if !stored.objects.is_empty() => {
                Err(CleanupError::new(bucket, "bucket is not empty"))
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }
}
