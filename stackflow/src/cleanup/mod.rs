//! Force-delete utilities for resources that teardown leaves behind.
//!
//! A repository holding images and a bucket holding objects both refuse to be
//! deleted by the engine. These helpers empty them first and then remove them
//! through narrow provider traits, so they can run against any backend.

mod registry;
mod storage;

pub use registry::{purge_repository, ContainerRegistryApi, ImageDetail, ImageId, InMemoryContainerRegistry};
pub use storage::{purge_bucket, BucketSummary, InMemoryObjectStorage, ObjectStorageApi};

use serde::{Deserialize, Serialize};

/// What a purge removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// The repository or bucket name that was asked for.
    pub resource: String,
    /// Images or objects deleted before the container itself.
    pub items_deleted: usize,
    /// Whether the container was found and deleted.
    pub removed: bool,
}

impl CleanupReport {
    fn not_found(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            items_deleted: 0,
            removed: false,
        }
    }
}
