//! Container registry purge.

use super::CleanupReport;
use crate::errors::CleanupError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One image as described by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetail {
    /// Content digest.
    pub digest: String,
    /// Tags pointing at the digest. May be empty.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Identifies an image for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId {
    /// Content digest.
    pub digest: String,
    /// Tag, or `None` for an untagged image.
    pub tag: Option<String>,
}

/// The registry operations a purge needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRegistryApi: Send + Sync {
    /// Lists the images of a repository.
    async fn describe_images(&self, repository: &str) -> Result<Vec<ImageDetail>, CleanupError>;

    /// Deletes images by id.
    async fn batch_delete_image(&self, repository: &str, ids: Vec<ImageId>) -> Result<(), CleanupError>;

    /// Deletes an empty repository.
    async fn delete_repository(&self, repository: &str) -> Result<(), CleanupError>;
}

/// Deletes every image of `repository`, then the repository.
///
/// Each tag becomes its own (digest, tag) pair. The batch delete is skipped
/// when the repository is already empty.
///
/// # Errors
///
/// Returns the first provider error.
pub async fn purge_repository(
    api: &dyn ContainerRegistryApi,
    repository: &str,
) -> Result<CleanupReport, CleanupError> {
    let images = api.describe_images(repository).await?;

    let mut ids = Vec::new();
    for image in images {
        if image.tags.is_empty() {
            ids.push(ImageId {
                digest: image.digest,
                tag: None,
            });
            continue;
        }
        for tag in image.tags {
            ids.push(ImageId {
                digest: image.digest.clone(),
                tag: Some(tag),
            });
        }
    }

    let items_deleted = ids.len();
    debug!(repository, images = items_deleted, "Deleting images");
    if !ids.is_empty() {
        api.batch_delete_image(repository, ids).await?;
    }

    api.delete_repository(repository).await?;
    info!(repository, images = items_deleted, "Repository purged");

    Ok(CleanupReport {
        resource: repository.to_string(),
        items_deleted,
        removed: true,
    })
}

/// In-process registry.
#[derive(Debug, Default)]
pub struct InMemoryContainerRegistry {
    repositories: Mutex<BTreeMap<String, Vec<ImageDetail>>>,
}

impl InMemoryContainerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an image, creating the repository if needed.
    pub fn push(&self, repository: &str, digest: &str, tags: &[&str]) {
        self.repositories
            .lock()
            .entry(repository.to_string())
            .or_default()
            .push(ImageDetail {
                digest: digest.to_string(),
                tags: tags.iter().map(|t| (*t).to_string()).collect(),
            });
    }

    /// Returns true if the repository exists.
    #[must_use]
    pub fn contains(&self, repository: &str) -> bool {
        self.repositories.lock().contains_key(repository)
    }

    fn missing(repository: &str) -> CleanupError {
        CleanupError::new(repository, "repository does not exist")
    }
}

#[async_trait]
impl ContainerRegistryApi for InMemoryContainerRegistry {
    async fn describe_images(&self, repository: &str) -> Result<Vec<ImageDetail>, CleanupError> {
        self.repositories
            .lock()
            .get(repository)
            .cloned()
            .ok_or_else(|| Self::missing(repository))
    }

    async fn batch_delete_image(&self, repository: &str, ids: Vec<ImageId>) -> Result<(), CleanupError> {
        let mut repositories = self.repositories.lock();
        let images = repositories
            .get_mut(repository)
            .ok_or_else(|| Self::missing(repository))?;

        for id in ids {
            match id.tag {
                Some(tag) => {
                    if let Some(image) = images.iter_mut().find(|i| i.digest == id.digest) {
                        image.tags.retain(|t| *t != tag);
                    }
                    images.retain(|i| i.digest != id.digest || !i.tags.is_empty());
                }
                None => images.retain(|i| i.digest != id.digest),
            }
        }
        Ok(())
    }

    async fn delete_repository(&self, repository: &str) -> Result<(), CleanupError> {
        let mut repositories = self.repositories.lock();
        match repositories.get(repository) {
            None => Err(Self::missing(repository)),
            Some(images) if !images.is_empty() => Err(CleanupError::new(
                repository,
                format!("repository still contains {} images", images.len()),
            )),
            Some(_) => {
                repositories.remove(repository);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_purge_repository_with_images() {
        let registry = InMemoryContainerRegistry::new();
        registry.push("ecs-in-elk", "sha256:aaa", &["latest", "v1"]);
        registry.push("ecs-in-elk", "sha256:bbb", &[]);

        let report = purge_repository(&registry, "ecs-in-elk").await.unwrap();

        assert_eq!(report.items_deleted, 3);
        assert!(report.removed);
        assert!(!registry.contains("ecs-in-elk"));
    }

    #[tokio::test]
    async fn test_delete_repository_refuses_images() {
        let registry = InMemoryContainerRegistry::new();
        registry.push("app", "sha256:aaa", &["latest"]);

        let err = registry.delete_repository("app").await.unwrap_err();
        assert!(err.message.contains("1 images"));
    }

    #[tokio::test]
    async fn test_purge_missing_repository_fails() {
        let registry = InMemoryContainerRegistry::new();
        let err = purge_repository(&registry, "nope").await.unwrap_err();
        assert_eq!(err.resource, "nope");
    }

    #[tokio::test]
    async fn test_empty_repository_skips_batch_delete() {
        let mut api = MockContainerRegistryApi::new();
        api.expect_describe_images()
            .with(eq("ecs-in-elk"))
            .times(1)
            .returning(|_| Ok(Vec::new()));
        api.expect_batch_delete_image().never();
        api.expect_delete_repository()
            .with(eq("ecs-in-elk"))
            .times(1)
            .returning(|_| Ok(()));

        let report = purge_repository(&api, "ecs-in-elk").await.unwrap();
        assert_eq!(report.items_deleted, 0);
    }

    #[tokio::test]
    async fn test_pairs_every_tag_with_its_digest() {
        let mut api = MockContainerRegistryApi::new();
        api.expect_describe_images().returning(|_| {
            Ok(vec![ImageDetail {
                digest: "sha256:aaa".to_string(),
                tags: vec!["latest".to_string(), "v2".to_string()],
            }])
        });
        api.expect_batch_delete_image()
            .withf(|repo, ids| {
                repo == "app"
                    && *ids
                        == [
                            ImageId {
                                digest: "sha256:aaa".to_string(),
                                tag: Some("latest".to_string()),
                            },
                            ImageId {
                                digest: "sha256:aaa".to_string(),
                                tag: Some("v2".to_string()),
                            },
                        ]
            })
            .times(1)
            .returning(|_, _| Ok(()));
        api.expect_delete_repository()
            .returning(|repo| Err(CleanupError::new(repo, "access denied")));

        let err = purge_repository(&api, "app").await.unwrap_err();
        assert_eq!(err.message, "access denied");
    }
}
