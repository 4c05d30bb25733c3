//! Removal of classified containers and images

use serde::Serialize;
use std::sync::Arc;
use undertaker_core::{ContainerId, ImageId};
use undertaker_engine::ClassificationResult;

use crate::backend::RuntimeBackend;

/// A removal the runtime refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReapFailure {
    /// Container or image id
    pub id: String,
    /// Runtime error text
    pub message: String,
}

/// What a [`Reaper`] actually removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Containers removed, in order
    pub containers: Vec<ContainerId>,
    /// Images removed, in order
    pub images: Vec<ImageId>,
    /// Removals that failed
    pub failures: Vec<ReapFailure>,
}

impl ReapReport {
    /// Check if every removal succeeded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Carries out a classification against a runtime
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::SystemTime;
/// use undertaker_engine::Classifier;
/// use undertaker_runtime::{MemoryRuntime, Reaper, RuntimeBackend, Snapshot};
///
/// # tokio_test::block_on(async {
/// let runtime = Arc::new(MemoryRuntime::new(Snapshot::default()));
/// let snapshot = runtime.snapshot().await.unwrap();
/// let result = Classifier::default().classify(&snapshot, SystemTime::now());
///
/// let report = Reaper::new(runtime).reap(&result).await;
/// assert!(report.is_clean());
/// # });
/// ```
pub struct Reaper {
    backend: Arc<dyn RuntimeBackend>,
}

impl Reaper {
    /// Create a reaper for a backend
    #[must_use]
    pub fn new(backend: Arc<dyn RuntimeBackend>) -> Self {
        Self { backend }
    }

    /// Remove every listed container, then every listed image.
    ///
    /// Containers go first because the runtime refuses to remove an image a
    /// container still references. A failed removal is logged and recorded;
    /// the rest continue.
    pub async fn reap(&self, result: &ClassificationResult) -> ReapReport {
        let mut report = ReapReport::default();

        for container in &result.containers {
            match self.backend.remove_container(&container.id).await {
                Ok(()) => {
                    tracing::info!(
                        container_id = %container.id,
                        name = %container.name,
                        "Removed container"
                    );
                    report.containers.push(container.id.clone());
                }
                Err(err) => {
                    tracing::warn!(
                        container_id = %container.id,
                        error = %err,
                        "Failed to remove container"
                    );
                    report.failures.push(ReapFailure {
                        id: container.id.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        for image in &result.images {
            match self.backend.remove_image(&image.id).await {
                Ok(()) => {
                    tracing::info!(
                        image_id = %image.id,
                        tags = ?image.repo_tags,
                        "Removed image"
                    );
                    report.images.push(image.id.clone());
                }
                Err(err) => {
                    tracing::warn!(image_id = %image.id, error = %err, "Failed to remove image");
                    report.failures.push(ReapFailure {
                        id: image.id.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            containers = report.containers.len(),
            images = report.images.len(),
            failures = report.failures.len(),
            "Reap complete"
        );

        report
    }
}

impl std::fmt::Debug for Reaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaper").finish_non_exhaustive()
    }
}
