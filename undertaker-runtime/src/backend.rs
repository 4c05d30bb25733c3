//! Runtime backend trait for pluggable implementations

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use undertaker_core::{ContainerId, Error, ImageId, ImageRef, Result};
use undertaker_engine::Snapshot;

/// Trait for container runtime backends
///
/// This allows for different implementations:
/// - [`DockerRuntime`](crate::DockerRuntime) - Docker Engine API
/// - [`MemoryRuntime`] - In-memory records, for tests and saved snapshots
///
/// # Thread Safety
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait RuntimeBackend: Send + Sync {
    /// Fetch every container and every top-level image.
    ///
    /// A record the backend cannot fully describe is still returned, with
    /// [`ImageRef::Unavailable`] as its image, so that the engine reports it
    /// instead of guessing.
    ///
    /// # Errors
    /// Returns error if the runtime cannot be listed at all
    async fn snapshot(&self) -> Result<Snapshot>;

    /// Remove a stopped container
    ///
    /// # Errors
    /// Returns error if the container cannot be removed
    async fn remove_container(&self, id: &ContainerId) -> Result<()>;

    /// Remove an image
    ///
    /// # Errors
    /// Returns error if the image cannot be removed
    async fn remove_image(&self, id: &ImageId) -> Result<()>;
}

/// In-memory backend (doesn't talk to a runtime)
///
/// Behaves like a runtime that refuses to remove an image while a container
/// still uses it, so removal order matters the same way it does in Docker.
///
/// # Example
/// ```
/// use undertaker_runtime::{MemoryRuntime, RuntimeBackend, Snapshot};
///
/// # tokio_test::block_on(async {
/// let runtime = MemoryRuntime::new(Snapshot::default());
/// let snapshot = runtime.snapshot().await.unwrap();
/// assert!(snapshot.containers.is_empty());
/// # });
/// ```
#[derive(Clone)]
pub struct MemoryRuntime {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    snapshot: Snapshot,
    failing: BTreeSet<String>,
    removed_containers: Vec<ContainerId>,
    removed_images: Vec<ImageId>,
    call_count: usize,
}

impl MemoryRuntime {
    /// Create a runtime holding `snapshot`
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                snapshot,
                ..MemoryState::default()
            })),
        }
    }

    /// Make removal of the container or image with this id fail
    pub async fn fail_removal_of(&self, id: impl Into<String>) {
        self.state.lock().await.failing.insert(id.into());
    }

    /// Get the number of backend calls made (for testing)
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.call_count
    }

    /// Containers removed so far, in removal order
    pub async fn removed_containers(&self) -> Vec<ContainerId> {
        self.state.lock().await.removed_containers.clone()
    }

    /// Images removed so far, in removal order
    pub async fn removed_images(&self) -> Vec<ImageId> {
        self.state.lock().await.removed_images.clone()
    }
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

impl std::fmt::Debug for MemoryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRuntime").finish_non_exhaustive()
    }
}

#[async_trait]
impl RuntimeBackend for MemoryRuntime {
    async fn snapshot(&self) -> Result<Snapshot> {
        let mut state = self.state.lock().await;
        state.call_count += 1;

        tracing::debug!(
            containers = state.snapshot.containers.len(),
            images = state.snapshot.images.len(),
            "Memory: Snapshot"
        );

        Ok(state.snapshot.clone())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.call_count += 1;

        if state.failing.contains(id.as_str()) {
            return Err(Error::Runtime {
                message: format!("removal of container {id} refused"),
            });
        }

        let before = state.snapshot.containers.len();
        state.snapshot.containers.retain(|c| &c.id != id);
        if state.snapshot.containers.len() == before {
            return Err(Error::Runtime {
                message: format!("no such container: {id}"),
            });
        }

        state.removed_containers.push(id.clone());
        tracing::debug!(container_id = %id, "Memory: Removed container");

        Ok(())
    }

    async fn remove_image(&self, id: &ImageId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.call_count += 1;

        if state.failing.contains(id.as_str()) {
            return Err(Error::Runtime {
                message: format!("removal of image {id} refused"),
            });
        }

        let in_use_by = state.snapshot.containers.iter().find(|c| match &c.image {
            ImageRef::Id(image) => image == id,
            ImageRef::Reference(reference) => {
                id.matches_reference(reference)
                    || state
                        .snapshot
                        .images
                        .iter()
                        .any(|i| &i.id == id && i.repo_tags.contains(reference))
            }
            ImageRef::Unavailable(_) => false,
        });
        if let Some(container) = in_use_by {
            return Err(Error::Runtime {
                message: format!("image {id} is being used by container {}", container.id),
            });
        }

        let before = state.snapshot.images.len();
        state.snapshot.images.retain(|i| &i.id != id);
        if state.snapshot.images.len() == before {
            return Err(Error::Runtime {
                message: format!("no such image: {id}"),
            });
        }

        state.removed_images.push(id.clone());
        tracing::debug!(image_id = %id, "Memory: Removed image");

        Ok(())
    }
}
