//! Docker Engine API backend

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions, RemoveContainerOptions};
use bollard::image::ListImagesOptions;
use bollard::Docker;
use undertaker_core::{
    ContainerId, ContainerRecord, ContainerStatus, Error, ImageId, ImageRecord, ImageRef, Result,
};
use undertaker_engine::Snapshot;

use crate::backend::RuntimeBackend;
use crate::canonical;

/// Request timeout for the Engine API, in seconds
const TIMEOUT_SECS: u64 = 120;

fn runtime_error(context: &str, err: &bollard::errors::Error) -> Error {
    Error::Runtime {
        message: format!("{context}: {err}"),
    }
}

/// Backend talking to a Docker daemon
pub struct DockerRuntime {
    client: Docker,
    remove_volumes: bool,
}

impl DockerRuntime {
    /// Connect to a daemon.
    ///
    /// `None` uses the local defaults (`DOCKER_HOST`, then the platform
    /// socket). Otherwise `unix://` endpoints go over the socket and
    /// `tcp://` or `http://` endpoints over plain HTTP.
    ///
    /// # Errors
    /// Returns error if the endpoint is malformed or the client cannot be built
    pub fn connect(endpoint: Option<&str>) -> Result<Self> {
        let client = match endpoint {
            None => Docker::connect_with_local_defaults()
                .map_err(|err| runtime_error("connecting to local daemon", &err))?,
            Some(endpoint) if endpoint.starts_with("unix://") => Docker::connect_with_socket(
                endpoint,
                TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
            .map_err(|err| runtime_error(endpoint, &err))?,
            Some(endpoint) if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") => {
                Docker::connect_with_http(endpoint, TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                    .map_err(|err| runtime_error(endpoint, &err))?
            }
            Some(endpoint) => {
                return Err(Error::InvalidConfig {
                    message: format!(
                        "unsupported endpoint {endpoint} (expected unix://, tcp:// or http://)"
                    ),
                });
            }
        };

        tracing::debug!(endpoint = endpoint.unwrap_or("<local defaults>"), "Docker client ready");

        Ok(Self {
            client,
            remove_volumes: false,
        })
    }

    /// Also remove anonymous volumes when removing containers
    #[must_use]
    pub fn with_remove_volumes(mut self, enable: bool) -> Self {
        self.remove_volumes = enable;
        self
    }

    /// Inspect one container for its canonical image id and exit time
    async fn describe(
        &self,
        id: &ContainerId,
        status: &ContainerStatus,
    ) -> (ImageRef, Option<std::time::SystemTime>) {
        match self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => {
                let image = details.image.as_deref().map_or_else(
                    || ImageRef::Unavailable("inspect reported no image".to_string()),
                    ImageRef::from_raw,
                );
                let finished_at = details.state.and_then(|state| state.finished_at);
                canonical::exit_state(status, image, finished_at.as_deref())
            }
            Err(err) => {
                tracing::warn!(container_id = %id, error = %err, "Inspect failed");
                (ImageRef::Unavailable(format!("inspect failed: {err}")), None)
            }
        }
    }
}

impl std::fmt::Debug for DockerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerRuntime")
            .field("remove_volumes", &self.remove_volumes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RuntimeBackend for DockerRuntime {
    async fn snapshot(&self) -> Result<Snapshot> {
        let summaries = self
            .client
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|err| runtime_error("listing containers", &err))?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(raw_id) = summary.id else {
                tracing::warn!("Container summary without an id");
                continue;
            };
            let id = match ContainerId::new(raw_id) {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping container with invalid id");
                    continue;
                }
            };

            let status = ContainerStatus::parse(
                summary
                    .state
                    .as_deref()
                    .or(summary.status.as_deref())
                    .unwrap_or_default(),
            );
            let (image, exited_at) = self.describe(&id, &status).await;

            containers.push(ContainerRecord {
                id,
                names: summary
                    .names
                    .unwrap_or_default()
                    .iter()
                    .map(String::as_str)
                    .map(canonical::container_name)
                    .collect(),
                status,
                image,
                exited_at,
            });
        }

        let summaries = self
            .client
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(|err| runtime_error("listing images", &err))?;

        let mut images = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match ImageId::new(summary.id) {
                Ok(id) => images.push(ImageRecord::new(id, canonical::repo_tags(summary.repo_tags))),
                Err(err) => tracing::warn!(error = %err, "Skipping image with invalid id"),
            }
        }

        tracing::info!(
            containers = containers.len(),
            images = images.len(),
            "Fetched runtime snapshot"
        );

        Ok(Snapshot::new(containers, images))
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        self.client
            .remove_container(
                id.as_str(),
                Some(RemoveContainerOptions {
                    v: self.remove_volumes,
                    force: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|err| runtime_error(&format!("removing container {id}"), &err))
    }

    async fn remove_image(&self, id: &ImageId) -> Result<()> {
        let deleted = self
            .client
            .remove_image(id.as_str(), None, None)
            .await
            .map_err(|err| runtime_error(&format!("removing image {id}"), &err))?;

        tracing::debug!(image_id = %id, layers = deleted.len(), "Image removed");

        Ok(())
    }
}
