//! Classification decisions with structured tracing

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ContainerId, ImageId};

/// Events emitted while classifying a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReclaimEvent {
    /// Exited container protected by an exclude pattern
    ContainerExcluded {
        /// Container ID
        id: ContainerId,
        /// Image now counted as in use
        image: ImageId,
    },

    /// Exited container outside a non-empty include list
    ContainerNotIncluded {
        /// Container ID
        id: ContainerId,
        /// Image now counted as in use
        image: ImageId,
    },

    /// Exited container still inside the retention window
    ContainerRetained {
        /// Container ID
        id: ContainerId,
        /// Time left until the container becomes reclaimable
        #[serde(with = "duration_serde")]
        remaining: Duration,
    },

    /// Exited container eligible for removal
    ContainerReclaimable {
        /// Container ID
        id: ContainerId,
        /// Elapsed time since exit, `None` when the exit time is unknown
        #[serde(with = "optional_duration_serde", default)]
        age: Option<Duration>,
    },

    /// Image referenced by a live or protected container
    ImageInUse {
        /// Image ID
        id: ImageId,
    },

    /// Image protected by an exclude pattern
    ImageExcluded {
        /// Image ID
        id: ImageId,
    },

    /// Image outside a non-empty include list
    ImageNotIncluded {
        /// Image ID
        id: ImageId,
    },

    /// Image eligible for removal
    ImageReclaimable {
        /// Image ID
        id: ImageId,
    },

    /// Record skipped because it could not be classified
    Inconsistent {
        /// Container ID
        id: ContainerId,
        /// What went wrong
        reason: String,
    },
}

impl ReclaimEvent {
    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        match self {
            Self::ContainerExcluded { id, image } => {
                tracing::debug!(
                    container_id = %id,
                    image_id = %image,
                    event = "container_excluded",
                    "Container excluded"
                );
            }
            Self::ContainerNotIncluded { id, image } => {
                tracing::debug!(
                    container_id = %id,
                    image_id = %image,
                    event = "container_not_included",
                    "Container not included"
                );
            }
            Self::ContainerRetained { id, remaining } => {
                tracing::debug!(
                    container_id = %id,
                    remaining_secs = remaining.as_secs(),
                    event = "container_retained",
                    "Container retained by age"
                );
            }
            Self::ContainerReclaimable { id, age } => {
                tracing::debug!(
                    container_id = %id,
                    age_secs = age.map(|age| age.as_secs()),
                    event = "container_reclaimable",
                    "Container reclaimable"
                );
            }
            Self::ImageInUse { id } => {
                tracing::trace!(image_id = %id, event = "image_in_use", "Image in use");
            }
            Self::ImageExcluded { id } => {
                tracing::debug!(image_id = %id, event = "image_excluded", "Image excluded");
            }
            Self::ImageNotIncluded { id } => {
                tracing::debug!(
                    image_id = %id,
                    event = "image_not_included",
                    "Image not included"
                );
            }
            Self::ImageReclaimable { id } => {
                tracing::debug!(
                    image_id = %id,
                    event = "image_reclaimable",
                    "Image reclaimable"
                );
            }
            Self::Inconsistent { id, reason } => {
                tracing::warn!(
                    container_id = %id,
                    reason = %reason,
                    event = "inconsistent",
                    "Skipping inconsistent record"
                );
            }
        }
    }
}

// Custom Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde() {
        let event = ReclaimEvent::ContainerReclaimable {
            id: ContainerId::new("c1").unwrap(),
            age: Some(Duration::from_secs(7200)),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"container_reclaimable\""));
        assert!(json.contains("7200"));

        let back: ReclaimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
