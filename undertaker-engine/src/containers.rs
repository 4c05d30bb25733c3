//! Exited container classification

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, SystemTime};
use undertaker_core::{ContainerId, ContainerRecord, Error, ReclaimEvent};

use crate::in_use::{ImageIndex, InUseSet, Inconsistency};
use crate::pattern::Policies;

/// Minimum time a container must have been stopped before it is reclaimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Retention(u64); // seconds

impl Retention {
    /// Reclaim every exited container immediately
    pub const ZERO: Self = Self(0);

    /// One hour, the default window
    pub const DEFAULT: Self = Self(3600);

    /// Create from seconds
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Get value in seconds
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Get value as a duration
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }

    /// Time left before `elapsed` reaches the window, `None` once it has
    #[must_use]
    pub fn remaining(self, elapsed: Duration) -> Option<Duration> {
        let window = self.as_duration();
        (elapsed < window).then(|| window - elapsed)
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// A container marked for removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerToReclaim {
    /// Container ID
    pub id: ContainerId,
    /// First alias name, or the ID when the container has none
    pub name: String,
}

/// Output of [`classify_containers`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOutcome {
    /// Containers to remove, in snapshot order
    pub reclaim: Vec<ContainerToReclaim>,
    /// The in-use set passed in, extended with images of protected containers
    pub in_use: InUseSet,
    /// Exited containers matching the exclude policy
    pub excluded: usize,
    /// Exited containers outside a non-empty include policy
    pub not_included: usize,
    /// Exited containers inside the retention window
    pub retained: usize,
    /// Exited containers that could not be classified
    pub inconsistencies: Vec<Inconsistency>,
}

enum Decision {
    Excluded,
    NotIncluded,
    Retained(Duration),
    Reclaim(Option<Duration>),
}

fn decide(
    container: &ContainerRecord,
    policies: &Policies,
    retention: Retention,
    now: SystemTime,
) -> Decision {
    if policies.container_excludes.matches_entity(container) {
        return Decision::Excluded;
    }

    if !policies.container_includes.is_empty()
        && !policies.container_includes.matches_entity(container)
    {
        return Decision::NotIncluded;
    }

    // An unknown exit time counts as infinitely old.
    let Some(exited_at) = container.exited_at else {
        return Decision::Reclaim(None);
    };

    // Exit times ahead of `now` (clock skew) count as just exited.
    let elapsed = now.duration_since(exited_at).unwrap_or(Duration::ZERO);

    retention
        .remaining(elapsed)
        .map_or(Decision::Reclaim(Some(elapsed)), Decision::Retained)
}

/// Partition exited containers into protected and reclaimable.
///
/// Takes the in-use set seeded from live containers and returns it extended
/// with the image of every exited container that is kept, whether by an
/// exclude pattern, by a non-empty include policy it does not match, or by
/// the retention window. Non-exited containers are skipped entirely.
///
/// Records whose image cannot be resolved, and exited records whose ID is
/// already taken by a live record or an earlier exited one, are reported and left out of both the reclaim list and the in-use
/// set.
#[must_use]
pub fn classify_containers(
    containers: &[ContainerRecord],
    policies: &Policies,
    retention: Retention,
    now: SystemTime,
    index: &ImageIndex,
    in_use: InUseSet,
) -> ContainerOutcome {
    let mut outcome = ContainerOutcome {
        in_use,
        ..ContainerOutcome::default()
    };
    // Ids held by live records are taken before any exited record is seen
    let mut seen: BTreeSet<&ContainerId> = containers
        .iter()
        .filter(|c| !c.status.is_exited())
        .map(|c| &c.id)
        .collect();

    for container in containers.iter().filter(|c| c.status.is_exited()) {
        if !seen.insert(&container.id) {
            let err = Error::InputInconsistency {
                container: container.id.clone(),
                reason: "duplicate container id in snapshot".to_string(),
            };
            outcome
                .inconsistencies
                .push(Inconsistency::report(&container.id, err));
            continue;
        }

        let image = match index.resolve(&container.image, &container.id) {
            Ok(image) => image,
            Err(err) => {
                outcome
                    .inconsistencies
                    .push(Inconsistency::report(&container.id, err));
                continue;
            }
        };

        let event = match decide(container, policies, retention, now) {
            Decision::Excluded => {
                outcome.excluded += 1;
                outcome.in_use.insert(image.clone());
                ReclaimEvent::ContainerExcluded {
                    id: container.id.clone(),
                    image,
                }
            }
            Decision::NotIncluded => {
                outcome.not_included += 1;
                outcome.in_use.insert(image.clone());
                ReclaimEvent::ContainerNotIncluded {
                    id: container.id.clone(),
                    image,
                }
            }
            Decision::Retained(remaining) => {
                outcome.retained += 1;
                outcome.in_use.insert(image);
                ReclaimEvent::ContainerRetained {
                    id: container.id.clone(),
                    remaining,
                }
            }
            Decision::Reclaim(age) => {
                outcome.reclaim.push(ContainerToReclaim {
                    id: container.id.clone(),
                    name: container.display_name().to_string(),
                });
                ReclaimEvent::ContainerReclaimable {
                    id: container.id.clone(),
                    age,
                }
            }
        };
        event.emit_trace();
    }

    tracing::debug!(
        reclaim = outcome.reclaim.len(),
        excluded = outcome.excluded,
        not_included = outcome.not_included,
        retained = outcome.retained,
        in_use = outcome.in_use.len(),
        "Classified exited containers"
    );

    outcome
}
