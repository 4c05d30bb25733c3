//! The classification pipeline

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use undertaker_core::{ContainerRecord, ImageRecord};

use crate::containers::{ContainerToReclaim, Retention, classify_containers};
use crate::images::{ImageToReclaim, classify_images};
use crate::in_use::{ImageIndex, InUseSet, Inconsistency, seed_in_use};
use crate::pattern::Policies;

/// Containers and images as fetched from the runtime in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Every container, whatever its status
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
    /// Top-level images
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

impl Snapshot {
    /// Create a snapshot
    #[must_use]
    pub const fn new(containers: Vec<ContainerRecord>, images: Vec<ImageRecord>) -> Self {
        Self { containers, images }
    }
}

/// Counters describing why things were kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    /// Exited containers kept by the exclude policy
    pub containers_excluded: usize,
    /// Exited containers kept by the retention window
    pub containers_retained: usize,
    /// Exited containers outside the include policy
    pub containers_not_included: usize,
    /// Images kept because they are in use
    pub images_in_use: usize,
    /// Images kept by the exclude policy
    pub images_excluded: usize,
    /// Images outside the include policy
    pub images_not_included: usize,
    /// Records skipped as inconsistent
    pub inconsistent: usize,
}

/// What may be removed, and why the rest is kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// Containers to remove, in snapshot order
    pub containers: Vec<ContainerToReclaim>,
    /// Images to remove, in snapshot order
    pub images: Vec<ImageToReclaim>,
    /// Final in-use set the image decision was made against
    pub in_use: InUseSet,
    /// Diagnostic counters
    pub stats: ClassificationStats,
    /// Records left out of classification
    pub inconsistencies: Vec<Inconsistency>,
}

impl ClassificationResult {
    /// Check if nothing is to be removed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.images.is_empty()
    }
}

/// Runs the classification stages in order over a snapshot
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    policies: Policies,
    retention: Retention,
}

impl Classifier {
    /// Create a classifier
    #[must_use]
    pub const fn new(policies: Policies, retention: Retention) -> Self {
        Self {
            policies,
            retention,
        }
    }

    /// Classify a snapshot as of `now`.
    ///
    /// Live containers seed the in-use set, exited containers extend it, and
    /// only then are images judged against it. The result depends on nothing
    /// but the arguments.
    #[must_use]
    pub fn classify(&self, snapshot: &Snapshot, now: SystemTime) -> ClassificationResult {
        let _span = tracing::debug_span!(
            "classify",
            containers = snapshot.containers.len(),
            images = snapshot.images.len(),
            retention_secs = self.retention.as_secs()
        )
        .entered();

        let index = ImageIndex::new(&snapshot.images);

        let seed = seed_in_use(&snapshot.containers, &index);

        let containers = classify_containers(
            &snapshot.containers,
            &self.policies,
            self.retention,
            now,
            &index,
            seed.in_use,
        );

        let images = classify_images(&snapshot.images, &self.policies, &containers.in_use);

        let mut inconsistencies = seed.inconsistencies;
        inconsistencies.extend(containers.inconsistencies);

        let stats = ClassificationStats {
            containers_excluded: containers.excluded,
            containers_retained: containers.retained,
            containers_not_included: containers.not_included,
            images_in_use: images.in_use,
            images_excluded: images.excluded,
            images_not_included: images.not_included,
            inconsistent: inconsistencies.len(),
        };

        tracing::info!(
            containers = containers.reclaim.len(),
            images = images.reclaim.len(),
            in_use = containers.in_use.len(),
            inconsistent = stats.inconsistent,
            "Classification complete"
        );

        ClassificationResult {
            containers: containers.reclaim,
            images: images.reclaim,
            in_use: containers.in_use,
            stats,
            inconsistencies,
        }
    }
}
