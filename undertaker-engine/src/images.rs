//! Image classification against the final in-use set

use serde::Serialize;
use std::collections::BTreeSet;
use undertaker_core::{ImageId, ImageRecord, ReclaimEvent};

use crate::in_use::InUseSet;
use crate::pattern::Policies;

/// An image marked for removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageToReclaim {
    /// Image ID
    pub id: ImageId,
    /// Tags the image carried
    pub repo_tags: Vec<String>,
}

/// Output of [`classify_images`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOutcome {
    /// Images to remove, in snapshot order
    pub reclaim: Vec<ImageToReclaim>,
    /// Images kept because a container references them
    pub in_use: usize,
    /// Images kept by the exclude policy
    pub excluded: usize,
    /// Images outside a non-empty include policy
    pub not_included: usize,
}

/// Select the images that may be removed.
///
/// Being in use and matching the exclude policy are independent reasons to
/// keep an image; an image is reclaimed only when neither applies and, if an
/// include policy is configured, it matches that policy. Images repeated in
/// the snapshot are considered once.
#[must_use]
pub fn classify_images(
    images: &[ImageRecord],
    policies: &Policies,
    in_use: &InUseSet,
) -> ImageOutcome {
    let mut outcome = ImageOutcome::default();
    let mut seen: BTreeSet<&ImageId> = BTreeSet::new();

    for image in images {
        if !seen.insert(&image.id) {
            continue;
        }

        let id = image.id.clone();
        let event = if in_use.contains(&image.id) {
            outcome.in_use += 1;
            ReclaimEvent::ImageInUse { id }
        } else if policies.image_excludes.matches_entity(image) {
            outcome.excluded += 1;
            ReclaimEvent::ImageExcluded { id }
        } else if !policies.image_includes.is_empty()
            && !policies.image_includes.matches_entity(image)
        {
            outcome.not_included += 1;
            ReclaimEvent::ImageNotIncluded { id }
        } else {
            outcome.reclaim.push(ImageToReclaim {
                id: image.id.clone(),
                repo_tags: image.repo_tags.clone(),
            });
            ReclaimEvent::ImageReclaimable { id }
        };
        event.emit_trace();
    }

    tracing::debug!(
        reclaim = outcome.reclaim.len(),
        in_use = outcome.in_use,
        excluded = outcome.excluded,
        not_included = outcome.not_included,
        "Classified images"
    );

    outcome
}
