//! Image identity resolution and the set of images still in use

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use undertaker_core::{
    ContainerId, ContainerRecord, Error, ImageId, ImageRecord, ImageRef, ReclaimEvent, Result,
};

/// Lookup from any reference a container may carry to a canonical [`ImageId`]
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    ids: Vec<ImageId>,
    tags: BTreeMap<String, ImageId>,
}

impl ImageIndex {
    /// Tag implied when a reference names a repository only
    pub const DEFAULT_TAG: &'static str = "latest";

    /// Index the images of a snapshot
    #[must_use]
    pub fn new(images: &[ImageRecord]) -> Self {
        let mut index = Self::default();
        for image in images {
            if !index.ids.contains(&image.id) {
                index.ids.push(image.id.clone());
            }
            for tag in &image.repo_tags {
                index
                    .tags
                    .entry(tag.clone())
                    .or_insert_with(|| image.id.clone());
            }
        }
        index
    }

    /// Resolve a container's image field to a canonical id.
    ///
    /// Canonical ids pass through untouched, even when the image is absent
    /// from the index. References are looked up by `repo:tag` (a bare
    /// repository gets `:latest`) and then by id prefix.
    ///
    /// # Errors
    /// Returns [`Error::InputInconsistency`] when the image is unavailable,
    /// or the reference is empty, unknown, or matches more than one image id
    pub fn resolve(&self, image: &ImageRef, container: &ContainerId) -> Result<ImageId> {
        let inconsistency = |reason: String| Error::InputInconsistency {
            container: container.clone(),
            reason,
        };

        let reference = match image {
            ImageRef::Id(id) => return Ok(id.clone()),
            ImageRef::Reference(reference) => reference.trim(),
            ImageRef::Unavailable(reason) => {
                return Err(inconsistency(format!("image unavailable: {reason}")));
            }
        };

        if reference.is_empty() {
            return Err(inconsistency("empty image reference".to_string()));
        }

        if let Some(id) = self.tags.get(reference) {
            return Ok(id.clone());
        }

        if !has_tag_or_digest(reference) {
            let tagged = format!("{reference}:{}", Self::DEFAULT_TAG);
            if let Some(id) = self.tags.get(&tagged) {
                return Ok(id.clone());
            }
        }

        let mut by_id = self.ids.iter().filter(|id| id.matches_reference(reference));
        match (by_id.next(), by_id.next()) {
            (Some(id), None) => Ok(id.clone()),
            (Some(_), Some(_)) => Err(inconsistency(format!(
                "image reference {reference} is ambiguous"
            ))),
            (None, _) => Err(inconsistency(format!(
                "image reference {reference} does not resolve to a known image"
            ))),
        }
    }
}

// `registry:5000/app` has a colon but no tag; only a colon after the last
// slash separates a tag.
fn has_tag_or_digest(reference: &str) -> bool {
    if reference.contains('@') {
        return true;
    }
    let name = reference.rsplit('/').next().unwrap_or(reference);
    name.contains(':')
}

/// Images that must not be reclaimed.
///
/// Ordered so that anything derived from it is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InUseSet(BTreeSet<ImageId>);

impl InUseSet {
    /// Empty set
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add an image; returns `false` if it was already present
    pub fn insert(&mut self, id: ImageId) -> bool {
        self.0.insert(id)
    }

    /// Check membership
    #[must_use]
    pub fn contains(&self, id: &ImageId) -> bool {
        self.0.contains(id)
    }

    /// Number of images
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Images in id order
    pub fn iter(&self) -> impl Iterator<Item = &ImageId> {
        self.0.iter()
    }
}

impl FromIterator<ImageId> for InUseSet {
    fn from_iter<T: IntoIterator<Item = ImageId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a InUseSet {
    type Item = &'a ImageId;
    type IntoIter = std::collections::btree_set::Iter<'a, ImageId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A record that was left out of classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    /// Offending container
    pub container: ContainerId,
    /// What could not be resolved
    pub reason: String,
}

impl Inconsistency {
    /// Build from a per-record error, logging it
    pub(crate) fn report(container: &ContainerId, err: Error) -> Self {
        let inconsistency = match err {
            Error::InputInconsistency { container, reason } => Self { container, reason },
            other => Self {
                container: container.clone(),
                reason: other.to_string(),
            },
        };
        ReclaimEvent::Inconsistent {
            id: inconsistency.container.clone(),
            reason: inconsistency.reason.clone(),
        }
        .emit_trace();
        inconsistency
    }
}

/// Result of seeding the in-use set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InUseSeed {
    /// Images referenced by non-exited containers
    pub in_use: InUseSet,
    /// Non-exited containers whose image could not be resolved
    pub inconsistencies: Vec<Inconsistency>,
}

/// Collect the images of every container that has not exited.
///
/// Exited containers are left to [`crate::classify_containers`]. A record
/// whose image cannot be resolved contributes nothing and is reported.
#[must_use]
pub fn seed_in_use(containers: &[ContainerRecord], index: &ImageIndex) -> InUseSeed {
    let mut seed = InUseSeed::default();

    for container in containers.iter().filter(|c| !c.status.is_exited()) {
        match index.resolve(&container.image, &container.id) {
            Ok(image) => {
                tracing::trace!(
                    container_id = %container.id,
                    status = %container.status,
                    image_id = %image,
                    "Image referenced by live container"
                );
                seed.in_use.insert(image);
            }
            Err(err) => seed
                .inconsistencies
                .push(Inconsistency::report(&container.id, err)),
        }
    }

    tracing::debug!(
        in_use = seed.in_use.len(),
        inconsistent = seed.inconsistencies.len(),
        "Seeded in-use images"
    );

    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use undertaker_core::ContainerStatus;

    fn image(id: &str, tags: &[&str]) -> ImageRecord {
        ImageRecord::new(
            ImageId::new(id).unwrap(),
            tags.iter().map(ToString::to_string).collect(),
        )
    }

    fn container(id: &str, status: ContainerStatus, image: ImageRef) -> ContainerRecord {
        ContainerRecord::new(ContainerId::new(id).unwrap(), status, image)
    }

    fn reference(text: &str) -> ImageRef {
        ImageRef::Reference(text.to_string())
    }

    fn running() -> ContainerStatus {
        ContainerStatus::Other("running".to_string())
    }

    #[test]
    fn test_resolve_by_tag_and_default_tag() {
        let index = ImageIndex::new(&[
            image("sha256:aaaaaaaaaaaaaaaa", &["app:latest", "app:1.0"]),
            image("sha256:bbbbbbbbbbbbbbbb", &["registry:5000/base:latest"]),
        ]);
        let c = ContainerId::new("c").unwrap();

        assert_eq!(
            index.resolve(&reference("app:1.0"), &c).unwrap().as_str(),
            "sha256:aaaaaaaaaaaaaaaa"
        );
        assert_eq!(
            index.resolve(&reference("app"), &c).unwrap().as_str(),
            "sha256:aaaaaaaaaaaaaaaa"
        );
        assert_eq!(
            index
                .resolve(&reference("registry:5000/base"), &c)
                .unwrap()
                .as_str(),
            "sha256:bbbbbbbbbbbbbbbb"
        );
    }

    #[test]
    fn test_resolve_by_id_prefix() {
        let index = ImageIndex::new(&[
            image("sha256:0123456789abcdef", &[]),
            image("sha256:0123456789ab9999", &[]),
        ]);
        let c = ContainerId::new("c").unwrap();

        let resolved = index.resolve(&reference("0123456789abcd"), &c).unwrap();
        assert_eq!(resolved.as_str(), "sha256:0123456789abcdef");

        let err = index.resolve(&reference("0123456789ab"), &c).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_hex_tag_is_not_an_id_prefix() {
        let index = ImageIndex::new(&[image("sha256:0123456789abcdef", &["myapp:1.0"])]);
        let c = ContainerId::new("c").unwrap();

        let err = index
            .resolve(&reference("myapp:0123456789abcdef"), &c)
            .unwrap_err();
        assert!(err.to_string().contains("does not resolve"));

        let resolved = index
            .resolve(&reference("sha256:0123456789ab"), &c)
            .unwrap();
        assert_eq!(resolved.as_str(), "sha256:0123456789abcdef");
    }

    #[test]
    fn test_resolve_canonical_id_passes_through() {
        let index = ImageIndex::new(&[]);
        let c = ContainerId::new("c").unwrap();
        let id = ImageId::new("sha256:dangling").unwrap();

        assert_eq!(index.resolve(&ImageRef::Id(id.clone()), &c).unwrap(), id);
    }

    #[test]
    fn test_resolve_unknown_is_inconsistency() {
        let index = ImageIndex::new(&[image("imgA", &["app:latest"])]);
        let c = ContainerId::new("c9").unwrap();

        let err = index.resolve(&reference("ghost:2"), &c).unwrap_err();
        assert!(matches!(err, Error::InputInconsistency { ref container, .. } if container == &c));
        assert!(index.resolve(&reference("  "), &c).is_err());

        let err = index
            .resolve(&ImageRef::Unavailable("inspect failed".to_string()), &c)
            .unwrap_err();
        assert!(err.to_string().contains("inspect failed"));
    }

    #[test]
    fn test_seed_only_non_exited() {
        let images = [image("imgA", &["app:latest"]), image("imgB", &["base:1"])];
        let index = ImageIndex::new(&images);
        let containers = [
            container("c1", ContainerStatus::Exited, reference("app:latest")),
            container("c2", running(), reference("base:1")),
            container(
                "c3",
                ContainerStatus::Other("paused".to_string()),
                reference("base:1"),
            ),
        ];

        let seed = seed_in_use(&containers, &index);
        let ids: Vec<&str> = seed.in_use.iter().map(ImageId::as_str).collect();
        assert_eq!(ids, ["imgB"]);
        assert!(seed.inconsistencies.is_empty());
    }

    #[test]
    fn test_seed_reports_unresolvable() {
        let index = ImageIndex::new(&[image("imgA", &["app:latest"])]);
        let containers = [
            container("c1", running(), reference("missing:tag")),
            container("c2", running(), reference("app")),
        ];

        let seed = seed_in_use(&containers, &index);
        assert_eq!(seed.in_use.len(), 1);
        assert_eq!(seed.inconsistencies.len(), 1);
        assert_eq!(seed.inconsistencies[0].container.as_str(), "c1");
    }
}
