//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use crate::{Error, Result};

/// Maximum length for container and image identifiers
const MAX_ID_LENGTH: usize = 128;

fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidConfig {
            message: format!("{kind} ID cannot be empty"),
        });
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(Error::InvalidConfig {
            message: format!("{kind} ID too long (max {MAX_ID_LENGTH} chars)"),
        });
    }

    if id.chars().any(char::is_whitespace) {
        return Err(Error::InvalidConfig {
            message: format!("{kind} ID cannot contain whitespace"),
        });
    }

    Ok(())
}

/// Container identifier with validation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Create a new `ContainerId` with validation
    ///
    /// # Errors
    /// Returns error if ID is empty, too long, or contains whitespace
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_id("Container", &id)?;
        Ok(Self(id))
    }

    /// Get the container ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve characters, the way runtimes print container IDs
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

/// Canonical image identifier (usually `sha256:<hex>`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ImageId(String);

impl ImageId {
    /// Shortest id prefix accepted as a reference to an image
    pub const SHORT_ID_MIN: usize = 12;

    /// Algorithm prefix of content-addressed image ids
    pub const DIGEST_PREFIX: &'static str = "sha256:";

    /// Create a new `ImageId` with validation
    ///
    /// # Errors
    /// Returns error if ID is empty, too long, or contains whitespace
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_id("Image", &id)?;
        Ok(Self(id))
    }

    /// Get the image ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id without its `algorithm:` prefix
    #[must_use]
    pub fn digest(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, hex)| hex)
    }

    /// Whether `reference` names this image by id.
    ///
    /// Accepts the full id, the bare digest, or a hex prefix of the digest
    /// at least [`Self::SHORT_ID_MIN`] characters long.
    #[must_use]
    pub fn matches_reference(&self, reference: &str) -> bool {
        if reference == self.0 {
            return true;
        }

        let digest = self.digest();
        // Anything else before a colon is a repository, not an algorithm
        let reference = reference
            .strip_prefix(Self::DIGEST_PREFIX)
            .unwrap_or(reference);

        reference == digest
            || (reference.len() >= Self::SHORT_ID_MIN
                && reference.chars().all(|c| c.is_ascii_hexdigit())
                && digest.starts_with(reference))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ImageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ImageId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

/// Lifecycle state of a container as far as reclamation cares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    /// Stopped after running
    Exited,
    /// Anything else (running, paused, restarting, created, ...)
    Other(String),
}

impl ContainerStatus {
    /// Parse runtime state or status text.
    ///
    /// Both the short state (`exited`) and the human status line
    /// (`Exited (0) 2 hours ago`) are recognized.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("exited"))
        {
            Self::Exited
        } else {
            Self::Other(text.to_string())
        }
    }

    /// Check if the container has exited
    #[must_use]
    pub const fn is_exited(&self) -> bool {
        matches!(self, Self::Exited)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited => write!(f, "exited"),
            Self::Other(state) => write!(f, "{state}"),
        }
    }
}

/// The image field of a container as reported by the runtime.
///
/// Runtimes report either the canonical id or whatever reference the
/// container was created from, so a reference must be resolved against the
/// image list before it can be compared with an [`ImageId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageRef {
    /// Already canonical
    Id(ImageId),
    /// Tag, name or short id still to be resolved
    Reference(String),
    /// The runtime could not say which image the container uses
    Unavailable(String),
}

impl ImageRef {
    /// Build from raw runtime text.
    ///
    /// Text carrying an algorithm prefix is taken as canonical.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with(ImageId::DIGEST_PREFIX) {
            if let Ok(id) = ImageId::new(raw) {
                return Self::Id(id);
            }
        }
        Self::Reference(raw.to_string())
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Reference(reference) => write!(f, "{reference}"),
            Self::Unavailable(reason) => write!(f, "<unavailable: {reason}>"),
        }
    }
}

/// Strings a policy pattern is tested against for one entity
pub trait Candidates {
    /// Identifier first, then aliases or tags
    fn candidates(&self) -> impl Iterator<Item = &str>;
}

/// One container from a runtime snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container ID
    pub id: ContainerId,
    /// Alias names, without the runtime's leading slash
    pub names: Vec<String>,
    /// Current status
    pub status: ContainerStatus,
    /// Image the container was created from
    pub image: ImageRef,
    /// When the container exited, if known
    #[serde(with = "optional_systemtime_serde", default)]
    pub exited_at: Option<SystemTime>,
}

impl ContainerRecord {
    /// Create a record with no names and no exit time
    #[must_use]
    pub const fn new(id: ContainerId, status: ContainerStatus, image: ImageRef) -> Self {
        Self {
            id,
            names: Vec::new(),
            status,
            image,
            exited_at: None,
        }
    }

    /// Add an alias name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Set the exit time
    #[must_use]
    pub fn with_exited_at(mut self, at: SystemTime) -> Self {
        self.exited_at = Some(at);
        self
    }

    /// Name to show in reports: the first alias, or the ID
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map_or_else(|| self.id.as_str(), String::as_str)
    }
}

impl Candidates for ContainerRecord {
    fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.names.iter().map(String::as_str))
    }
}

/// One image from a runtime snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Image ID
    pub id: ImageId,
    /// `repository:tag` strings
    pub repo_tags: Vec<String>,
}

impl ImageRecord {
    /// Create a record
    #[must_use]
    pub const fn new(id: ImageId, repo_tags: Vec<String>) -> Self {
        Self { id, repo_tags }
    }
}

impl Candidates for ImageRecord {
    fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.repo_tags.iter().map(String::as_str))
    }
}

// Exit times travel as whole seconds since the epoch
mod optional_systemtime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(time) => {
                let since_epoch = time
                    .duration_since(UNIX_EPOCH)
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&since_epoch.as_secs())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<u64>::deserialize(deserializer)?
            .map(|secs| {
                UNIX_EPOCH
                    .checked_add(Duration::from_secs(secs))
                    .ok_or_else(|| {
                        serde::de::Error::custom(format!("timestamp {secs} out of range"))
                    })
            })
            .transpose()
    }
}
