//! Regex policies matched against entity candidate strings

use regex::Regex;
use std::fmt;
use undertaker_core::{Candidates, Error, Result};

/// A compiled pattern together with the text it was compiled from
#[derive(Clone)]
pub struct Pattern {
    raw: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] if `raw` is not a valid regular expression
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let regex = Regex::new(&raw).map_err(|err| Error::InvalidPattern {
            pattern: raw.clone(),
            message: err.to_string(),
        })?;
        Ok(Self { raw, regex })
    }

    /// Pattern text as supplied
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Unanchored search; an empty match does not count
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex
            .find_iter(candidate)
            .any(|found| !found.as_str().is_empty())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.raw).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Ordered collection of patterns forming one policy
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    patterns: Vec<Pattern>,
}

impl PolicySet {
    /// Policy that matches nothing
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Compile every raw pattern, in order.
    ///
    /// The whole set is rejected on the first invalid pattern; a partially
    /// compiled exclude policy would protect less than the caller asked for.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] naming the first pattern that fails
    pub fn compile<I, S>(raw_patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = raw_patterns
            .into_iter()
            .map(Pattern::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True if any pattern matches any candidate
    pub fn matches<'a, I>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.patterns.is_empty() {
            return false;
        }
        candidates
            .into_iter()
            .any(|candidate| self.patterns.iter().any(|p| p.is_match(candidate)))
    }

    /// [`Self::matches`] over an entity's candidate set
    pub fn matches_entity(&self, entity: &impl Candidates) -> bool {
        self.matches(entity.candidates())
    }

    /// Check if the policy has no patterns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Number of patterns
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Patterns in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }
}

/// Every policy a classification run uses.
///
/// Exclude policies protect matching entities unconditionally. A non-empty
/// include policy narrows reclamation to matching entities; everything else
/// of that kind is kept. Exclusion wins when both match.
#[derive(Debug, Clone, Default)]
pub struct Policies {
    /// Protects exited containers (and therefore their images)
    pub container_excludes: PolicySet,
    /// Protects images
    pub image_excludes: PolicySet,
    /// Restricts which exited containers may be reclaimed
    pub container_includes: PolicySet,
    /// Restricts which images may be reclaimed
    pub image_includes: PolicySet,
}

impl Policies {
    /// No patterns at all
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container exclude policy
    #[must_use]
    pub fn with_container_excludes(mut self, policy: PolicySet) -> Self {
        self.container_excludes = policy;
        self
    }

    /// Set the image exclude policy
    #[must_use]
    pub fn with_image_excludes(mut self, policy: PolicySet) -> Self {
        self.image_excludes = policy;
        self
    }

    /// Set the container include policy
    #[must_use]
    pub fn with_container_includes(mut self, policy: PolicySet) -> Self {
        self.container_includes = policy;
        self
    }

    /// Set the image include policy
    #[must_use]
    pub fn with_image_includes(mut self, policy: PolicySet) -> Self {
        self.image_includes = policy;
        self
    }
}
