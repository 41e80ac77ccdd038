use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{PoisonError, RwLock},
};

/// A release tag exactly as the upstream API reported it, e.g. `v1.4.2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every character is in `[A-Za-z0-9._+-]`.
    pub fn is_shell_safe(&self) -> bool {
        self.0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single-value cache of the latest known release tag.
///
/// One refresher writes, any number of request handlers read. Every `get` observes a
/// complete value from some finished `set`, or the initial empty tag.
#[derive(Debug, Default)]
pub struct VersionStore {
    current: RwLock<VersionTag>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> VersionTag {
        // A poisoned lock still holds a whole value; writers never leave it half-updated.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the cached tag, returning whether it differed from the previous one.
    pub fn set(&self, tag: VersionTag) -> bool {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if *current == tag {
            return false;
        }

        *current = tag;
        true
    }

    pub fn is_initialized(&self) -> bool {
        !self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
