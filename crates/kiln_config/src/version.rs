//! Compiler version identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidSettings;

/// A resolved compiler version (semantic version).
///
/// Accepts an optional leading `v` when parsing (`v0.8.17` and `0.8.17` are
/// the same version). Build metadata such as `+commit.8df45f5f` is preserved.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerVersion(semver::Version);

impl CompilerVersion {
    /// Parses a version string.
    pub fn parse(s: &str) -> Result<Self, InvalidSettings> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        semver::Version::parse(bare)
            .map(Self)
            .map_err(|e| InvalidSettings::Version {
                version: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Creates a version from its numeric components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Returns the underlying semantic version.
    pub fn semver(&self) -> &semver::Version {
        &self.0
    }
}

impl FromStr for CompilerVersion {
    type Err = InvalidSettings;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompilerVersion({})", self.0)
    }
}
