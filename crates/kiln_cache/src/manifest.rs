//! Cache manifest recording what the on-disk store holds.
//!
//! Stored as `manifest.json` in the cache directory. Tracks, per fingerprint,
//! which group and compiler produced the artifact and a monotonically
//! increasing use sequence that drives least-recently-used pruning.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// Name of the manifest file within the cache directory.
const MANIFEST_FILE: &str = "manifest.json";

/// Top-level cache manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Kiln version that produced this cache. Invalidate on version change.
    pub tool_version: String,
    /// Next value handed out by [`touch`](Self::touch).
    pub next_sequence: u64,
    /// Per-fingerprint entries.
    pub entries: BTreeMap<Fingerprint, ManifestEntry>,
}

/// Bookkeeping for one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Identifier of the group the artifact was compiled for.
    pub group: String,
    /// Compiler version that produced it.
    pub compiler_version: String,
    /// Use sequence number at the last store or hit.
    pub last_used: u64,
}

impl CacheManifest {
    /// Creates an empty manifest for the given Kiln version.
    pub fn new(tool_version: &str) -> Self {
        Self {
            tool_version: tool_version.to_string(),
            next_sequence: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Loads the manifest from the cache directory, returning `None` if
    /// the file doesn't exist or can't be parsed.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(cache_dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Loads the manifest if it exists and matches `tool_version`, otherwise
    /// starts a fresh one.
    pub fn load_or_new(cache_dir: &Path, tool_version: &str) -> Self {
        match Self::load(cache_dir) {
            Some(manifest) if manifest.is_compatible(tool_version) => manifest,
            Some(manifest) => {
                tracing::info!(
                    found = %manifest.tool_version,
                    current = tool_version,
                    "cache manifest from another kiln version; starting fresh"
                );
                Self::new(tool_version)
            }
            None => Self::new(tool_version),
        }
    }

    /// Saves the manifest to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::io(cache_dir, e))?;
        let path = cache_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
    }

    /// Returns `true` if this manifest was produced by a compatible Kiln version.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.tool_version == current_version
    }

    /// Records a store or hit, inserting the entry if `origin` is given.
    ///
    /// A hit on a fingerprint the manifest has never seen (and no origin to
    /// describe it) is ignored.
    pub fn touch(&mut self, fingerprint: Fingerprint, origin: Option<(&str, &str)>) {
        let sequence = self.next_sequence;
        if let Some(entry) = self.entries.get_mut(&fingerprint) {
            entry.last_used = sequence;
        } else if let Some((group, compiler_version)) = origin {
            self.entries.insert(
                fingerprint,
                ManifestEntry {
                    group: group.to_string(),
                    compiler_version: compiler_version.to_string(),
                    last_used: sequence,
                },
            );
        } else {
            return;
        }
        self.next_sequence += 1;
    }

    /// Drops an entry.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<ManifestEntry> {
        self.entries.remove(fingerprint)
    }

    /// Fingerprints ordered from least to most recently used.
    pub fn lru_order(&self) -> Vec<Fingerprint> {
        let mut order: Vec<(u64, Fingerprint)> = self
            .entries
            .iter()
            .map(|(fp, e)| (e.last_used, *fp))
            .collect();
        order.sort();
        order.into_iter().map(|(_, fp)| fp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::ContentHash;

    fn fp(seed: &str) -> Fingerprint {
        Fingerprint::from_hash(ContentHash::from_bytes(seed.as_bytes()))
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = CacheManifest::new("0.1.0");
        manifest.touch(fp("a"), Some(("a.sol", "0.8.17")));
        manifest.save(dir.path()).unwrap();

        let loaded = CacheManifest::load(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.entries[&fp("a")].group, "a.sol");
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CacheManifest::load(dir.path()).is_none());
    }

    #[test]
    fn load_corrupt_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        assert!(CacheManifest::load(dir.path()).is_none());
    }

    #[test]
    fn incompatible_version_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut old = CacheManifest::new("0.0.9");
        old.touch(fp("a"), Some(("a.sol", "0.8.17")));
        old.save(dir.path()).unwrap();

        let current = CacheManifest::load_or_new(dir.path(), "0.1.0");
        assert!(current.entries.is_empty());
        assert_eq!(current.tool_version, "0.1.0");
    }

    #[test]
    fn touch_orders_by_recency() {
        let mut manifest = CacheManifest::new("0.1.0");
        manifest.touch(fp("a"), Some(("a.sol", "0.8.17")));
        manifest.touch(fp("b"), Some(("b.sol", "0.8.17")));
        manifest.touch(fp("c"), Some(("c.sol", "0.8.17")));
        manifest.touch(fp("a"), None);
        assert_eq!(manifest.lru_order(), vec![fp("b"), fp("c"), fp("a")]);
    }

    #[test]
    fn unknown_hit_is_ignored() {
        let mut manifest = CacheManifest::new("0.1.0");
        manifest.touch(fp("ghost"), None);
        assert!(manifest.entries.is_empty());
        assert_eq!(manifest.next_sequence, 0);
    }
}
