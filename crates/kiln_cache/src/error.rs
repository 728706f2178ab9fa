//! Error types for cache operations.

use std::path::PathBuf;

use crate::fingerprint::Fingerprint;

/// Errors that can occur during cache operations.
///
/// Reads are fail-safe and never produce these: a missing or corrupt entry
/// is a cache miss. Writes that fail for I/O reasons during a build are
/// logged and skipped. What remains is maintenance I/O and the one fatal
/// condition, a fingerprint collision.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// Two different artifacts were stored under the same fingerprint.
    #[error("fingerprint collision: {fingerprint} already maps to a different artifact")]
    FingerprintCollision {
        /// The contested fingerprint.
        fingerprint: Fingerprint,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::ContentHash;

    #[test]
    fn io_error_display() {
        let err = CacheError::io(
            "/tmp/.kiln-cache/manifest.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("manifest.json"));
    }

    #[test]
    fn collision_display_names_fingerprint() {
        let fp = Fingerprint::from_hash(ContentHash::from_bytes(b"x"));
        let err = CacheError::FingerprintCollision { fingerprint: fp };
        assert!(err.to_string().contains(&fp.to_string()));
    }
}
