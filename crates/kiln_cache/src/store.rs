//! Content-addressed on-disk artifact storage.
//!
//! Each artifact lives at `<cache_dir>/artifacts/<fingerprint>.art` behind a
//! binary header carrying magic bytes, the format version, the producing tool
//! version, and a payload checksum.

use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// Magic bytes identifying a Kiln cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"KILN";

/// Current artifact format version. Increment on breaking changes to
/// the header or payload format.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

const ARTIFACT_DIR: &str = "artifacts";
const ARTIFACT_EXT: &str = "art";

/// Header prepended to every stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],
    /// Artifact format version.
    pub format_version: u32,
    /// Kiln version that produced this artifact.
    pub tool_version: String,
    /// Content hash of the payload.
    pub checksum: ContentHash,
}

/// Reads and writes artifacts under a cache directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    cache_dir: PathBuf,
    tool_version: String,
}

impl ArtifactStore {
    /// Creates a store rooted at `cache_dir`, stamping writes with `tool_version`.
    pub fn new(cache_dir: &Path, tool_version: &str) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            tool_version: tool_version.to_string(),
        }
    }

    fn artifact_dir(&self) -> PathBuf {
        self.cache_dir.join(ARTIFACT_DIR)
    }

    /// Returns the file path for a fingerprint.
    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.artifact_dir()
            .join(format!("{fingerprint}.{ARTIFACT_EXT}"))
    }

    /// Reads an artifact, returning `None` on any problem.
    ///
    /// A missing file is a silent miss. A file that exists but fails
    /// validation (short, bad magic, other format version, checksum mismatch,
    /// undecodable payload, or a payload for another fingerprint) is logged
    /// and treated as a miss.
    pub fn read(&self, fingerprint: &Fingerprint) -> Option<Artifact> {
        let path = self.artifact_path(fingerprint);
        let raw = std::fs::read(&path).ok()?;
        match decode_file(&raw, fingerprint) {
            Ok(artifact) => Some(artifact),
            Err(reason) => {
                tracing::warn!(path = %path.display(), reason, "ignoring unreadable cached artifact");
                None
            }
        }
    }

    /// Writes an artifact.
    ///
    /// If a valid artifact is already stored under the same fingerprint the
    /// write is a no-op when the contents match and a
    /// [`CacheError::FingerprintCollision`] otherwise. Invalid files are
    /// replaced. The file appears atomically via rename.
    pub fn write(&self, artifact: &Artifact) -> Result<(), CacheError> {
        let fingerprint = artifact.fingerprint;
        if let Some(existing) = self.read(&fingerprint) {
            if &existing == artifact {
                return Ok(());
            }
            return Err(CacheError::FingerprintCollision { fingerprint });
        }

        let dir = self.artifact_dir();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let payload = artifact.encode()?;
        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            tool_version: self.tool_version.clone(),
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // 4-byte header length (little-endian) + header + payload
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);

        let path = self.artifact_path(&fingerprint);
        let tmp = path.with_extension(format!("{ARTIFACT_EXT}.tmp"));
        std::fs::write(&tmp, &output).map_err(|e| CacheError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::io(&path, e))
    }

    /// Deletes the file for a fingerprint. Returns whether a file was removed.
    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, CacheError> {
        let path = self.artifact_path(fingerprint);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Lists the fingerprints of all artifact files, valid or not.
    pub fn list(&self) -> Result<Vec<Fingerprint>, CacheError> {
        let dir = self.artifact_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::io(&dir, e))?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXT) {
                continue;
            }
            if let Some(fp) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            {
                found.push(fp);
            }
        }
        found.sort();
        Ok(found)
    }

    /// Removes artifact files whose fingerprint is not live, along with
    /// stray files in the artifact directory. Returns the number removed.
    pub fn gc(&self, is_live: impl Fn(&Fingerprint) -> bool) -> Result<usize, CacheError> {
        let dir = self.artifact_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::io(&dir, e))?;
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io(&dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let live = path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXT)
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<Fingerprint>().ok())
                    .is_some_and(|fp| is_live(&fp));
            if !live {
                std::fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn decode_file(raw: &[u8], expected: &Fingerprint) -> Result<Artifact, &'static str> {
    if raw.len() < 4 {
        return Err("truncated header length");
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let body = &raw[4..];
    if body.len() < header_len {
        return Err("truncated header");
    }

    let (header, _): (ArtifactHeader, usize) =
        bincode::serde::decode_from_slice(&body[..header_len], bincode::config::standard())
            .map_err(|_| "undecodable header")?;
    if header.magic != ARTIFACT_MAGIC {
        return Err("bad magic");
    }
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err("unsupported format version");
    }

    let payload = &body[header_len..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return Err("checksum mismatch");
    }
    let artifact = Artifact::decode(payload).map_err(|_| "undecodable payload")?;
    if &artifact.fingerprint != expected {
        return Err("payload belongs to another fingerprint");
    }
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "0.1.0");
        (dir, store)
    }

    fn artifact(seed: &[u8], bytecode: &[u8]) -> Artifact {
        Artifact {
            fingerprint: Fingerprint::from_hash(ContentHash::from_bytes(seed)),
            bytecode: bytecode.to_vec(),
            interface: "[]".to_string(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn write_then_read() {
        let (_dir, store) = make_store();
        let a = artifact(b"g1", b"\x60\x80");
        store.write(&a).unwrap();
        assert_eq!(store.read(&a.fingerprint), Some(a.clone()));
        assert_eq!(store.list().unwrap(), vec![a.fingerprint]);
    }

    #[test]
    fn read_missing_returns_none() {
        let (_dir, store) = make_store();
        let fp = Fingerprint::from_hash(ContentHash::from_bytes(b"absent"));
        assert!(store.read(&fp).is_none());
    }

    #[test]
    fn rewrite_identical_is_noop() {
        let (_dir, store) = make_store();
        let a = artifact(b"g1", b"\x60\x80");
        store.write(&a).unwrap();
        store.write(&a).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn different_content_collides() {
        let (_dir, store) = make_store();
        let a = artifact(b"g1", b"\x60\x80");
        let b = artifact(b"g1", b"\x00\x00");
        store.write(&a).unwrap();
        let err = store.write(&b).unwrap_err();
        assert!(matches!(err, CacheError::FingerprintCollision { .. }));
        // The first artifact is untouched.
        assert_eq!(store.read(&a.fingerprint), Some(a));
    }

    #[test]
    fn corrupt_file_is_miss_and_replaceable() {
        let (_dir, store) = make_store();
        let a = artifact(b"g1", b"\x60\x80");
        std::fs::create_dir_all(store.artifact_dir()).unwrap();
        std::fs::write(store.artifact_path(&a.fingerprint), b"garbage data").unwrap();
        assert!(store.read(&a.fingerprint).is_none());
        store.write(&a).unwrap();
        assert_eq!(store.read(&a.fingerprint), Some(a));
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let (_dir, store) = make_store();
        let a = artifact(b"g1", b"\x60\x80\x60\x40");
        store.write(&a).unwrap();
        let path = store.artifact_path(&a.fingerprint);
        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&path, raw).unwrap();
        assert!(store.read(&a.fingerprint).is_none());
    }

    #[test]
    fn misplaced_payload_is_rejected() {
        let (_dir, store) = make_store();
        let a = artifact(b"g1", b"\x60");
        let b = artifact(b"g2", b"\x61");
        store.write(&a).unwrap();
        std::fs::copy(
            store.artifact_path(&a.fingerprint),
            store.artifact_path(&b.fingerprint),
        )
        .unwrap();
        assert!(store.read(&b.fingerprint).is_none());
    }

    #[test]
    fn gc_removes_dead_and_stray_files() {
        let (_dir, store) = make_store();
        let live = artifact(b"live", b"\x01");
        let dead = artifact(b"dead", b"\x02");
        store.write(&live).unwrap();
        store.write(&dead).unwrap();
        std::fs::write(store.artifact_dir().join("leftover.art.tmp"), b"x").unwrap();

        let removed = store.gc(|fp| *fp == live.fingerprint).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.list().unwrap(), vec![live.fingerprint]);
    }

    #[test]
    fn remove_reports_presence() {
        let (_dir, store) = make_store();
        let a = artifact(b"g1", b"\x60");
        store.write(&a).unwrap();
        assert!(store.remove(&a.fingerprint).unwrap());
        assert!(!store.remove(&a.fingerprint).unwrap());
    }
}
