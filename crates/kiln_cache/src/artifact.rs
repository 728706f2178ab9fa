//! Compiled artifacts.

use kiln_diagnostics::Diagnostic;
use kiln_toolchain::CompilerOutput;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// The immutable output of compiling one group.
///
/// Only successful compilations become artifacts, so `diagnostics` holds
/// warnings and notes but never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// The fingerprint of the inputs that produced this artifact.
    pub fingerprint: Fingerprint,
    /// Compiled bytecode.
    pub bytecode: Vec<u8>,
    /// Interface metadata as JSON text.
    pub interface: String,
    /// Non-fatal compiler diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

/// On-disk payload layout.
///
/// `Diagnostic` omits empty optional fields when serialized, which a
/// non-self-describing format cannot decode, so diagnostics are carried as
/// JSON text inside the bincode payload.
#[derive(Serialize, Deserialize)]
struct StoredArtifact {
    fingerprint: Fingerprint,
    bytecode: Vec<u8>,
    interface: String,
    diagnostics: String,
}

impl Artifact {
    /// Wraps a successful compiler output.
    pub fn from_output(fingerprint: Fingerprint, output: CompilerOutput) -> Self {
        Self {
            fingerprint,
            bytecode: output.bytecode,
            interface: output.interface,
            diagnostics: output.diagnostics,
        }
    }

    /// Encodes the artifact as a store payload.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let diagnostics =
            serde_json::to_string(&self.diagnostics).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        let stored = StoredArtifact {
            fingerprint: self.fingerprint,
            bytecode: self.bytecode.clone(),
            interface: self.interface.clone(),
            diagnostics,
        };
        bincode::serde::encode_to_vec(&stored, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })
    }

    /// Decodes a store payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let (stored, _): (StoredArtifact, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map_err(
                |e| CacheError::Serialization {
                    reason: e.to_string(),
                },
            )?;
        let diagnostics =
            serde_json::from_str(&stored.diagnostics).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        Ok(Self {
            fingerprint: stored.fingerprint,
            bytecode: stored.bytecode,
            interface: stored.interface,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::ContentHash;
    use kiln_diagnostics::DiagnosticCode;
    use kiln_source::SourcePosition;

    #[test]
    fn payload_preserves_diagnostics_with_empty_fields() {
        let artifact = Artifact {
            fingerprint: Fingerprint::from_hash(ContentHash::from_bytes(b"group")),
            bytecode: vec![0x60, 0x80, 0x60, 0x40],
            interface: r#"[{"type":"constructor"}]"#.to_string(),
            diagnostics: vec![
                Diagnostic::warning(DiagnosticCode::COMPILER_WARNING, "unused variable")
                    .with_unit("a.sol")
                    .with_position(SourcePosition::new(3, 9)),
                Diagnostic::info(DiagnosticCode::COMPILER_INFO, "no unit"),
            ],
        };
        let decoded = Artifact::decode(&artifact.encode().unwrap()).unwrap();
        assert_eq!(decoded, artifact);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Artifact::decode(b"\xff\xff\xff").is_err());
    }
}
