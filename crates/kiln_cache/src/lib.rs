//! Fingerprinting and artifact caching for the Kiln build engine.
//!
//! A [`Fingerprint`] identifies the exact inputs of one group compilation.
//! [`ArtifactCache`] maps fingerprints to [`Artifact`]s in memory and,
//! optionally, in a content-addressed directory on disk.

pub mod artifact;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod store;

pub use artifact::Artifact;
pub use cache::{
    ArtifactCache, CacheOptions, CacheStats, ComputeError, EntryOrigin, PinGuard, Resolution,
    Resolved,
};
pub use error::CacheError;
pub use fingerprint::{fingerprint, fingerprint_graph, Fingerprint};
pub use manifest::{CacheManifest, ManifestEntry};
pub use store::ArtifactStore;
