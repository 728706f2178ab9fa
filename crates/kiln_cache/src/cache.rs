//! The artifact cache: an in-memory table with optional on-disk backing.
//!
//! Lookups, stores, and compute-on-miss are safe to call from many threads.
//! For any one fingerprint at most one computation runs at a time; other
//! requesters block until it finishes and observe the same result.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_toolchain::{CompilerFailure, CompilerOutput};
use parking_lot::{Condvar, Mutex};

use crate::artifact::Artifact;
use crate::error::CacheError;
use crate::fingerprint::Fingerprint;
use crate::manifest::CacheManifest;
use crate::store::ArtifactStore;

/// Version stamped into on-disk artifacts and the manifest.
const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tuning knobs for an [`ArtifactCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Upper bound on in-memory entries. `None` means unbounded.
    pub max_entries: Option<usize>,
}

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from memory or disk.
    pub hits: u64,
    /// Requests that found nothing and had to compute.
    pub misses: u64,
    /// New entries inserted.
    pub stores: u64,
    /// Entries dropped to respect `max_entries`.
    pub evictions: u64,
    /// Requests that waited on another thread's computation.
    pub joined: u64,
}

/// Describes where a stored artifact came from, for the on-disk manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOrigin {
    /// Identifier of the group.
    pub group: String,
    /// Compiler version used.
    pub compiler_version: String,
}

impl EntryOrigin {
    /// Creates an origin record.
    pub fn new(group: impl Into<String>, compiler_version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            compiler_version: compiler_version.into(),
        }
    }
}

/// How [`ArtifactCache::get_or_compute`] obtained its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Found in memory or on disk.
    Hit,
    /// Computed by this call.
    Computed,
    /// Computed by a concurrent call this one waited for.
    Joined,
}

/// A successful [`ArtifactCache::get_or_compute`].
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The artifact.
    pub artifact: Arc<Artifact>,
    /// Where it came from.
    pub resolution: Resolution,
}

/// A failed [`ArtifactCache::get_or_compute`].
///
/// Cloneable so every waiter on a shared computation gets its own copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    /// The computation failed. Nothing was cached.
    #[error(transparent)]
    Failed(#[from] CompilerFailure),
    /// The computed artifact differs from one already stored under the
    /// same fingerprint.
    #[error("fingerprint collision: {fingerprint} already maps to a different artifact")]
    Collision {
        /// The contested fingerprint.
        fingerprint: Fingerprint,
    },
}

struct Entry {
    artifact: Arc<Artifact>,
    last_used: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<Fingerprint, Entry>,
    in_flight: HashMap<Fingerprint, Arc<Flight>>,
    pins: HashMap<Fingerprint, usize>,
    clock: u64,
    stats: CacheStats,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, fingerprint: &Fingerprint) -> Option<Arc<Artifact>> {
        let now = self.tick();
        let entry = self.entries.get_mut(fingerprint)?;
        entry.last_used = now;
        Some(Arc::clone(&entry.artifact))
    }

    /// Inserts an artifact, or returns the equal one already present.
    /// `Err` carries the fingerprint when a different artifact is present.
    fn insert(
        &mut self,
        artifact: Arc<Artifact>,
        max_entries: Option<usize>,
    ) -> Result<Arc<Artifact>, Fingerprint> {
        let fingerprint = artifact.fingerprint;
        if let Some(existing) = self.entries.get(&fingerprint) {
            if *existing.artifact != *artifact {
                return Err(fingerprint);
            }
            return self.touch(&fingerprint).ok_or(fingerprint);
        }
        let last_used = self.tick();
        self.entries.insert(
            fingerprint,
            Entry {
                artifact: Arc::clone(&artifact),
                last_used,
            },
        );
        self.stats.stores += 1;
        if let Some(max) = max_entries {
            self.evict_to(max);
        }
        Ok(artifact)
    }

    /// Drops least-recently-used unpinned entries until at most `max` remain
    /// or only pinned entries are left.
    fn evict_to(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max {
            let victim = self
                .entries
                .iter()
                .filter(|(fp, _)| !self.pins.contains_key(*fp))
                .min_by_key(|(_, e)| e.last_used)
                .map(|(fp, _)| *fp);
            let Some(victim) = victim else {
                break;
            };
            self.entries.remove(&victim);
            self.stats.evictions += 1;
            evicted += 1;
            tracing::debug!(fingerprint = %victim, "evicted cache entry");
        }
        evicted
    }
}

/// A computation in progress. Waiters block on `ready` until `outcome` is set.
struct Flight {
    outcome: Mutex<Option<Result<Arc<Artifact>, ComputeError>>>,
    ready: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<Arc<Artifact>, ComputeError> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut outcome);
        }
    }
}

/// Completes a flight exactly once, even if the computation unwinds.
struct FlightGuard<'a> {
    cache: &'a ArtifactCache,
    fingerprint: Fingerprint,
    flight: Arc<Flight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(&mut self, result: Result<Arc<Artifact>, ComputeError>) {
        self.finished = true;
        self.cache.state.lock().in_flight.remove(&self.fingerprint);
        *self.flight.outcome.lock() = Some(result);
        self.flight.ready.notify_all();
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(Err(ComputeError::Failed(CompilerFailure::process_error(
                "computation abandoned",
            ))));
        }
    }
}

/// Holds a fingerprint exempt from eviction until dropped.
pub struct PinGuard<'a> {
    cache: &'a ArtifactCache,
    fingerprint: Fingerprint,
}

impl PinGuard<'_> {
    /// The pinned fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state.lock();
        if let Some(count) = state.pins.get_mut(&self.fingerprint) {
            *count -= 1;
            if *count == 0 {
                state.pins.remove(&self.fingerprint);
            }
        }
        if let Some(max) = self.cache.options.max_entries {
            state.evict_to(max);
        }
    }
}

struct Disk {
    dir: PathBuf,
    store: ArtifactStore,
    manifest: Mutex<CacheManifest>,
}

/// Fingerprint-addressed artifact cache.
///
/// In-memory by default. [`persistent`](Self::persistent) layers a disk
/// store underneath: memory misses fall through to disk and promote, and
/// stores write through. `max_entries` bounds memory only; the disk is
/// bounded with [`prune`](Self::prune).
pub struct ArtifactCache {
    state: Mutex<State>,
    disk: Option<Disk>,
    options: CacheOptions,
}

impl ArtifactCache {
    /// Creates an in-memory cache.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            state: Mutex::new(State::default()),
            disk: None,
            options,
        }
    }

    /// Opens (or creates) a cache backed by `dir`.
    pub fn persistent(dir: &Path, options: CacheOptions) -> Result<Self, CacheError> {
        std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
        let manifest = CacheManifest::load_or_new(dir, TOOL_VERSION);
        tracing::debug!(dir = %dir.display(), entries = manifest.entries.len(), "opened artifact cache");
        Ok(Self {
            state: Mutex::new(State::default()),
            disk: Some(Disk {
                dir: dir.to_path_buf(),
                store: ArtifactStore::new(dir, TOOL_VERSION),
                manifest: Mutex::new(manifest),
            }),
            options,
        })
    }

    /// The backing directory, if persistent.
    pub fn dir(&self) -> Option<&Path> {
        self.disk.as_ref().map(|d| d.dir.as_path())
    }

    /// Looks up an artifact, consulting disk on a memory miss.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<Artifact>> {
        {
            let mut state = self.state.lock();
            if let Some(artifact) = state.touch(fingerprint) {
                state.stats.hits += 1;
                drop(state);
                self.record_use(fingerprint);
                tracing::debug!(%fingerprint, "cache hit");
                return Some(artifact);
            }
        }
        match self.promote_from_disk(fingerprint) {
            Some(artifact) => Some(artifact),
            None => {
                self.state.lock().stats.misses += 1;
                tracing::debug!(%fingerprint, "cache miss");
                None
            }
        }
    }

    /// Stores an artifact under its fingerprint.
    ///
    /// Storing an artifact equal to the one already present is a no-op that
    /// returns the existing entry. Storing a different artifact under a
    /// fingerprint already in use fails with
    /// [`CacheError::FingerprintCollision`] and leaves the existing entry
    /// intact.
    pub fn store(&self, artifact: Artifact, origin: &EntryOrigin) -> Result<Arc<Artifact>, CacheError> {
        self.insert_shared(Arc::new(artifact), origin)
            .map_err(|fingerprint| CacheError::FingerprintCollision { fingerprint })
    }

    /// Returns the artifact for `fingerprint`, running `compute` on a miss.
    ///
    /// If another thread is already computing the same fingerprint this call
    /// waits for it instead. Failed computations are handed to every waiter
    /// and are not cached, so the next request computes again.
    pub fn get_or_compute<F>(
        &self,
        fingerprint: Fingerprint,
        origin: &EntryOrigin,
        compute: F,
    ) -> Result<Resolved, ComputeError>
    where
        F: FnOnce() -> Result<CompilerOutput, CompilerFailure>,
    {
        let flight = {
            let mut state = self.state.lock();
            if let Some(artifact) = state.touch(&fingerprint) {
                state.stats.hits += 1;
                drop(state);
                self.record_use(&fingerprint);
                tracing::debug!(%fingerprint, "cache hit");
                return Ok(Resolved {
                    artifact,
                    resolution: Resolution::Hit,
                });
            }
            if let Some(flight) = state.in_flight.get(&fingerprint) {
                let flight = Arc::clone(flight);
                state.stats.joined += 1;
                drop(state);
                tracing::debug!(%fingerprint, "waiting on in-flight computation");
                return flight.wait().map(|artifact| Resolved {
                    artifact,
                    resolution: Resolution::Joined,
                });
            }
            let flight = Arc::new(Flight::new());
            state.in_flight.insert(fingerprint, Arc::clone(&flight));
            flight
        };
        let mut guard = FlightGuard {
            cache: self,
            fingerprint,
            flight,
            finished: false,
        };

        if let Some(artifact) = self.promote_from_disk(&fingerprint) {
            guard.finish(Ok(Arc::clone(&artifact)));
            return Ok(Resolved {
                artifact,
                resolution: Resolution::Hit,
            });
        }

        self.state.lock().stats.misses += 1;
        tracing::debug!(%fingerprint, "cache miss");
        let result = match compute() {
            Ok(output) => {
                let artifact = Arc::new(Artifact::from_output(fingerprint, output));
                self.insert_shared(artifact, origin)
                    .map_err(|fingerprint| ComputeError::Collision { fingerprint })
            }
            Err(failure) => Err(ComputeError::Failed(failure)),
        };
        guard.finish(result.clone());
        result.map(|artifact| Resolved {
            artifact,
            resolution: Resolution::Computed,
        })
    }

    /// Exempts `fingerprint` from eviction until the guard is dropped.
    ///
    /// The fingerprint need not be present yet; a pin taken before the
    /// artifact is stored still protects it once it arrives.
    pub fn pin(&self, fingerprint: Fingerprint) -> PinGuard<'_> {
        *self.state.lock().pins.entry(fingerprint).or_insert(0) += 1;
        PinGuard {
            cache: self,
            fingerprint,
        }
    }

    /// Returns `true` if `fingerprint` is currently pinned.
    pub fn is_pinned(&self, fingerprint: &Fingerprint) -> bool {
        self.state.lock().pins.contains_key(fingerprint)
    }

    /// Returns `true` if `fingerprint` is in memory. Does not count as a use.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.state.lock().entries.contains_key(fingerprint)
    }

    /// Number of in-memory entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` if no entries are in memory.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Number of artifacts recorded on disk.
    pub fn disk_len(&self) -> usize {
        self.disk
            .as_ref()
            .map(|d| d.manifest.lock().entries.len())
            .unwrap_or(0)
    }

    /// Writes the manifest. A no-op for in-memory caches.
    pub fn save(&self) -> Result<(), CacheError> {
        match &self.disk {
            Some(disk) => disk.manifest.lock().save(&disk.dir),
            None => Ok(()),
        }
    }

    /// Removes least-recently-used entries until at most `max_entries`
    /// remain, skipping pinned ones. Applies to disk when persistent and to
    /// memory otherwise. Returns the number removed.
    pub fn prune(&self, max_entries: usize) -> Result<usize, CacheError> {
        let Some(disk) = &self.disk else {
            return Ok(self.state.lock().evict_to(max_entries));
        };

        let pinned: HashSet<Fingerprint> = self.state.lock().pins.keys().copied().collect();
        let mut removed = Vec::new();
        {
            let mut manifest = disk.manifest.lock();
            let order = manifest.lru_order();
            let mut excess = order.len().saturating_sub(max_entries);
            for fingerprint in order {
                if excess == 0 {
                    break;
                }
                if pinned.contains(&fingerprint) {
                    continue;
                }
                disk.store.remove(&fingerprint)?;
                manifest.remove(&fingerprint);
                removed.push(fingerprint);
                excess -= 1;
            }
            manifest.save(&disk.dir)?;
        }

        let mut state = self.state.lock();
        for fingerprint in &removed {
            state.entries.remove(fingerprint);
        }
        tracing::info!(removed = removed.len(), "pruned artifact cache");
        Ok(removed.len())
    }

    /// Deletes artifact files the manifest does not reference and manifest
    /// entries whose file is gone. Returns the number of files deleted.
    pub fn gc(&self) -> Result<usize, CacheError> {
        let Some(disk) = &self.disk else {
            return Ok(0);
        };
        let mut manifest = disk.manifest.lock();
        let removed = disk.store.gc(|fp| manifest.entries.contains_key(fp))?;
        let on_disk: HashSet<Fingerprint> = disk.store.list()?.into_iter().collect();
        manifest.entries.retain(|fp, _| on_disk.contains(fp));
        manifest.save(&disk.dir)?;
        tracing::info!(removed, "garbage-collected artifact cache");
        Ok(removed)
    }

    /// Drops every unpinned in-memory entry and, when persistent, every
    /// artifact on disk.
    pub fn clear(&self) -> Result<(), CacheError> {
        {
            let mut state = self.state.lock();
            let pins = std::mem::take(&mut state.pins);
            state.entries.retain(|fp, _| pins.contains_key(fp));
            state.pins = pins;
        }
        if let Some(disk) = &self.disk {
            let mut manifest = disk.manifest.lock();
            manifest.entries.clear();
            disk.store.gc(|_| false)?;
            manifest.save(&disk.dir)?;
        }
        Ok(())
    }

    /// Reads from disk and inserts into memory. Counts a hit on success.
    fn promote_from_disk(&self, fingerprint: &Fingerprint) -> Option<Arc<Artifact>> {
        let disk = self.disk.as_ref()?;
        let artifact = Arc::new(disk.store.read(fingerprint)?);
        let artifact = {
            let mut state = self.state.lock();
            state.stats.hits += 1;
            match state.insert(Arc::clone(&artifact), self.options.max_entries) {
                Ok(stored) => stored,
                // Memory gained a different entry meanwhile; memory wins.
                Err(_) => state.touch(fingerprint).unwrap_or(artifact),
            }
        };
        self.record_use(fingerprint);
        tracing::debug!(%fingerprint, "cache hit (disk)");
        Some(artifact)
    }

    fn insert_shared(
        &self,
        artifact: Arc<Artifact>,
        origin: &EntryOrigin,
    ) -> Result<Arc<Artifact>, Fingerprint> {
        let fingerprint = artifact.fingerprint;
        {
            let state = self.state.lock();
            if let Some(existing) = state.entries.get(&fingerprint) {
                if *existing.artifact != *artifact {
                    return Err(fingerprint);
                }
            }
        }

        if let Some(disk) = &self.disk {
            match disk.store.write(&artifact) {
                Ok(()) => disk.manifest.lock().touch(
                    fingerprint,
                    Some((origin.group.as_str(), origin.compiler_version.as_str())),
                ),
                Err(CacheError::FingerprintCollision { fingerprint }) => return Err(fingerprint),
                Err(e) => {
                    tracing::warn!(%fingerprint, error = %e, "could not persist artifact");
                }
            }
        }

        let stored = self
            .state
            .lock()
            .insert(artifact, self.options.max_entries)?;
        tracing::debug!(%fingerprint, group = %origin.group, "stored artifact");
        Ok(stored)
    }

    fn record_use(&self, fingerprint: &Fingerprint) {
        if let Some(disk) = &self.disk {
            disk.manifest.lock().touch(*fingerprint, None);
        }
    }
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}
