//! Pipeline File Cache
//!
//! Records which pipelines the application actually requests so a later run
//! can warm them up front. Every cache miss registers the descriptor hash and
//! a shared [`PipelineStateStats`] record; binding a pipeline updates the
//! record. The recorded set is persisted as a JSON [`PipelineUsageManifest`].
//!
//! Only hashes and counters are stored. Reconstructing descriptors from a
//! manifest is the front end's job (it owns the shader library); the cache
//! filters candidate descriptors against the manifest during a preload pass.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Manifest format version written by [`PipelineFileCache::manifest`].
pub const MANIFEST_VERSION: u32 = 1;

const NEVER_USED: u64 = u64::MAX;

/// Usage counters shared by every pipeline state created for one hash.
#[derive(Debug)]
pub struct PipelineStateStats {
    hash: u64,
    create_count: AtomicU64,
    bind_count: AtomicU64,
    first_frame_used: AtomicU64,
    last_frame_used: AtomicU64,
}

impl PipelineStateStats {
    fn new(hash: u64) -> Self {
        Self {
            hash,
            create_count: AtomicU64::new(0),
            bind_count: AtomicU64::new(0),
            first_frame_used: AtomicU64::new(NEVER_USED),
            last_frame_used: AtomicU64::new(NEVER_USED),
        }
    }

    /// Records one bind during `frame`.
    ///
    /// Counters are diagnostics only; relaxed ordering is enough.
    pub fn update(&self, frame: u64) {
        self.bind_count.fetch_add(1, Ordering::Relaxed);
        let _ = self.first_frame_used.compare_exchange(
            NEVER_USED,
            frame,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
        self.last_frame_used.store(frame, Ordering::Relaxed);
    }

    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[must_use]
    pub fn create_count(&self) -> u64 {
        self.create_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn bind_count(&self) -> u64 {
        self.bind_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn first_frame_used(&self) -> Option<u64> {
        match self.first_frame_used.load(Ordering::Relaxed) {
            NEVER_USED => None,
            frame => Some(frame),
        }
    }

    #[must_use]
    pub fn last_frame_used(&self) -> Option<u64> {
        match self.last_frame_used.load(Ordering::Relaxed) {
            NEVER_USED => None,
            frame => Some(frame),
        }
    }
}

/// Kind of pipeline recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PsoKind {
    Graphics,
    Compute,
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsoUsageRecord {
    pub hash: u64,
    pub create_count: u64,
    pub bind_count: u64,
}

/// Serializable snapshot of the recorded pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineUsageManifest {
    pub version: u32,
    pub graphics: Vec<PsoUsageRecord>,
    pub compute: Vec<PsoUsageRecord>,
}

impl PipelineUsageManifest {
    #[must_use]
    pub fn contains(&self, kind: PsoKind, hash: u64) -> bool {
        let records = match kind {
            PsoKind::Graphics => &self.graphics,
            PsoKind::Compute => &self.compute,
        };
        records.iter().any(|r| r.hash == hash)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[derive(Default)]
struct FileCacheInner {
    graphics: FxHashSet<u64>,
    compute: FxHashSet<u64>,
    stats: FxHashMap<u64, Arc<PipelineStateStats>>,
}

/// Thread-safe recorder of requested pipelines.
#[derive(Default)]
pub struct PipelineFileCache {
    inner: Mutex<FileCacheInner>,
}

impl PipelineFileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a graphics pipeline request.
    pub fn cache_graphics_pso(&self, hash: u64) {
        self.inner.lock().graphics.insert(hash);
    }

    /// Records a compute pipeline request.
    pub fn cache_compute_pso(&self, hash: u64) {
        self.inner.lock().compute.insert(hash);
    }

    /// Returns the stats record for `hash`, creating it on first use, and
    /// counts one more pipeline-state creation against it.
    pub fn register_pso_stats(&self, hash: u64) -> Arc<PipelineStateStats> {
        let stats = Arc::clone(
            self.inner
                .lock()
                .stats
                .entry(hash)
                .or_insert_with(|| Arc::new(PipelineStateStats::new(hash))),
        );
        stats.create_count.fetch_add(1, Ordering::Relaxed);
        stats
    }

    #[must_use]
    pub fn stats(&self, hash: u64) -> Option<Arc<PipelineStateStats>> {
        self.inner.lock().stats.get(&hash).cloned()
    }

    #[must_use]
    pub fn recorded_count(&self, kind: PsoKind) -> usize {
        let inner = self.inner.lock();
        match kind {
            PsoKind::Graphics => inner.graphics.len(),
            PsoKind::Compute => inner.compute.len(),
        }
    }

    /// Snapshot of everything recorded so far, sorted by hash.
    #[must_use]
    pub fn manifest(&self) -> PipelineUsageManifest {
        let inner = self.inner.lock();
        let record = |hash: &u64| {
            let stats = inner.stats.get(hash);
            PsoUsageRecord {
                hash: *hash,
                create_count: stats.map_or(0, |s| s.create_count()),
                bind_count: stats.map_or(0, |s| s.bind_count()),
            }
        };

        let mut graphics: Vec<_> = inner.graphics.iter().map(record).collect();
        let mut compute: Vec<_> = inner.compute.iter().map(record).collect();
        graphics.sort_unstable_by_key(|r| r.hash);
        compute.sort_unstable_by_key(|r| r.hash);

        PipelineUsageManifest {
            version: MANIFEST_VERSION,
            graphics,
            compute,
        }
    }

    /// Forgets every recorded pipeline and stats record.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.graphics.clear();
        inner.compute.clear();
        inner.stats.clear();
    }
}
