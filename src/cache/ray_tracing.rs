//! Ray-Tracing Pipeline Cache
//!
//! A single map behind a mutex. Ray-tracing pipelines are always compiled
//! synchronously and are never evicted; they live until [`shutdown`].
//!
//! [`shutdown`]: RayTracingPipelineCache::shutdown

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::pipeline::desc::RayTracingPipelineDesc;
use crate::pipeline::state::RayTracingPipelineHandle;

#[derive(Default)]
pub struct RayTracingPipelineCache {
    entries: Mutex<FxHashMap<RayTracingPipelineDesc, RayTracingPipelineHandle>>,
}

impl RayTracingPipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn find(&self, desc: &RayTracingPipelineDesc) -> Option<RayTracingPipelineHandle> {
        self.entries.lock().get(desc).cloned()
    }

    /// Inserts `state` unless an entry for `desc` already exists, and returns
    /// whichever entry ends up cached.
    pub fn add(
        &self,
        desc: RayTracingPipelineDesc,
        state: RayTracingPipelineHandle,
    ) -> RayTracingPipelineHandle {
        self.entries.lock().entry(desc).or_insert(state).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Releases every cached pipeline. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries.lock());
        entries.len()
    }
}
