//! Pipeline State Objects
//!
//! A [`PipelineState`] owns one descriptor and, once compilation finishes, the
//! compiled backend object. It is created on a cache miss and shared as an
//! `Arc` handle between the cache, recording threads and at most one compile
//! task.
//!
//! # Lifecycle
//!
//! ```text
//! miss ──► Pending ──(compile task / inline)──► Ready ──► … ──► evicted ──► dropped
//!                    └──────────────────────────► Failed
//! ```
//!
//! The compiled object is released when the last handle is dropped, which
//! only happens after the cache has verified that no recorded command still
//! references the state (see [`PipelineState::in_use_count`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::pipeline::completion::CompletionEvent;
use crate::pipeline::desc::{
    ComputePipelineDesc, GraphicsPipelineDesc, PipelineDesc, RayTracingPipelineDesc,
};
use crate::pipeline::file_cache::PipelineStateStats;
use crate::rhi::backend::RhiPipelineRef;

/// Where a pipeline request came from.
///
/// Decides how a compile failure is treated: fatal for runtime requests,
/// a warning for best-effort preloading from the pipeline file cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestOrigin {
    #[default]
    Runtime,
    FileCachePreload,
}

impl RequestOrigin {
    #[inline]
    #[must_use]
    pub fn is_preload(self) -> bool {
        matches!(self, Self::FileCachePreload)
    }
}

/// Compilation status of a pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileStatus {
    Pending,
    Ready,
    Failed,
}

enum CompiledSlot {
    Pending,
    Ready(RhiPipelineRef),
    Failed,
}

// ─── Usage Stats ──────────────────────────────────────────────────────────────

const NO_FRAME: u64 = u64::MAX;

/// Per-state hit counters. Diagnostics only; updates are relaxed and may be
/// approximate under races.
#[derive(Debug)]
pub struct UsageStats {
    first_used: Instant,
    last_used_nanos: AtomicU64,
    first_frame_used: u64,
    last_frame_used: AtomicU64,
    hits: AtomicU64,
    hits_across_frames: AtomicU64,
}

impl UsageStats {
    fn new(frame: u64) -> Self {
        Self {
            first_used: Instant::now(),
            last_used_nanos: AtomicU64::new(0),
            first_frame_used: frame,
            last_frame_used: AtomicU64::new(NO_FRAME),
            hits: AtomicU64::new(0),
            hits_across_frames: AtomicU64::new(0),
        }
    }

    fn add_hit(&self, frame: u64) {
        let since_first = self.first_used.elapsed().as_nanos() as u64;
        self.last_used_nanos.store(since_first, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);

        if self.last_frame_used.swap(frame, Ordering::Relaxed) != frame {
            self.hits_across_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn first_used(&self) -> Instant {
        self.first_used
    }

    #[must_use]
    pub fn last_used(&self) -> Instant {
        self.first_used + Duration::from_nanos(self.last_used_nanos.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn first_frame_used(&self) -> u64 {
        self.first_frame_used
    }

    /// Last frame with a hit, or the creation frame if never hit.
    #[must_use]
    pub fn last_frame_used(&self) -> u64 {
        match self.last_frame_used.load(Ordering::Relaxed) {
            NO_FRAME => self.first_frame_used,
            frame => frame,
        }
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn hits_across_frames(&self) -> u64 {
        self.hits_across_frames.load(Ordering::Relaxed)
    }
}

// ─── Pipeline State ───────────────────────────────────────────────────────────

/// A cached pipeline: descriptor, compiled object and bookkeeping.
pub struct PipelineState<D: PipelineDesc> {
    desc: D,
    origin: RequestOrigin,
    compiled: RwLock<CompiledSlot>,
    completion: Mutex<Option<CompletionEvent>>,
    in_use: AtomicI32,
    usage: UsageStats,
    stats: Option<Arc<PipelineStateStats>>,
}

pub type GraphicsPipelineState = PipelineState<GraphicsPipelineDesc>;
pub type ComputePipelineState = PipelineState<ComputePipelineDesc>;
pub type RayTracingPipelineState = PipelineState<RayTracingPipelineDesc>;

/// Handle returned to the rendering front end.
pub type GraphicsPipelineHandle = Arc<GraphicsPipelineState>;
pub type ComputePipelineHandle = Arc<ComputePipelineState>;
pub type RayTracingPipelineHandle = Arc<RayTracingPipelineState>;

impl<D: PipelineDesc> PipelineState<D> {
    /// Creates a pending state. `frame` is the cache frame it was created in.
    #[must_use]
    pub fn new(
        desc: D,
        origin: RequestOrigin,
        frame: u64,
        stats: Option<Arc<PipelineStateStats>>,
    ) -> Self {
        Self {
            desc,
            origin,
            compiled: RwLock::new(CompiledSlot::Pending),
            completion: Mutex::new(None),
            in_use: AtomicI32::new(0),
            usage: UsageStats::new(frame),
            stats,
        }
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> &D {
        &self.desc
    }

    #[inline]
    #[must_use]
    pub fn origin(&self) -> RequestOrigin {
        self.origin
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.desc.label()
    }

    // ── Compiled object ──────────────────────────────────────────────────────

    /// The compiled backend object, if compilation succeeded.
    #[must_use]
    pub fn compiled(&self) -> Option<RhiPipelineRef> {
        match &*self.compiled.read() {
            CompiledSlot::Ready(pipeline) => Some(Arc::clone(pipeline)),
            CompiledSlot::Pending | CompiledSlot::Failed => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> CompileStatus {
        match &*self.compiled.read() {
            CompiledSlot::Pending => CompileStatus::Pending,
            CompiledSlot::Ready(_) => CompileStatus::Ready,
            CompiledSlot::Failed => CompileStatus::Failed,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status() == CompileStatus::Ready
    }

    /// Stores the compile result. `None` marks the state as failed.
    pub(crate) fn set_compiled(&self, pipeline: Option<RhiPipelineRef>) {
        *self.compiled.write() = match pipeline {
            Some(pipeline) => CompiledSlot::Ready(pipeline),
            None => CompiledSlot::Failed,
        };
    }

    // ── Completion event ─────────────────────────────────────────────────────

    pub(crate) fn set_completion_event(&self, event: CompletionEvent) {
        *self.completion.lock() = Some(event);
    }

    /// Drops the completion event once it is no longer needed.
    pub fn clear_completion_event(&self) {
        self.completion.lock().take();
    }

    /// The compile event, if one is still attached and has not fired.
    #[must_use]
    pub fn pending_completion(&self) -> Option<CompletionEvent> {
        self.completion
            .lock()
            .as_ref()
            .filter(|event| !event.is_complete())
            .cloned()
    }

    /// `true` when no compile is in flight.
    #[must_use]
    pub fn is_compile_complete(&self) -> bool {
        self.completion
            .lock()
            .as_ref()
            .is_none_or(CompletionEvent::is_complete)
    }

    // ── In-use tracking ──────────────────────────────────────────────────────

    /// Number of recorded-but-not-executed binds of this state.
    #[must_use]
    pub fn in_use_count(&self) -> i32 {
        self.in_use.load(Ordering::Acquire)
    }

    pub(crate) fn acquire_use(&self) {
        let count = self.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        assert!(count >= 1, "pipeline state in-use count overflowed");
    }

    pub(crate) fn release_use(&self) {
        let count = self.in_use.fetch_sub(1, Ordering::AcqRel) - 1;
        assert!(
            count >= 0,
            "pipeline state '{}' released more often than it was bound",
            self.label()
        );
    }

    // ── Statistics ───────────────────────────────────────────────────────────

    /// Records a cache hit during `frame`.
    pub fn add_hit(&self, frame: u64) {
        self.usage.add_hit(frame);
    }

    /// Records a bind at command-encode time during `frame`.
    pub fn add_use(&self, frame: u64) {
        if let Some(stats) = &self.stats {
            stats.update(frame);
        }
    }

    #[must_use]
    pub fn usage(&self) -> &UsageStats {
        &self.usage
    }

    #[must_use]
    pub fn file_cache_stats(&self) -> Option<&Arc<PipelineStateStats>> {
        self.stats.as_ref()
    }
}

impl<D: PipelineDesc> std::fmt::Debug for PipelineState<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("label", &self.label())
            .field("status", &self.status())
            .field("origin", &self.origin)
            .field("in_use", &self.in_use_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::backend::{NullPipeline, RhiPipelineRef};
    use crate::rhi::shader::{Shader, ShaderStage};

    fn state() -> ComputePipelineState {
        let shader = Shader::shared("ClearCS", ShaderStage::Compute, vec![5u8; 8]);
        PipelineState::new(ComputePipelineDesc::new(shader), RequestOrigin::Runtime, 0, None)
    }

    fn pipeline() -> RhiPipelineRef {
        Arc::new(NullPipeline {
            id: 1,
            label: "ClearCS".into(),
        })
    }

    #[test]
    fn test_new_state_is_pending() {
        let state = state();
        assert_eq!(state.status(), CompileStatus::Pending);
        assert!(state.compiled().is_none());
        assert!(state.is_compile_complete());
    }

    #[test]
    fn test_set_compiled_transitions() {
        let ok = state();
        ok.set_compiled(Some(pipeline()));
        assert!(ok.is_ready());
        assert_eq!(ok.compiled().unwrap().label(), "ClearCS");

        let failed = state();
        failed.set_compiled(None);
        assert_eq!(failed.status(), CompileStatus::Failed);
        assert!(failed.compiled().is_none());
    }

    #[test]
    fn test_completion_event_tracking() {
        let state = state();
        let event = CompletionEvent::new();
        state.set_completion_event(event.clone());

        assert!(!state.is_compile_complete());
        assert!(state.pending_completion().is_some());

        event.complete();
        assert!(state.is_compile_complete());
        assert!(state.pending_completion().is_none());

        state.clear_completion_event();
        assert!(state.is_compile_complete());
    }

    #[test]
    fn test_hits_across_frames() {
        let state = state();
        state.add_hit(1);
        state.add_hit(1);
        state.add_hit(2);

        assert_eq!(state.usage().hits(), 3);
        assert_eq!(state.usage().hits_across_frames(), 2);
        assert_eq!(state.usage().last_frame_used(), 2);
        assert!(state.usage().last_used() >= state.usage().first_used());
    }

    #[test]
    fn test_in_use_balance() {
        let state = state();
        state.acquire_use();
        state.acquire_use();
        assert_eq!(state.in_use_count(), 2);
        state.release_use();
        state.release_use();
        assert_eq!(state.in_use_count(), 0);
    }

    #[test]
    #[should_panic(expected = "released more often")]
    fn test_release_without_acquire_panics() {
        state().release_use();
    }
}
