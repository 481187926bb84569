//! Pipeline State Cache
//!
//! [`PipelineStateCache`] is the entry point the rendering front end talks to.
//! It is constructed once at renderer initialization, shared by reference (or
//! `Arc`) with every recording thread and torn down with [`shutdown`].
//!
//! # Frame Protocol
//!
//! ```text
//!  recording threads (N)                     coordinating thread (1)
//!  ─────────────────────                     ───────────────────────
//!  set_graphics_pipeline_state ─┐
//!  set_compute_pipeline_state   ├─ find / add / dispatch compile
//!  submit(cmd) ─────────────────┘
//!                      ── all recording threads idle ──
//!                                            flush_resources()
//!                                              consolidate → cleanup
//!                                              → (every interval) evict
//! ```
//!
//! Graphics pipelines go through the thread-local / generation cache,
//! compute pipelines through the discardable cache and ray tracing pipelines
//! through a plain mutex-guarded map.
//!
//! # Failure Semantics
//!
//! A runtime request whose compile fails surfaces
//! [`PsoError::GraphicsCompileFailed`]: from `get_or_create_*` when compiling
//! inline, from `execute_set_*` when the compile ran in the background.
//! Preload requests ([`RequestOrigin::FileCachePreload`]) only warn; their
//! handles stay non-functional and `execute_set_*` reports them as not ready.
//!
//! [`shutdown`]: PipelineStateCache::shutdown

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::cache::discardable::DiscardableKeyValueCache;
use crate::cache::ray_tracing::RayTracingPipelineCache;
use crate::cache::shared::{ConsolidateStats, SharedPipelineStateCache};
use crate::errors::{PipelineFailureReport, PsoError, Result};
use crate::pipeline::completion::CompletionEvent;
use crate::pipeline::desc::{
    ComputePipelineDesc, GraphicsPipelineDesc, PipelineDesc, RayTracingPipelineDesc,
};
use crate::pipeline::file_cache::{PipelineFileCache, PipelineUsageManifest, PsoKind};
use crate::pipeline::scheduler::{CompileScheduler, SchedulerStats};
use crate::pipeline::state::{
    CompileStatus, ComputePipelineHandle, GraphicsPipelineHandle, PipelineState, RequestOrigin,
};
use crate::pipeline::task::{CompileTarget, CompileTask};
use crate::rhi::backend::{RhiBackend, RhiPipelineRef};
use crate::rhi::command::{CommandList, RecordedCommand};
use crate::rhi::shader::ShaderRef;
use crate::rhi::state::RenderTargetLayout;
use crate::settings::PipelineCacheSettings;
use crate::utils::time::{IntervalTimer, ScopeTimeGuard};

const RENDER_TARGET_CHECK_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// States first used within this window count as "recently used" in stats.
const RECENT_USE_WINDOW_SECS: f64 = 30.0;

/// How a graphics request treats the render targets bound on the command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplyRenderTargetOption {
    /// Use the descriptor as given.
    #[default]
    None,
    /// Replace the descriptor's render-target layout with the bound one.
    ForceApply,
    /// Compare against the bound layout, log a (rate-limited) error on
    /// mismatch and use the bound layout.
    CheckApply,
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// What one [`PipelineStateCache::flush_resources`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Frame that was closed by this flush.
    pub frame: u64,
    pub consolidated: ConsolidateStats,
    /// Duplicates released by delayed cleanup.
    pub cleaned_up: usize,
    /// Whether the aging pass ran.
    pub evicted: bool,
    pub compute_discarded: usize,
    pub graphics_discarded: usize,
}

/// Pipelines released by [`PipelineStateCache::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownStats {
    pub graphics: usize,
    pub compute: usize,
    pub ray_tracing: usize,
}

/// Outcome of a preload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadStats {
    pub requested: usize,
    pub ready: usize,
    pub failed: usize,
}

/// Snapshot of the cache contents and usage of the current graphics
/// generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineCacheStats {
    pub graphics_entries: usize,
    pub graphics_backfill_entries: usize,
    pub graphics_local_entries: usize,
    pub compute_entries: usize,
    pub ray_tracing_entries: usize,
    pub duplicates_generated: u64,

    /// Seconds since first use: min / max / average.
    pub secs_used: (f64, f64, f64),
    /// Entries first used within the last 30 seconds.
    pub used_recently: usize,
    /// Frames between first and last use: min / max / average.
    pub frames_used: (u64, u64, f64),
    pub total_hits: u64,
    pub items_with_hits_across_frames: usize,
    pub total_hits_across_frames: u64,
}

impl fmt::Display for PipelineCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Have {} GraphicsPipeline entries ({} backfill, {} thread-local), {} compute, {} ray tracing",
            self.graphics_entries,
            self.graphics_backfill_entries,
            self.graphics_local_entries,
            self.compute_entries,
            self.ray_tracing_entries
        )?;
        if self.graphics_entries > 0 {
            let n = self.graphics_entries as f64;
            let (min_secs, max_secs, avg_secs) = self.secs_used;
            let (min_frames, max_frames, avg_frames) = self.frames_used;
            writeln!(
                f,
                "Secs Used: Min={min_secs:.2}, Max={max_secs:.2}, Avg={avg_secs:.2}. {} used in last 30 secs",
                self.used_recently
            )?;
            writeln!(f, "Frames Used: Min={min_frames}, Max={max_frames}, Avg={avg_frames:.1}")?;
            writeln!(
                f,
                "Hits: Avg={:.1}, Items with hits across frames={}, Avg Hits across Frames={:.1}",
                self.total_hits as f64 / n,
                self.items_with_hits_across_frames,
                self.total_hits_across_frames as f64 / n
            )?;
        }
        write!(f, "Duplicate states generated: {}", self.duplicates_generated)
    }
}

// ─── Pipeline State Cache ─────────────────────────────────────────────────────

pub struct PipelineStateCache {
    settings: PipelineCacheSettings,
    backend: Arc<dyn RhiBackend>,
    scheduler: RwLock<Option<CompileScheduler>>,

    graphics: SharedPipelineStateCache<GraphicsPipelineDesc, GraphicsPipelineHandle>,
    compute: DiscardableKeyValueCache<ComputePipelineDesc, ComputePipelineHandle>,
    ray_tracing: RayTracingPipelineCache,
    file_cache: PipelineFileCache,

    frame: AtomicU64,
    eviction: Mutex<IntervalTimer>,
    last_render_target_error: Mutex<Option<Instant>>,
}

impl PipelineStateCache {
    /// Creates the cache and, if async compilation is enabled, its compile
    /// workers.
    pub fn new(backend: Arc<dyn RhiBackend>, settings: PipelineCacheSettings) -> Result<Self> {
        settings.validate()?;

        let scheduler = if settings.async_compile && backend.supports_async_compile() {
            Some(CompileScheduler::new(Arc::clone(&backend), settings.compile_threads)?)
        } else {
            None
        };

        log::info!(
            "Pipeline state cache: async compile {}, eviction interval {} s",
            if scheduler.is_some() { "on" } else { "off" },
            settings.eviction_interval_secs
        );

        Ok(Self {
            graphics: SharedPipelineStateCache::new(settings.time_guard()),
            compute: DiscardableKeyValueCache::new(),
            ray_tracing: RayTracingPipelineCache::new(),
            file_cache: PipelineFileCache::new(),
            frame: AtomicU64::new(0),
            eviction: Mutex::new(IntervalTimer::new(settings.eviction_interval(), Instant::now())),
            last_render_target_error: Mutex::new(None),
            scheduler: RwLock::new(scheduler),
            backend,
            settings,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PipelineCacheSettings {
        &self.settings
    }

    /// Number of flushes so far.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn file_cache(&self) -> &PipelineFileCache {
        &self.file_cache
    }

    #[must_use]
    pub fn graphics_cache(
        &self,
    ) -> &SharedPipelineStateCache<GraphicsPipelineDesc, GraphicsPipelineHandle> {
        &self.graphics
    }

    #[must_use]
    pub fn compute_cache(&self) -> &DiscardableKeyValueCache<ComputePipelineDesc, ComputePipelineHandle> {
        &self.compute
    }

    #[must_use]
    pub fn ray_tracing_cache(&self) -> &RayTracingPipelineCache {
        &self.ray_tracing
    }

    /// `None` when compiles run inline.
    #[must_use]
    pub fn scheduler_stats(&self) -> Option<SchedulerStats> {
        self.scheduler.read().as_ref().map(CompileScheduler::stats)
    }

    /// Whether requests recorded into `cmd` compile in the background.
    #[must_use]
    pub fn is_async_compilation_allowed(&self, cmd: &CommandList) -> bool {
        self.settings.async_compile && !cmd.is_bypass() && self.backend.supports_async_compile()
    }

    // ── Graphics ─────────────────────────────────────────────────────────────

    /// Returns the pipeline state for `desc`, creating and compiling it on a
    /// miss.
    ///
    /// With async compilation the returned state may still be compiling; its
    /// completion event has been queued on `cmd`. Otherwise the state is
    /// ready on return.
    pub fn get_or_create_graphics_pipeline_state(
        &self,
        cmd: &mut CommandList,
        desc: &GraphicsPipelineDesc,
        apply: ApplyRenderTargetOption,
        origin: RequestOrigin,
    ) -> Result<GraphicsPipelineHandle> {
        let desc = self.apply_render_targets(cmd, desc, apply);
        let async_compile = self.is_async_compilation_allowed(cmd);
        let frame = self.frame();

        if let Some(state) = self.graphics.find(&desc) {
            state.add_hit(frame);
            wait_or_queue(cmd, state.pending_completion(), async_compile);

            if !async_compile
                && !state.origin().is_preload()
                && state.status() == CompileStatus::Failed
            {
                return Err(PsoError::GraphicsCompileFailed(Box::new(
                    PipelineFailureReport::from_desc(&desc),
                )));
            }
            return Ok(state);
        }

        let hash = desc.hash64();
        self.file_cache.cache_graphics_pso(hash);
        let stats = self.file_cache.register_pso_stats(hash);

        let state = Arc::new(PipelineState::new(desc.into_owned(), origin, frame, Some(stats)));
        let task = CompileTask::new(CompileTarget::Graphics(Arc::clone(&state)));
        self.graphics.add(state.desc().clone(), Arc::clone(&state));

        self.compile(cmd, task, async_compile)?;
        Ok(state)
    }

    /// Looks the state up, marks it in use and records the bind into `cmd`.
    pub fn set_graphics_pipeline_state(
        &self,
        cmd: &mut CommandList,
        desc: &GraphicsPipelineDesc,
        apply: ApplyRenderTargetOption,
    ) -> Result<GraphicsPipelineHandle> {
        let state =
            self.get_or_create_graphics_pipeline_state(cmd, desc, apply, RequestOrigin::Runtime)?;
        state.acquire_use();
        cmd.record(RecordedCommand::SetGraphicsPipeline(Arc::clone(&state)));
        Ok(state)
    }

    /// Resolves a recorded bind at encode time and releases its in-use mark.
    ///
    /// `Ok(None)` means a preload state that never became ready.
    pub fn execute_set_graphics_pipeline_state(
        &self,
        state: &GraphicsPipelineHandle,
    ) -> Result<Option<RhiPipelineRef>> {
        state.release_use();

        match state.status() {
            CompileStatus::Ready => {
                state.add_use(self.frame());
                Ok(state.compiled())
            }
            _ if state.origin().is_preload() => Ok(None),
            CompileStatus::Failed => Err(PsoError::GraphicsCompileFailed(Box::new(
                PipelineFailureReport::from_desc(state.desc()),
            ))),
            CompileStatus::Pending => Err(PsoError::PipelineNotReady {
                label: state.label(),
            }),
        }
    }

    fn apply_render_targets<'a>(
        &self,
        cmd: &CommandList,
        desc: &'a GraphicsPipelineDesc,
        apply: ApplyRenderTargetOption,
    ) -> Cow<'a, GraphicsPipelineDesc> {
        let Some(bound) = cmd.cached_render_targets() else {
            return Cow::Borrowed(desc);
        };
        if apply == ApplyRenderTargetOption::None || desc.render_targets == *bound {
            return Cow::Borrowed(desc);
        }
        if apply == ApplyRenderTargetOption::CheckApply {
            self.report_render_target_mismatch(desc, bound);
        }
        Cow::Owned(desc.clone().with_render_targets(bound.clone()))
    }

    fn report_render_target_mismatch(&self, desc: &GraphicsPipelineDesc, bound: &RenderTargetLayout) {
        let now = Instant::now();
        let mut last = self.last_render_target_error.lock();
        if let Some(logged_at) = *last
            && now.duration_since(logged_at) < RENDER_TARGET_CHECK_LOG_INTERVAL
        {
            return;
        }
        *last = Some(now);

        log::error!(
            "Render target check failed for '{}': pipeline has {:?}, command list has {:?}",
            desc.label(),
            desc.render_targets,
            bound
        );
    }

    // ── Compute ──────────────────────────────────────────────────────────────

    /// Returns the compute pipeline state for `shader`, creating and compiling
    /// it on a miss.
    pub fn get_or_create_compute_pipeline_state(
        &self,
        cmd: &mut CommandList,
        shader: &ShaderRef,
    ) -> Result<ComputePipelineHandle> {
        let desc = ComputePipelineDesc::new(Arc::clone(shader));
        let async_compile = self.is_async_compilation_allowed(cmd);
        let frame = self.frame();

        // The task is created under the cache's write lock so the completion
        // event is attached before any other thread can see the state.
        let mut task = None;
        let (state, _) = self.compute.find_or_add_with(&desc, || {
            let hash = desc.hash64();
            self.file_cache.cache_compute_pso(hash);
            let stats = self.file_cache.register_pso_stats(hash);

            let state = Arc::new(PipelineState::new(
                desc.clone(),
                RequestOrigin::Runtime,
                frame,
                Some(stats),
            ));
            task = Some(CompileTask::new(CompileTarget::Compute(Arc::clone(&state))));
            state
        });

        if let Some(task) = task {
            self.compile(cmd, task, async_compile)?;
            return Ok(state);
        }

        state.add_hit(frame);
        wait_or_queue(cmd, state.pending_completion(), async_compile);
        if !async_compile && state.status() == CompileStatus::Failed {
            return Err(PsoError::ComputeCompileFailed {
                shader: shader.name().to_owned(),
            });
        }
        Ok(state)
    }

    pub fn set_compute_pipeline_state(
        &self,
        cmd: &mut CommandList,
        shader: &ShaderRef,
    ) -> Result<ComputePipelineHandle> {
        let state = self.get_or_create_compute_pipeline_state(cmd, shader)?;
        state.acquire_use();
        cmd.record(RecordedCommand::SetComputePipeline(Arc::clone(&state)));
        Ok(state)
    }

    pub fn execute_set_compute_pipeline_state(
        &self,
        state: &ComputePipelineHandle,
    ) -> Result<RhiPipelineRef> {
        state.release_use();

        match state.status() {
            CompileStatus::Ready => {
                state.add_use(self.frame());
                state.compiled().ok_or_else(|| PsoError::PipelineNotReady {
                    label: state.label(),
                })
            }
            CompileStatus::Failed => Err(PsoError::ComputeCompileFailed {
                shader: state.desc().shader.name().to_owned(),
            }),
            CompileStatus::Pending => Err(PsoError::PipelineNotReady {
                label: state.label(),
            }),
        }
    }

    // ── Ray Tracing ──────────────────────────────────────────────────────────

    /// Returns the compiled ray tracing pipeline for `desc`, compiling it
    /// synchronously on a miss. Failures are not cached.
    pub fn get_or_create_ray_tracing_pipeline_state(
        &self,
        desc: &RayTracingPipelineDesc,
    ) -> Result<RhiPipelineRef> {
        let frame = self.frame();
        let failed = || PsoError::RayTracingCompileFailed {
            ray_gen: desc.ray_gen.name().to_owned(),
        };

        if let Some(state) = self.ray_tracing.find(desc) {
            state.add_hit(frame);
            return state.compiled().ok_or_else(failed);
        }

        let Some(pipeline) = self.backend.create_ray_tracing_pipeline(desc) else {
            log::error!("Failed to create RayTracingPipeline '{}'", desc.label());
            return Err(failed());
        };

        let state = Arc::new(PipelineState::new(desc.clone(), RequestOrigin::Runtime, frame, None));
        state.set_compiled(Some(pipeline));

        // Another thread may have compiled the same descriptor meanwhile.
        let state = self.ray_tracing.add(desc.clone(), state);
        state.compiled().ok_or_else(failed)
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Waits for the compiles `cmd` depends on, then resolves every recorded
    /// bind in order. Returns the compiled pipelines that were bound.
    ///
    /// Every bind is resolved (and its in-use mark released) even if an
    /// earlier one fails; the first error is returned.
    pub fn submit(&self, cmd: &mut CommandList) -> Result<Vec<RhiPipelineRef>> {
        cmd.wait_for_pending_compiles();

        let mut bound = Vec::new();
        let mut first_error = None;
        for command in cmd.take_commands() {
            let result = match &command {
                RecordedCommand::SetGraphicsPipeline(state) => {
                    self.execute_set_graphics_pipeline_state(state)
                }
                RecordedCommand::SetComputePipeline(state) => {
                    self.execute_set_compute_pipeline_state(state).map(Some)
                }
            };
            match result {
                Ok(Some(pipeline)) => bound.push(pipeline),
                Ok(None) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(bound),
        }
    }

    // ── Compilation ──────────────────────────────────────────────────────────

    fn compile(&self, cmd: &mut CommandList, task: CompileTask, async_compile: bool) -> Result<()> {
        let task = if async_compile {
            let event = task.completion().clone();
            let rejected = match self.scheduler.read().as_ref() {
                Some(scheduler) => scheduler.dispatch(task).err(),
                None => Some(task),
            };
            let Some(task) = rejected else {
                cmd.queue_async_pipeline_state_compile(event);
                return Ok(());
            };
            log::warn!(
                "Pipeline compile scheduler is stopped; compiling '{}' inline",
                task.target().label()
            );
            task
        } else {
            task
        };

        let preload = task.target().origin().is_preload();
        match task.run(self.backend.as_ref()) {
            Err(err) if !preload => Err(err),
            _ => Ok(()),
        }
    }

    // ── Preloading ───────────────────────────────────────────────────────────

    /// Requests every descriptor as a best-effort preload and waits for the
    /// compiles. Failures are logged as warnings and counted.
    pub fn precompile_graphics<I>(&self, descs: I) -> PreloadStats
    where
        I: IntoIterator<Item = GraphicsPipelineDesc>,
    {
        let mut cmd = CommandList::new();
        let mut states = Vec::new();

        for desc in descs {
            match self.get_or_create_graphics_pipeline_state(
                &mut cmd,
                &desc,
                ApplyRenderTargetOption::None,
                RequestOrigin::FileCachePreload,
            ) {
                Ok(state) => states.push(state),
                Err(err) => log::warn!("Skipping preload of '{}': {err}", desc.label()),
            }
        }
        cmd.wait_for_pending_compiles();

        let mut stats = PreloadStats {
            requested: states.len(),
            ..PreloadStats::default()
        };
        for state in &states {
            match state.status() {
                CompileStatus::Ready => stats.ready += 1,
                CompileStatus::Failed => stats.failed += 1,
                CompileStatus::Pending => {}
            }
        }
        log::info!(
            "Preloaded {} of {} graphics pipelines ({} failed)",
            stats.ready,
            stats.requested,
            stats.failed
        );
        stats
    }

    /// Preloads the candidates whose hash appears in `manifest`.
    pub fn precompile_graphics_from_manifest<I>(
        &self,
        manifest: &PipelineUsageManifest,
        candidates: I,
    ) -> PreloadStats
    where
        I: IntoIterator<Item = GraphicsPipelineDesc>,
    {
        self.precompile_graphics(
            candidates
                .into_iter()
                .filter(|desc| manifest.contains(PsoKind::Graphics, desc.hash64())),
        )
    }

    // ── Frame boundary ───────────────────────────────────────────────────────

    /// End-of-frame maintenance. Must run while no recording thread is inside
    /// the cache.
    pub fn flush_resources(&self) -> FlushStats {
        self.flush_resources_at(Instant::now())
    }

    /// [`flush_resources`](Self::flush_resources) with an explicit clock.
    pub fn flush_resources_at(&self, now: Instant) -> FlushStats {
        let mut stats = FlushStats {
            frame: self.frame(),
            consolidated: self.graphics.consolidate_threaded_caches(),
            cleaned_up: self.graphics.process_delayed_cleanup(),
            ..FlushStats::default()
        };

        let due = {
            let mut timer = self.eviction.lock();
            if self.settings.evict_each_frame && timer.is_enabled() {
                timer.reset(now);
                true
            } else {
                timer.tick(now)
            }
        };

        if due {
            let _time = ScopeTimeGuard::new("TrimPipelineCache", self.settings.time_guard());
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("{}", self.stats_at(now));
            }

            stats.evicted = true;
            stats.compute_discarded = self.compute.discard(assert_not_in_use);
            stats.graphics_discarded = self.graphics.discard_and_swap();

            log::debug!(
                "Cleared pipeline state cache: {} compute entries, {} graphics entries",
                stats.compute_discarded,
                stats.graphics_discarded
            );
        }

        self.frame.fetch_add(1, Ordering::Relaxed);
        stats
    }

    /// Stops the compile workers and releases every cached pipeline.
    ///
    /// Must run while no recording thread is inside the cache. The cache stays
    /// usable afterwards and compiles inline.
    pub fn shutdown(&self) -> ShutdownStats {
        if let Some(mut scheduler) = self.scheduler.write().take() {
            scheduler.shutdown();
        }

        let mut stats = ShutdownStats {
            ray_tracing: self.ray_tracing.shutdown(),
            ..ShutdownStats::default()
        };

        // Every compile has finished, so consolidation moves all thread-local
        // entries where the two discards below can reach them.
        self.graphics.consolidate_threaded_caches();
        stats.graphics += self.graphics.process_delayed_cleanup();

        for _ in 0..2 {
            stats.compute += self.compute.discard(assert_not_in_use);
            stats.graphics += self.graphics.discard_and_swap();
        }
        self.file_cache.shutdown();

        log::info!(
            "Pipeline state cache shut down: released {} graphics, {} compute, {} ray tracing pipelines",
            stats.graphics,
            stats.compute,
            stats.ray_tracing
        );
        stats
    }

    // ── Statistics ───────────────────────────────────────────────────────────

    /// Computes the stats and logs them at info level.
    pub fn dump_stats(&self) -> PipelineCacheStats {
        let stats = self.stats_at(Instant::now());
        for line in stats.to_string().lines() {
            log::info!("{line}");
        }
        stats
    }

    #[must_use]
    pub fn stats_at(&self, now: Instant) -> PipelineCacheStats {
        let mut stats = PipelineCacheStats {
            graphics_backfill_entries: self.graphics.backfill_len(),
            graphics_local_entries: self.graphics.local_len(),
            compute_entries: self.compute.len(),
            ray_tracing_entries: self.ray_tracing.len(),
            duplicates_generated: self.graphics.duplicates_generated(),
            ..PipelineCacheStats::default()
        };

        let states = self.graphics.current_values();
        if states.is_empty() {
            return stats;
        }
        stats.graphics_entries = states.len();

        let (mut min_secs, mut max_secs, mut total_secs) = (f64::MAX, 0.0_f64, 0.0);
        let (mut min_frames, mut max_frames, mut total_frames) = (u64::MAX, 0_u64, 0_u64);

        for state in &states {
            let usage = state.usage();

            let since_use = now.saturating_duration_since(usage.first_used()).as_secs_f64();
            total_secs += since_use;
            min_secs = min_secs.min(since_use);
            max_secs = max_secs.max(since_use);
            if since_use <= RECENT_USE_WINDOW_SECS {
                stats.used_recently += 1;
            }

            let frames = usage.last_frame_used().saturating_sub(usage.first_frame_used());
            total_frames += frames;
            min_frames = min_frames.min(frames);
            max_frames = max_frames.max(frames);

            stats.total_hits += usage.hits();
            if usage.hits_across_frames() > 0 {
                stats.items_with_hits_across_frames += 1;
                stats.total_hits_across_frames += usage.hits_across_frames();
            }
        }

        let n = states.len() as f64;
        stats.secs_used = (min_secs, max_secs, total_secs / n);
        stats.frames_used = (min_frames, max_frames, total_frames as f64 / n);
        stats
    }
}

fn wait_or_queue(cmd: &mut CommandList, pending: Option<CompletionEvent>, async_compile: bool) {
    let Some(event) = pending else {
        return;
    };
    if async_compile {
        cmd.queue_async_pipeline_state_compile(event);
    } else {
        event.wait();
    }
}

fn assert_not_in_use(state: &ComputePipelineHandle) {
    assert_eq!(
        state.in_use_count(),
        0,
        "discarding compute pipeline state '{}' while it is still in use",
        state.label()
    );
}
