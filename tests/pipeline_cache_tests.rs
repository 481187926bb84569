//! Pipeline State Cache Integration Tests
//!
//! Tests for:
//! - Descriptor identity: equal descriptors share a state, any change misses
//! - Sync vs. async compilation and command-list compile waits
//! - Flush: consolidation, generational eviction, eviction interval 0
//! - Compile failures: runtime requests vs. file-cache preloads
//! - Ray tracing cache, usage manifest, shutdown

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use myth_pso::pipeline::file_cache::PipelineUsageManifest;
use myth_pso::rhi::state::BlendState;
use myth_pso::{
    ApplyRenderTargetOption, CommandList, CompileStatus, PipelineDesc, PsoError, PsoKind,
    RayTracingPipelineDesc, RequestOrigin, ShaderStage,
};

use common::{CountingBackend, async_settings, graphics_desc, new_cache, shader, sync_settings};

const NONE: ApplyRenderTargetOption = ApplyRenderTargetOption::None;

// ============================================================================
// Descriptor Identity
// ============================================================================

#[test]
fn compute_hit_does_not_recompile() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();
    let s1 = shader("S1", ShaderStage::Compute);

    let first = cache.get_or_create_compute_pipeline_state(&mut cmd, &s1).unwrap();
    let second = cache.get_or_create_compute_pipeline_state(&mut cmd, &s1).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend.compute_created(), 1);
}

#[test]
fn compute_hit_with_equal_shader_content() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();

    // Two allocations of the same shader.
    cache
        .get_or_create_compute_pipeline_state(&mut cmd, &shader("S1", ShaderStage::Compute))
        .unwrap();
    cache
        .get_or_create_compute_pipeline_state(&mut cmd, &shader("S1", ShaderStage::Compute))
        .unwrap();

    assert_eq!(backend.compute_created(), 1);
}

#[test]
fn graphics_blend_change_misses() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();

    let g1 = graphics_desc("A", "B");
    let g2 = g1.clone().with_blend(BlendState::alpha_blend());
    assert_ne!(g1.hash64(), g2.hash64());

    let s1 = cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &g1, NONE, RequestOrigin::Runtime)
        .unwrap();
    let s2 = cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &g2, NONE, RequestOrigin::Runtime)
        .unwrap();

    assert!(!Arc::ptr_eq(&s1, &s2));
    assert_eq!(backend.graphics_created(), 2);
}

#[test]
fn graphics_find_after_add_returns_same_state_until_eviction() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();
    let desc = graphics_desc("A", "B");

    let added = cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
        .unwrap();
    for _ in 0..3 {
        let found = cache
            .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
            .unwrap();
        assert!(Arc::ptr_eq(&added, &found));
    }
    cache.flush_resources();
    let found = cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
        .unwrap();
    assert!(Arc::ptr_eq(&added, &found));
    assert_eq!(backend.graphics_created(), 1);
    assert_eq!(added.usage().hits(), 4);
}

#[test]
fn misses_are_recorded_in_the_file_cache() {
    let (_, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();
    let desc = graphics_desc("A", "B");

    let state = cache.set_graphics_pipeline_state(&mut cmd, &desc, NONE).unwrap();
    cache.submit(&mut cmd).unwrap();

    assert_eq!(cache.file_cache().recorded_count(PsoKind::Graphics), 1);
    let stats = cache.file_cache().stats(desc.hash64()).unwrap();
    assert_eq!(stats.create_count(), 1);
    assert_eq!(stats.bind_count(), 1);
    assert!(Arc::ptr_eq(state.file_cache_stats().unwrap(), &stats));
}

// ============================================================================
// Sync vs. Async Compilation
// ============================================================================

#[test]
fn sync_mode_always_returns_ready_state() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();

    for i in 0..16 {
        let desc = graphics_desc(&format!("VS{i}"), "PS");
        let state = cache
            .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
            .unwrap();
        assert_eq!(state.status(), CompileStatus::Ready);
        assert!(state.compiled().is_some());
    }
    assert_eq!(cmd.pending_compile_count(), 0);
    assert_eq!(backend.graphics_created(), 16);
    assert!(cache.scheduler_stats().is_none());
}

#[test]
fn async_mode_queues_wait_on_command_list() {
    let (backend, gate) = CountingBackend::gated();
    let (backend_ref, cache) = new_cache(backend, async_settings());
    let mut cmd = CommandList::new();
    let desc = graphics_desc("A", "B");

    let state = cache.set_graphics_pipeline_state(&mut cmd, &desc, NONE).unwrap();
    assert_eq!(state.status(), CompileStatus::Pending);
    assert_eq!(cmd.pending_compile_count(), 1);

    // A second request on the same thread hits and shares the wait.
    let again = cache.set_graphics_pipeline_state(&mut cmd, &desc, NONE).unwrap();
    assert!(Arc::ptr_eq(&state, &again));
    assert_eq!(cmd.pending_compile_count(), 1);

    gate.complete();
    let bound = cache.submit(&mut cmd).unwrap();

    assert_eq!(bound.len(), 2);
    assert!(state.is_ready());
    assert_eq!(state.in_use_count(), 0);
    assert_eq!(backend_ref.graphics_created(), 1);
}

#[test]
fn pending_compile_stays_thread_local_until_complete() {
    let (backend, gate) = CountingBackend::gated();
    let (_, cache) = new_cache(backend, async_settings());
    let mut cmd = CommandList::new();
    let desc = graphics_desc("A", "B");

    let state = cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
        .unwrap();

    let flush = cache.flush_resources();
    assert_eq!(flush.consolidated.pending, 1);
    assert_eq!(cache.graphics_cache().current_len(), 0);

    gate.complete();
    cmd.wait_for_pending_compiles();

    let flush = cache.flush_resources();
    assert_eq!(flush.consolidated.promoted, 1);
    assert!(Arc::ptr_eq(&cache.graphics_cache().current_get(&desc).unwrap(), &state));
}

#[test]
fn bypass_command_list_compiles_inline() {
    let (_, cache) = new_cache(CountingBackend::new(), async_settings());
    let mut cmd = CommandList::immediate();
    assert!(!cache.is_async_compilation_allowed(&cmd));

    let state = cache
        .get_or_create_graphics_pipeline_state(
            &mut cmd,
            &graphics_desc("A", "B"),
            NONE,
            RequestOrigin::Runtime,
        )
        .unwrap();
    assert!(state.is_ready());
    assert_eq!(cmd.pending_compile_count(), 0);
}

#[test]
fn backend_without_async_support_compiles_inline() {
    let (_, cache) = new_cache(CountingBackend::inline_only(), async_settings());
    let mut cmd = CommandList::new();

    let state = cache
        .get_or_create_compute_pipeline_state(&mut cmd, &shader("CS", ShaderStage::Compute))
        .unwrap();
    assert!(state.is_ready());
    assert!(cache.scheduler_stats().is_none());
}

#[test]
fn async_compute_compiles_in_background() {
    let (backend, gate) = CountingBackend::gated();
    let (_, cache) = new_cache(backend, async_settings());
    let mut cmd = CommandList::new();
    let cs = shader("CS", ShaderStage::Compute);

    let state = cache.set_compute_pipeline_state(&mut cmd, &cs).unwrap();
    assert_eq!(state.status(), CompileStatus::Pending);

    gate.complete();
    let bound = cache.submit(&mut cmd).unwrap();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].label(), "CS");
    assert_eq!(cache.scheduler_stats().unwrap().dispatched, 1);
}

// ============================================================================
// Flush & Eviction
// ============================================================================

#[test]
fn unused_entries_age_out_after_two_intervals() {
    let start = Instant::now();
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();
    let desc = graphics_desc("A", "B");

    cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
        .unwrap();
    cache
        .get_or_create_compute_pipeline_state(&mut cmd, &shader("CS", ShaderStage::Compute))
        .unwrap();

    let flush = cache.flush_resources_at(start + Duration::from_secs(61));
    assert!(flush.evicted);
    assert_eq!(flush.graphics_discarded, 0);
    assert!(cache.graphics_cache().backfill_contains(&desc));

    let flush = cache.flush_resources_at(start + Duration::from_secs(122));
    assert!(flush.evicted);
    assert_eq!(flush.graphics_discarded, 1);
    assert_eq!(flush.compute_discarded, 1);

    // Aged out: requesting it again compiles again.
    cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
        .unwrap();
    assert_eq!(backend.graphics_created(), 2);
}

#[test]
fn used_entries_survive_eviction() {
    let start = Instant::now();
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();
    let desc = graphics_desc("A", "B");

    for period in 1..=4u64 {
        cache
            .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
            .unwrap();
        let flush = cache.flush_resources_at(start + Duration::from_secs(61 * period));
        assert!(flush.evicted);
        assert_eq!(flush.graphics_discarded, 0);
    }
    assert_eq!(backend.graphics_created(), 1);
}

#[test]
fn eviction_interval_zero_never_discards() {
    let start = Instant::now();
    let settings = sync_settings()
        .with_eviction_interval_secs(0)
        .with_evict_each_frame(true);
    let (_, cache) = new_cache(CountingBackend::new(), settings);
    let mut cmd = CommandList::new();
    let desc = graphics_desc("A", "B");

    cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
        .unwrap();

    for hour in 1..=10u64 {
        let flush = cache.flush_resources_at(start + Duration::from_secs(3600 * hour));
        assert!(!flush.evicted);
    }
    assert_eq!(cache.graphics_cache().current_len(), 1);
    assert_eq!(cache.frame(), 10);
}

#[test]
fn evict_each_frame_runs_every_flush() {
    let settings = sync_settings().with_evict_each_frame(true);
    let (_, cache) = new_cache(CountingBackend::new(), settings);
    let mut cmd = CommandList::new();

    cache
        .get_or_create_graphics_pipeline_state(
            &mut cmd,
            &graphics_desc("A", "B"),
            NONE,
            RequestOrigin::Runtime,
        )
        .unwrap();

    assert!(cache.flush_resources().evicted);
    let flush = cache.flush_resources();
    assert!(flush.evicted);
    assert_eq!(flush.graphics_discarded, 1);
}

#[test]
fn flush_before_interval_does_not_evict() {
    let start = Instant::now();
    let (_, cache) = new_cache(CountingBackend::new(), sync_settings());

    let flush = cache.flush_resources_at(start + Duration::from_secs(10));
    assert!(!flush.evicted);
    assert_eq!(flush.frame, 0);
    assert_eq!(cache.frame(), 1);
}

#[test]
#[should_panic(expected = "still in use")]
fn evicting_a_bound_state_panics() {
    let settings = sync_settings().with_evict_each_frame(true);
    let (_, cache) = new_cache(CountingBackend::new(), settings);
    let mut cmd = CommandList::new();

    cache
        .set_graphics_pipeline_state(&mut cmd, &graphics_desc("A", "B"), NONE)
        .unwrap();

    // current -> backfill, then discarded while the bind is still recorded.
    cache.flush_resources();
    cache.flush_resources();
}

// ============================================================================
// Compile Failures
// ============================================================================

#[test]
fn sync_runtime_failure_is_an_error() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();
    let desc = graphics_desc("VS", "BrokenPS");

    let err = cache
        .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
        .unwrap_err();
    assert!(err.is_compile_failure());

    let PsoError::GraphicsCompileFailed(report) = err else {
        panic!("expected a graphics compile failure");
    };
    assert!(report.stages.contains(&("Pixel", "BrokenPS".to_owned())));
    assert!(report.to_string().contains("Render Targets"));

    // The failed state stays cached and keeps failing without recompiling.
    assert!(
        cache
            .get_or_create_graphics_pipeline_state(&mut cmd, &desc, NONE, RequestOrigin::Runtime)
            .is_err()
    );
    assert_eq!(backend.failed(), 1);
}

#[test]
fn async_runtime_failure_surfaces_at_submit() {
    let (_, cache) = new_cache(CountingBackend::new(), async_settings());
    let mut cmd = CommandList::new();

    let state = cache
        .set_graphics_pipeline_state(&mut cmd, &graphics_desc("VS", "BrokenPS"), NONE)
        .unwrap();
    let err = cache.submit(&mut cmd).unwrap_err();

    assert!(matches!(err, PsoError::GraphicsCompileFailed(_)));
    assert_eq!(state.status(), CompileStatus::Failed);
    assert_eq!(state.in_use_count(), 0);
}

#[test]
fn compute_failure_is_an_error() {
    let (_, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();

    let err = cache
        .get_or_create_compute_pipeline_state(&mut cmd, &shader("BrokenCS", ShaderStage::Compute))
        .unwrap_err();
    assert!(matches!(err, PsoError::ComputeCompileFailed { ref shader } if shader == "BrokenCS"));
}

#[test]
fn preload_failure_is_not_ready_instead_of_fatal() {
    let (backend, cache) = new_cache(CountingBackend::new(), async_settings());
    let broken = graphics_desc("VS", "BrokenPS");

    let preload = cache.precompile_graphics([graphics_desc("VS", "PS"), broken.clone()]);
    assert_eq!(preload.requested, 2);
    assert_eq!(preload.ready, 1);
    assert_eq!(preload.failed, 1);

    // Binding the preloaded state later reports "not ready", not an error.
    let mut cmd = CommandList::new();
    let state = cache.set_graphics_pipeline_state(&mut cmd, &broken, NONE).unwrap();
    assert_eq!(state.origin(), RequestOrigin::FileCachePreload);
    assert!(cache.submit(&mut cmd).unwrap().is_empty());
    assert_eq!(backend.failed(), 1);
}

#[test]
fn sync_preload_failure_is_not_ready_instead_of_fatal() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());
    let broken = graphics_desc("VS", "BrokenPS");

    let preload = cache.precompile_graphics([broken.clone()]);
    assert_eq!(preload.failed, 1);

    // A runtime hit on the failed preload state is not an error either.
    let mut cmd = CommandList::new();
    let state = cache.set_graphics_pipeline_state(&mut cmd, &broken, NONE).unwrap();
    assert_eq!(state.origin(), RequestOrigin::FileCachePreload);
    assert_eq!(state.status(), CompileStatus::Failed);
    assert!(cache.submit(&mut cmd).unwrap().is_empty());
    assert_eq!(backend.failed(), 1);
}

#[test]
fn sync_preload_failure_returns_failed_state() {
    let (_, cache) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();

    let state = cache
        .get_or_create_graphics_pipeline_state(
            &mut cmd,
            &graphics_desc("VS", "BrokenPS"),
            NONE,
            RequestOrigin::FileCachePreload,
        )
        .unwrap();
    assert_eq!(state.status(), CompileStatus::Failed);
    assert!(state.compiled().is_none());
}

// ============================================================================
// Ray Tracing
// ============================================================================

fn rt_desc(ray_gen: &str) -> RayTracingPipelineDesc {
    RayTracingPipelineDesc::new(shader(ray_gen, ShaderStage::RayGen), shader("Miss", ShaderStage::Miss))
}

#[test]
fn ray_tracing_is_compiled_once_and_cached() {
    let (backend, cache) = new_cache(CountingBackend::new(), async_settings());

    let first = cache.get_or_create_ray_tracing_pipeline_state(&rt_desc("RG")).unwrap();
    let second = cache.get_or_create_ray_tracing_pipeline_state(&rt_desc("RG")).unwrap();

    assert_eq!(first.label(), second.label());
    assert_eq!(backend.ray_tracing_created(), 1);
    assert_eq!(cache.ray_tracing_cache().len(), 1);
}

#[test]
fn ray_tracing_failure_is_not_cached() {
    let (backend, cache) = new_cache(CountingBackend::new(), sync_settings());

    for _ in 0..2 {
        let err = cache
            .get_or_create_ray_tracing_pipeline_state(&rt_desc("BrokenRG"))
            .unwrap_err();
        assert!(matches!(err, PsoError::RayTracingCompileFailed { .. }));
    }
    assert_eq!(backend.failed(), 2);
    assert!(cache.ray_tracing_cache().is_empty());
}

#[test]
fn ray_tracing_entries_are_never_evicted() {
    let settings = sync_settings().with_evict_each_frame(true);
    let (_, cache) = new_cache(CountingBackend::new(), settings);

    cache.get_or_create_ray_tracing_pipeline_state(&rt_desc("RG")).unwrap();
    for _ in 0..4 {
        cache.flush_resources();
    }
    assert_eq!(cache.ray_tracing_cache().len(), 1);
}

// ============================================================================
// Usage Manifest & Preload
// ============================================================================

#[test]
fn manifest_round_trip_drives_preload() {
    let (_, recording) = new_cache(CountingBackend::new(), sync_settings());
    let mut cmd = CommandList::new();
    let used = [graphics_desc("A", "B"), graphics_desc("C", "D")];
    for desc in &used {
        recording.set_graphics_pipeline_state(&mut cmd, desc, NONE).unwrap();
    }
    recording.submit(&mut cmd).unwrap();

    let path = std::env::temp_dir().join(format!("myth_pso_manifest_{}.json", std::process::id()));
    recording.file_cache().manifest().save(&path).unwrap();
    let manifest = PipelineUsageManifest::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(manifest.graphics.len(), 2);
    assert!(manifest.graphics.iter().all(|r| r.bind_count == 1));

    let (backend, warm) = new_cache(CountingBackend::new(), async_settings());
    let candidates = [graphics_desc("A", "B"), graphics_desc("C", "D"), graphics_desc("E", "F")];
    let preload = warm.precompile_graphics_from_manifest(&manifest, candidates);

    assert_eq!(preload.requested, 2);
    assert_eq!(preload.ready, 2);
    assert_eq!(backend.graphics_created(), 2);
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn shutdown_releases_every_cache() {
    let (_, cache) = new_cache(CountingBackend::new(), async_settings());
    let mut cmd = CommandList::new();

    cache.set_graphics_pipeline_state(&mut cmd, &graphics_desc("A", "B"), NONE).unwrap();
    cache.set_graphics_pipeline_state(&mut cmd, &graphics_desc("C", "D"), NONE).unwrap();
    cache
        .set_compute_pipeline_state(&mut cmd, &shader("CS", ShaderStage::Compute))
        .unwrap();
    cache.submit(&mut cmd).unwrap();
    cache.flush_resources();

    // One graphics entry still thread-local at shutdown.
    cache
        .get_or_create_graphics_pipeline_state(
            &mut cmd,
            &graphics_desc("E", "F"),
            NONE,
            RequestOrigin::Runtime,
        )
        .unwrap();
    cache.get_or_create_ray_tracing_pipeline_state(&rt_desc("RG")).unwrap();

    let released = cache.shutdown();
    assert_eq!(released.graphics, 3);
    assert_eq!(released.compute, 1);
    assert_eq!(released.ray_tracing, 1);

    assert_eq!(cache.graphics_cache().current_len(), 0);
    assert_eq!(cache.graphics_cache().backfill_len(), 0);
    assert_eq!(cache.graphics_cache().local_len(), 0);
    assert!(cache.compute_cache().is_empty());
    assert!(cache.ray_tracing_cache().is_empty());
    assert_eq!(cache.file_cache().recorded_count(PsoKind::Graphics), 0);
    assert!(cache.scheduler_stats().is_none());
}

#[test]
fn cache_compiles_inline_after_shutdown() {
    let (_, cache) = new_cache(CountingBackend::new(), async_settings());
    cache.shutdown();

    let mut cmd = CommandList::new();
    let state = cache
        .get_or_create_graphics_pipeline_state(
            &mut cmd,
            &graphics_desc("A", "B"),
            NONE,
            RequestOrigin::Runtime,
        )
        .unwrap();
    assert!(state.is_ready());
    assert_eq!(cmd.pending_compile_count(), 0);
}
