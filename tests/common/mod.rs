//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use myth_pso::pipeline::desc::{GraphicsPipelineDesc, RayTracingPipelineDesc};
use myth_pso::rhi::backend::{NullBackend, RhiBackend, RhiPipelineRef};
use myth_pso::{
    CompletionEvent, PipelineCacheSettings, PipelineStateCache, Shader, ShaderRef, ShaderStage,
};

/// Shaders whose name starts with this fail to compile.
pub const BROKEN_PREFIX: &str = "Broken";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Backend that counts compiles, fails on "Broken*" shaders and can hold
/// every compile until a gate opens.
pub struct CountingBackend {
    inner: NullBackend,
    gate: CompletionEvent,
    failed: AtomicU64,
    async_supported: bool,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self {
            inner: NullBackend::new(),
            gate: CompletionEvent::completed(),
            failed: AtomicU64::new(0),
            async_supported: true,
        }
    }

    /// Compiles block until the returned event is completed.
    pub fn gated() -> (Self, CompletionEvent) {
        let gate = CompletionEvent::new();
        let backend = Self {
            gate: gate.clone(),
            ..Self::new()
        };
        (backend, gate)
    }

    pub fn inline_only() -> Self {
        Self {
            async_supported: false,
            ..Self::new()
        }
    }

    pub fn graphics_created(&self) -> u64 {
        self.inner.graphics_created()
    }

    pub fn compute_created(&self) -> u64 {
        self.inner.compute_created()
    }

    pub fn ray_tracing_created(&self) -> u64 {
        self.inner.ray_tracing_created()
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn fail(&self) -> Option<RhiPipelineRef> {
        self.failed.fetch_add(1, Ordering::Relaxed);
        None
    }
}

fn is_broken(shader: &ShaderRef) -> bool {
    shader.name().starts_with(BROKEN_PREFIX)
}

impl RhiBackend for CountingBackend {
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Option<RhiPipelineRef> {
        self.gate.wait();
        if desc.shaders.iter().any(is_broken) {
            return self.fail();
        }
        self.inner.create_graphics_pipeline(desc)
    }

    fn create_compute_pipeline(&self, shader: &ShaderRef) -> Option<RhiPipelineRef> {
        self.gate.wait();
        if is_broken(shader) {
            return self.fail();
        }
        self.inner.create_compute_pipeline(shader)
    }

    fn create_ray_tracing_pipeline(&self, desc: &RayTracingPipelineDesc) -> Option<RhiPipelineRef> {
        if is_broken(&desc.ray_gen) {
            return self.fail();
        }
        self.inner.create_ray_tracing_pipeline(desc)
    }

    fn supports_async_compile(&self) -> bool {
        self.async_supported
    }
}

pub fn sync_settings() -> PipelineCacheSettings {
    PipelineCacheSettings::default()
        .with_async_compile(false)
        .with_time_guard_ms(1000.0)
}

pub fn async_settings() -> PipelineCacheSettings {
    PipelineCacheSettings::default()
        .with_compile_threads(2)
        .with_time_guard_ms(1000.0)
}

pub fn new_cache(
    backend: CountingBackend,
    settings: PipelineCacheSettings,
) -> (Arc<CountingBackend>, PipelineStateCache) {
    init_logger();
    let backend = Arc::new(backend);
    let cache = PipelineStateCache::new(backend.clone(), settings).unwrap();
    (backend, cache)
}

pub fn shader(name: &str, stage: ShaderStage) -> ShaderRef {
    Shader::shared(name, stage, name.as_bytes().to_vec())
}

/// VS=`vs`, PS=`ps`, opaque blend.
pub fn graphics_desc(vs: &str, ps: &str) -> GraphicsPipelineDesc {
    GraphicsPipelineDesc::new(shader(vs, ShaderStage::Vertex))
        .with_pixel(shader(ps, ShaderStage::Pixel))
}
