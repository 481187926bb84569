//! Backend Boundary
//!
//! The cache never talks to a graphics API directly. Pipeline creation goes
//! through [`RhiBackend`], whose `create_*` methods are the expensive, opaque
//! "compile pipeline" operation. They may be called from any compile worker
//! thread and must be thread-safe.
//!
//! A backend signals failure by returning `None` (an invalid handle); the cache
//! turns that into a typed [`PsoError`](crate::errors::PsoError) and lets the
//! caller decide whether the failure is fatal.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::pipeline::desc::{GraphicsPipelineDesc, PipelineDesc, RayTracingPipelineDesc};
use crate::rhi::shader::ShaderRef;

/// A compiled backend pipeline object.
pub trait RhiPipeline: Send + Sync + fmt::Debug {
    /// Debug label, used in logs and error messages.
    fn label(&self) -> &str;
}

/// Shared handle to a compiled backend pipeline.
pub type RhiPipelineRef = Arc<dyn RhiPipeline>;

/// The opaque pipeline compiler.
pub trait RhiBackend: Send + Sync {
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Option<RhiPipelineRef>;

    fn create_compute_pipeline(&self, shader: &ShaderRef) -> Option<RhiPipelineRef>;

    fn create_ray_tracing_pipeline(&self, desc: &RayTracingPipelineDesc) -> Option<RhiPipelineRef>;

    /// Backends where off-thread pipeline creation is pointless (or unsafe)
    /// return `false`; the cache then compiles inline.
    fn supports_async_compile(&self) -> bool {
        true
    }
}

// ─── Null Backend ─────────────────────────────────────────────────────────────

/// Pipeline object produced by [`NullBackend`].
#[derive(Debug)]
pub struct NullPipeline {
    pub id: u64,
    pub label: String,
}

impl RhiPipeline for NullPipeline {
    fn label(&self) -> &str {
        &self.label
    }
}

/// Headless backend that "compiles" instantly and counts creations.
///
/// Useful for tools that only need cache bookkeeping, and for tests.
#[derive(Debug, Default)]
pub struct NullBackend {
    next_id: AtomicU64,
    graphics_created: AtomicU64,
    compute_created: AtomicU64,
    ray_tracing_created: AtomicU64,
}

impl NullBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn graphics_created(&self) -> u64 {
        self.graphics_created.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn compute_created(&self) -> u64 {
        self.compute_created.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn ray_tracing_created(&self) -> u64 {
        self.ray_tracing_created.load(Ordering::Relaxed)
    }

    fn make(&self, label: String) -> RhiPipelineRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(NullPipeline { id, label })
    }
}

impl RhiBackend for NullBackend {
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Option<RhiPipelineRef> {
        self.graphics_created.fetch_add(1, Ordering::Relaxed);
        Some(self.make(desc.label()))
    }

    fn create_compute_pipeline(&self, shader: &ShaderRef) -> Option<RhiPipelineRef> {
        self.compute_created.fetch_add(1, Ordering::Relaxed);
        Some(self.make(shader.name().to_owned()))
    }

    fn create_ray_tracing_pipeline(&self, desc: &RayTracingPipelineDesc) -> Option<RhiPipelineRef> {
        self.ray_tracing_created.fetch_add(1, Ordering::Relaxed);
        Some(self.make(desc.ray_gen.name().to_owned()))
    }
}
