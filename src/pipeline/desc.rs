//! Pipeline Descriptors
//!
//! Immutable value types that fully describe one pipeline configuration. They
//! are the cache keys: equality and hashing are structural over every field
//! that affects the compiled binary, and shaders participate through their
//! content hash (see [`Shader`](crate::rhi::shader::Shader)).
//!
//! Three descriptor families are provided:
//!
//! - [`GraphicsPipelineDesc`] - bound shader stages plus fixed-function state.
//! - [`ComputePipelineDesc`] - a single compute shader.
//! - [`RayTracingPipelineDesc`] - ray generation, miss and hit-group shaders.
//!
//! Shader and state sub-objects are held by `Arc`, so cloning a descriptor
//! (e.g. into a compile task) keeps them alive for as long as the clone lives.

use std::hash::Hash;
use std::sync::Arc;

use crate::rhi::shader::ShaderRef;
use crate::rhi::state::{
    BlendState, DepthStencilState, RasterizerState, RenderTargetLayout, VertexDeclaration,
};
use crate::utils::hash::fx_hash_key;

/// Common behaviour of every descriptor family.
pub trait PipelineDesc: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static {
    /// Human-readable label for logs.
    fn label(&self) -> String;

    /// Stable 64-bit hash, used by the file cache and statistics.
    fn hash64(&self) -> u64 {
        fx_hash_key(self)
    }
}

// ─── Graphics ─────────────────────────────────────────────────────────────────

/// The shader stages bound to a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundShaderState {
    pub vertex_declaration: Option<Arc<VertexDeclaration>>,
    pub vertex: ShaderRef,
    pub pixel: Option<ShaderRef>,
    pub hull: Option<ShaderRef>,
    pub domain: Option<ShaderRef>,
    pub geometry: Option<ShaderRef>,
}

impl BoundShaderState {
    #[must_use]
    pub fn new(vertex: ShaderRef) -> Self {
        Self {
            vertex_declaration: None,
            vertex,
            pixel: None,
            hull: None,
            domain: None,
            geometry: None,
        }
    }

    /// Iterates over the present shader stages in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = &ShaderRef> {
        std::iter::once(&self.vertex)
            .chain(self.hull.as_ref())
            .chain(self.domain.as_ref())
            .chain(self.geometry.as_ref())
            .chain(self.pixel.as_ref())
    }
}

/// Full description of a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineDesc {
    pub shaders: BoundShaderState,
    pub blend: Arc<BlendState>,
    pub rasterizer: Arc<RasterizerState>,
    pub depth_stencil: Arc<DepthStencilState>,
    pub render_targets: RenderTargetLayout,
    pub topology: wgpu::PrimitiveTopology,
    pub sample_count: u32,
}

impl GraphicsPipelineDesc {
    /// Vertex-only descriptor with default state, no render targets and
    /// triangle-list topology.
    #[must_use]
    pub fn new(vertex: ShaderRef) -> Self {
        Self {
            shaders: BoundShaderState::new(vertex),
            blend: Arc::new(BlendState::opaque()),
            rasterizer: Arc::new(RasterizerState::default()),
            depth_stencil: Arc::new(DepthStencilState::default()),
            render_targets: RenderTargetLayout::default(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            sample_count: 1,
        }
    }

    #[must_use]
    pub fn with_pixel(mut self, pixel: ShaderRef) -> Self {
        self.shaders.pixel = Some(pixel);
        self
    }

    #[must_use]
    pub fn with_geometry(mut self, geometry: ShaderRef) -> Self {
        self.shaders.geometry = Some(geometry);
        self
    }

    #[must_use]
    pub fn with_tessellation(mut self, hull: ShaderRef, domain: ShaderRef) -> Self {
        self.shaders.hull = Some(hull);
        self.shaders.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_vertex_declaration(mut self, declaration: Arc<VertexDeclaration>) -> Self {
        self.shaders.vertex_declaration = Some(declaration);
        self
    }

    #[must_use]
    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = Arc::new(blend);
        self
    }

    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: RasterizerState) -> Self {
        self.rasterizer = Arc::new(rasterizer);
        self
    }

    #[must_use]
    pub fn with_depth_stencil(mut self, depth_stencil: DepthStencilState) -> Self {
        self.depth_stencil = Arc::new(depth_stencil);
        self
    }

    #[must_use]
    pub fn with_render_targets(mut self, render_targets: RenderTargetLayout) -> Self {
        self.render_targets = render_targets;
        self
    }

    #[must_use]
    pub fn with_topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }
}

impl PipelineDesc for GraphicsPipelineDesc {
    fn label(&self) -> String {
        let names: Vec<&str> = self.shaders.iter().map(|s| s.name()).collect();
        names.join("+")
    }
}

// ─── Compute ──────────────────────────────────────────────────────────────────

/// A compute pipeline is identified by its shader alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineDesc {
    pub shader: ShaderRef,
}

impl ComputePipelineDesc {
    #[must_use]
    pub fn new(shader: ShaderRef) -> Self {
        Self { shader }
    }
}

impl PipelineDesc for ComputePipelineDesc {
    fn label(&self) -> String {
        self.shader.name().to_owned()
    }
}

// ─── Ray Tracing ──────────────────────────────────────────────────────────────

/// One entry of the hit-group table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HitGroup {
    pub closest_hit: ShaderRef,
    pub any_hit: Option<ShaderRef>,
    pub intersection: Option<ShaderRef>,
}

impl HitGroup {
    #[must_use]
    pub fn closest_hit(shader: ShaderRef) -> Self {
        Self {
            closest_hit: shader,
            any_hit: None,
            intersection: None,
        }
    }
}

/// Full description of a ray tracing pipeline.
///
/// Equality covers the whole hit-group table element by element, not just its
/// length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RayTracingPipelineDesc {
    pub ray_gen: ShaderRef,
    pub miss: ShaderRef,
    pub default_closest_hit: Option<ShaderRef>,
    pub hit_groups: Vec<HitGroup>,
    pub max_payload_size_in_bytes: u32,
}

impl RayTracingPipelineDesc {
    #[must_use]
    pub fn new(ray_gen: ShaderRef, miss: ShaderRef) -> Self {
        Self {
            ray_gen,
            miss,
            default_closest_hit: None,
            hit_groups: Vec::new(),
            max_payload_size_in_bytes: 32,
        }
    }

    #[must_use]
    pub fn with_default_closest_hit(mut self, shader: ShaderRef) -> Self {
        self.default_closest_hit = Some(shader);
        self
    }

    #[must_use]
    pub fn with_hit_group(mut self, group: HitGroup) -> Self {
        self.hit_groups.push(group);
        self
    }

    #[must_use]
    pub fn with_max_payload_size(mut self, bytes: u32) -> Self {
        self.max_payload_size_in_bytes = bytes;
        self
    }

    /// Hash of the hit-group table alone.
    #[must_use]
    pub fn hit_group_hash(&self) -> u64 {
        fx_hash_key(&self.hit_groups)
    }
}

impl PipelineDesc for RayTracingPipelineDesc {
    fn label(&self) -> String {
        format!("{}+{}", self.ray_gen.name(), self.miss.name())
    }
}
