//! Fixed-Function State
//!
//! Hashable value types for every piece of fixed-function state that affects a
//! compiled graphics pipeline. `wgpu`'s own descriptor structs do not implement
//! `Hash` / `Eq` (they carry floats), so these mirror the relevant fields and
//! store floats by bit pattern.

use smallvec::SmallVec;

/// Maximum number of simultaneously bound color render targets.
pub const MAX_RENDER_TARGETS: usize = 8;

// ─── Blend ────────────────────────────────────────────────────────────────────

/// Hashable mirror of `wgpu::BlendComponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponentKey {
    pub src_factor: wgpu::BlendFactor,
    pub dst_factor: wgpu::BlendFactor,
    pub operation: wgpu::BlendOperation,
}

impl BlendComponentKey {
    pub const REPLACE: Self = Self {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    };
}

impl From<wgpu::BlendComponent> for BlendComponentKey {
    fn from(b: wgpu::BlendComponent) -> Self {
        Self {
            src_factor: b.src_factor,
            dst_factor: b.dst_factor,
            operation: b.operation,
        }
    }
}

/// Blend configuration of a single render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlend {
    /// `None` disables blending for the target.
    pub blend: Option<(BlendComponentKey, BlendComponentKey)>,
    /// `wgpu::ColorWrites` bits.
    pub write_mask: u32,
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        Self {
            blend: None,
            write_mask: wgpu::ColorWrites::ALL.bits(),
        }
    }
}

/// Blend state for all render targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub targets: SmallVec<[RenderTargetBlend; 2]>,
    pub alpha_to_coverage: bool,
    /// When `false`, `targets[0]` applies to every render target.
    pub independent_blend: bool,
}

impl BlendState {
    /// No blending, all channels written.
    #[must_use]
    pub fn opaque() -> Self {
        Self {
            targets: smallvec::smallvec![RenderTargetBlend::default()],
            alpha_to_coverage: false,
            independent_blend: false,
        }
    }

    /// Standard premultiplied-free alpha blending on the first target.
    #[must_use]
    pub fn alpha_blend() -> Self {
        let color = BlendComponentKey::from(wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        });
        let alpha = BlendComponentKey::from(wgpu::BlendComponent::OVER);
        Self {
            targets: smallvec::smallvec![RenderTargetBlend {
                blend: Some((color, alpha)),
                write_mask: wgpu::ColorWrites::ALL.bits(),
            }],
            alpha_to_coverage: false,
            independent_blend: false,
        }
    }

    /// Additive blending on the first target.
    #[must_use]
    pub fn additive() -> Self {
        let add = BlendComponentKey {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        Self {
            targets: smallvec::smallvec![RenderTargetBlend {
                blend: Some((add, add)),
                write_mask: wgpu::ColorWrites::ALL.bits(),
            }],
            alpha_to_coverage: false,
            independent_blend: false,
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::opaque()
    }
}

// ─── Rasterizer ───────────────────────────────────────────────────────────────

/// Hashable rasterizer state. Depth bias floats are stored as raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub polygon_mode: wgpu::PolygonMode,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    pub depth_bias: i32,
    pub slope_scale_depth_bias_bits: u32,
    pub depth_clip: bool,
    pub conservative: bool,
}

impl RasterizerState {
    #[must_use]
    pub fn slope_scale_depth_bias(&self) -> f32 {
        f32::from_bits(self.slope_scale_depth_bias_bits)
    }

    #[must_use]
    pub fn with_depth_bias(mut self, constant: i32, slope_scale: f32) -> Self {
        self.depth_bias = constant;
        self.slope_scale_depth_bias_bits = slope_scale.to_bits();
        self
    }
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            polygon_mode: wgpu::PolygonMode::Fill,
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Ccw,
            depth_bias: 0,
            slope_scale_depth_bias_bits: 0.0f32.to_bits(),
            depth_clip: true,
            conservative: false,
        }
    }
}

// ─── Depth / Stencil ──────────────────────────────────────────────────────────

/// Hashable mirror of `wgpu::StencilFaceState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceKey {
    pub compare: wgpu::CompareFunction,
    pub fail_op: wgpu::StencilOperation,
    pub depth_fail_op: wgpu::StencilOperation,
    pub pass_op: wgpu::StencilOperation,
}

impl Default for StencilFaceKey {
    fn default() -> Self {
        wgpu::StencilFaceState::IGNORE.into()
    }
}

impl From<wgpu::StencilFaceState> for StencilFaceKey {
    fn from(s: wgpu::StencilFaceState) -> Self {
        Self {
            compare: s.compare,
            fail_op: s.fail_op,
            depth_fail_op: s.depth_fail_op,
            pass_op: s.pass_op,
        }
    }
}

/// Hashable depth-stencil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_write_enabled: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub stencil_enabled: bool,
    pub stencil_front: StencilFaceKey,
    pub stencil_back: StencilFaceKey,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
}

impl DepthStencilState {
    /// Depth test and write with `LessEqual`, stencil off.
    #[must_use]
    pub fn depth_write() -> Self {
        Self::default()
    }

    /// Depth test with `LessEqual` but no depth writes (translucency).
    #[must_use]
    pub fn depth_read_only() -> Self {
        Self {
            depth_write_enabled: false,
            ..Self::default()
        }
    }
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil_enabled: false,
            stencil_front: StencilFaceKey::default(),
            stencil_back: StencilFaceKey::default(),
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }
}

// ─── Render Targets ───────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Creation flags of a bound render target that influence pipeline compilation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderTargetFlags: u32 {
        const SRGB = 1 << 0;
        const MULTISAMPLED = 1 << 1;
        const MEMORYLESS = 1 << 2;
        const FAST_CLEAR = 1 << 3;
    }
}

/// Layout of the render targets a pipeline will draw into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetLayout {
    /// `None` marks an unbound slot below the highest enabled target.
    pub formats: SmallVec<[Option<wgpu::TextureFormat>; MAX_RENDER_TARGETS]>,
    pub flags: SmallVec<[RenderTargetFlags; MAX_RENDER_TARGETS]>,
    pub depth_stencil_format: Option<wgpu::TextureFormat>,
    pub depth_stencil_flags: RenderTargetFlags,
}

impl RenderTargetLayout {
    /// A single color target plus an optional depth target.
    #[must_use]
    pub fn single(color: wgpu::TextureFormat, depth: Option<wgpu::TextureFormat>) -> Self {
        Self {
            formats: smallvec::smallvec![Some(color)],
            flags: smallvec::smallvec![RenderTargetFlags::empty()],
            depth_stencil_format: depth,
            depth_stencil_flags: RenderTargetFlags::empty(),
        }
    }

    /// Number of enabled color targets.
    #[inline]
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.formats.len()
    }
}

// ─── Vertex Declaration ───────────────────────────────────────────────────────

/// One attribute in a vertex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub stream_index: u8,
    pub offset: u16,
    pub format: wgpu::VertexFormat,
    pub attribute_index: u8,
    pub stride: u16,
    pub per_instance: bool,
}

/// Complete vertex input layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexDeclaration {
    pub elements: SmallVec<[VertexElement; 8]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::fx_hash_key;

    #[test]
    fn test_blend_presets_are_distinct() {
        let opaque = BlendState::opaque();
        let alpha = BlendState::alpha_blend();
        let additive = BlendState::additive();

        assert_ne!(opaque, alpha);
        assert_ne!(alpha, additive);
        assert_ne!(fx_hash_key(&opaque), fx_hash_key(&alpha));
    }

    #[test]
    fn test_depth_bias_bits_round_trip() {
        let raster = RasterizerState::default().with_depth_bias(2, 1.5);
        assert_eq!(raster.depth_bias, 2);
        assert!((raster.slope_scale_depth_bias() - 1.5).abs() < f32::EPSILON);
        assert_ne!(raster, RasterizerState::default());
    }

    #[test]
    fn test_render_target_layout_single() {
        let layout = RenderTargetLayout::single(
            wgpu::TextureFormat::Rgba16Float,
            Some(wgpu::TextureFormat::Depth32Float),
        );
        assert_eq!(layout.enabled_count(), 1);
        assert_eq!(layout.depth_stencil_format, Some(wgpu::TextureFormat::Depth32Float));
    }
}
