//! Render Hardware Interface boundary
//!
//! The types the cache exchanges with the graphics backend and the rendering
//! front end: shaders, fixed-function state, the opaque pipeline compiler and
//! the command list that records binds and compile waits.

pub mod backend;
pub mod command;
pub mod shader;
pub mod state;

pub use backend::{NullBackend, NullPipeline, RhiBackend, RhiPipeline, RhiPipelineRef};
pub use command::{CommandList, RecordedCommand};
pub use shader::{Shader, ShaderRef, ShaderStage};
pub use state::{
    BlendComponentKey, BlendState, DepthStencilState, RasterizerState, RenderTargetBlend,
    RenderTargetFlags, RenderTargetLayout, StencilFaceKey, VertexDeclaration, VertexElement,
};
