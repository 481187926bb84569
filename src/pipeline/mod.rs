//! Pipeline Module
//!
//! Everything that describes, owns and compiles a single pipeline:
//! - [`desc`]: descriptor value types (the cache keys)
//! - [`state`]: pipeline state objects and their handles
//! - [`completion`]: completion signals for in-flight compiles
//! - [`task`] / [`scheduler`]: background compilation
//! - [`file_cache`]: usage recording for preloading

pub mod completion;
pub mod desc;
pub mod file_cache;
pub mod scheduler;
pub mod state;
pub mod task;

pub use completion::CompletionEvent;
pub use desc::{
    BoundShaderState, ComputePipelineDesc, GraphicsPipelineDesc, HitGroup, PipelineDesc,
    RayTracingPipelineDesc,
};
pub use file_cache::{PipelineFileCache, PipelineStateStats, PipelineUsageManifest, PsoKind};
pub use scheduler::{CompileScheduler, SchedulerStats};
pub use state::{
    CompileStatus, ComputePipelineHandle, ComputePipelineState, GraphicsPipelineHandle,
    GraphicsPipelineState, PipelineState, RayTracingPipelineHandle, RayTracingPipelineState,
    RequestOrigin,
};
pub use task::{CompileTarget, CompileTask};
