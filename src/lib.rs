#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Multi-threaded pipeline state cache.
//!
//! Recording threads look pipelines up without contending with each other;
//! misses are compiled on a background worker pool; a once-per-frame flush
//! merges per-thread results, resolves duplicate compiles and ages out
//! pipelines that have not been used for a while.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use myth_pso::{
//!     ApplyRenderTargetOption, CommandList, GraphicsPipelineDesc, NullBackend,
//!     PipelineCacheSettings, PipelineStateCache,
//! };
//!
//! let cache = PipelineStateCache::new(Arc::new(NullBackend::new()), PipelineCacheSettings::default())?;
//!
//! let mut cmd = CommandList::new();
//! cache.set_graphics_pipeline_state(&mut cmd, &desc, ApplyRenderTargetOption::None)?;
//! let pipelines = cache.submit(&mut cmd)?;
//!
//! cache.flush_resources();
//! ```

pub mod cache;
pub mod errors;
pub mod pipeline;
pub mod pipeline_state_cache;
pub mod rhi;
pub mod settings;
pub mod utils;

pub use cache::{ConsolidateStats, DiscardableKeyValueCache, RayTracingPipelineCache, SharedPipelineStateCache};
pub use errors::{PipelineFailureReport, PsoError, Result};
pub use pipeline::{
    CompileStatus, CompletionEvent, ComputePipelineDesc, ComputePipelineHandle,
    GraphicsPipelineDesc, GraphicsPipelineHandle, HitGroup, PipelineDesc, PipelineFileCache,
    PipelineUsageManifest, PsoKind, RayTracingPipelineDesc, RequestOrigin,
};
pub use pipeline_state_cache::{
    ApplyRenderTargetOption, FlushStats, PipelineCacheStats, PipelineStateCache, PreloadStats,
    ShutdownStats,
};
pub use rhi::{CommandList, NullBackend, RhiBackend, RhiPipeline, RhiPipelineRef, Shader, ShaderRef, ShaderStage};
pub use settings::PipelineCacheSettings;
