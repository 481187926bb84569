//! Pipeline caches
//!
//! - [`shared`]: thread-local maps plus current/backfill generations (graphics)
//! - [`discardable`]: two-generation map behind one lock (compute)
//! - [`ray_tracing`]: mutex-guarded map without eviction

mod generations;

pub mod discardable;
pub mod ray_tracing;
pub mod shared;

pub use discardable::DiscardableKeyValueCache;
pub use ray_tracing::RayTracingPipelineCache;
pub use shared::{CacheEntry, ConsolidateStats, SharedPipelineStateCache};
