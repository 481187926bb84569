//! Utility Module
//!
//! - [`hash`]: `FxHasher`-based key hashing
//! - [`time`]: interval timer for eviction and scope time guards

pub mod hash;
pub mod time;

pub use hash::fx_hash_key;
pub use time::{IntervalTimer, ScopeTimeGuard};
