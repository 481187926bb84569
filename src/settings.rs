//! Pipeline Cache Settings
//!
//! Runtime configuration for [`PipelineStateCache`](crate::PipelineStateCache).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_pso::PipelineCacheSettings;
//!
//! // Defaults: async compilation, 60 s eviction interval
//! let settings = PipelineCacheSettings::default();
//!
//! // Inline compilation, never evict
//! let settings = PipelineCacheSettings::default()
//!     .with_async_compile(false)
//!     .with_eviction_interval_secs(0);
//!
//! // From a JSON file shipped with the application
//! let settings = PipelineCacheSettings::from_json_file("pso_cache.json")?;
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PsoError, Result};

// ---------------------------------------------------------------------------
// PipelineCacheSettings
// ---------------------------------------------------------------------------

/// Configuration of the pipeline state cache.
///
/// # Fields
///
/// | Field                    | Description                                  | Default |
/// |--------------------------|----------------------------------------------|---------|
/// | `async_compile`          | Compile on background workers                | `true`  |
/// | `eviction_interval_secs` | Seconds between aging passes (`0` = never)   | `60`    |
/// | `compile_threads`        | Worker count (`0` = cores minus two)         | `0`     |
/// | `time_guard_ms`          | Warn when a flush step takes longer than this| `0.1`   |
/// | `evict_each_frame`       | Run the aging pass on every flush            | `false` |
///
/// Missing JSON fields take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineCacheSettings {
    /// Compile pipelines on the background scheduler.
    ///
    /// When `false`, every `get_or_create_*` call compiles inline and returns
    /// a ready handle.
    pub async_compile: bool,

    /// Interval of the discard-and-swap aging pass, in seconds.
    ///
    /// A pipeline not requested for one to two intervals is released. `0`
    /// disables eviction entirely.
    pub eviction_interval_secs: u32,

    /// Number of background compile workers. `0` picks a default from the
    /// available parallelism.
    pub compile_threads: usize,

    /// Budget for consolidation and eviction, in milliseconds.
    pub time_guard_ms: f64,

    /// Stress mode: age the caches on every flush regardless of the interval.
    pub evict_each_frame: bool,
}

impl Default for PipelineCacheSettings {
    fn default() -> Self {
        Self {
            async_compile: true,
            eviction_interval_secs: 60,
            compile_threads: 0,
            time_guard_ms: 0.1,
            evict_each_frame: false,
        }
    }
}

impl PipelineCacheSettings {
    #[must_use]
    pub fn with_async_compile(mut self, enabled: bool) -> Self {
        self.async_compile = enabled;
        self
    }

    #[must_use]
    pub fn with_eviction_interval_secs(mut self, secs: u32) -> Self {
        self.eviction_interval_secs = secs;
        self
    }

    #[must_use]
    pub fn with_compile_threads(mut self, threads: usize) -> Self {
        self.compile_threads = threads;
        self
    }

    #[must_use]
    pub fn with_time_guard_ms(mut self, ms: f64) -> Self {
        self.time_guard_ms = ms;
        self
    }

    #[must_use]
    pub fn with_evict_each_frame(mut self, enabled: bool) -> Self {
        self.evict_each_frame = enabled;
        self
    }

    /// Parses and validates settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.time_guard_ms.is_finite() || self.time_guard_ms < 0.0 {
            return Err(PsoError::InvalidSettings(format!(
                "time_guard_ms must be a non-negative number, got {}",
                self.time_guard_ms
            )));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.eviction_interval_secs))
    }

    #[inline]
    #[must_use]
    pub fn time_guard(&self) -> Duration {
        Duration::from_secs_f64(self.time_guard_ms.max(0.0) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PipelineCacheSettings::default();
        assert!(settings.async_compile);
        assert_eq!(settings.eviction_interval(), Duration::from_secs(60));
        assert_eq!(settings.time_guard(), Duration::from_micros(100));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            PipelineCacheSettings::from_json_str(r#"{ "async_compile": false }"#).unwrap();
        assert!(!settings.async_compile);
        assert_eq!(settings.eviction_interval_secs, 60);
    }

    #[test]
    fn test_negative_time_guard_is_rejected() {
        let err = PipelineCacheSettings::from_json_str(r#"{ "time_guard_ms": -1.0 }"#).unwrap_err();
        assert!(matches!(err, PsoError::InvalidSettings(_)));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = PipelineCacheSettings::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, PsoError::Json(_)));
    }
}
