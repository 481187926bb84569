//! Error Types
//!
//! This module defines the error types returned by the pipeline-state cache.
//!
//! # Overview
//!
//! The main error type [`PsoError`] covers the recoverable failure modes:
//! - Backend pipeline compilation failures (graphics, compute, ray tracing)
//! - Configuration and manifest I/O errors
//!
//! Broken cache invariants (double insertion into a thread-local map,
//! consolidation overlapping a lookup, releasing a pipeline that is still
//! bound) are programming errors and panic instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_pso::errors::{PsoError, Result};
//!
//! fn bind(cache: &PipelineStateCache, handle: &GraphicsPipelineHandle) -> Result<()> {
//!     let _pipeline = cache.execute_set_graphics_pipeline_state(handle)?;
//!     Ok(())
//! }
//! ```

use std::fmt;

use thiserror::Error;

use crate::pipeline::desc::GraphicsPipelineDesc;

/// The main error type for the pipeline-state cache.
#[derive(Error, Debug)]
pub enum PsoError {
    // ========================================================================
    // Compilation Errors
    // ========================================================================
    /// The backend returned no pipeline for a graphics descriptor.
    #[error("Failed to create graphics pipeline:\n{0}")]
    GraphicsCompileFailed(Box<PipelineFailureReport>),

    /// The backend returned no pipeline for a compute shader.
    #[error("Failed to create compute pipeline for shader '{shader}'")]
    ComputeCompileFailed {
        /// Name of the compute shader
        shader: String,
    },

    /// The backend returned no pipeline for a ray tracing descriptor.
    #[error("Failed to create ray tracing pipeline (ray gen: '{ray_gen}')")]
    RayTracingCompileFailed {
        /// Name of the ray generation shader
        ray_gen: String,
    },

    /// A pipeline was bound before its compilation produced a backend object.
    #[error("Pipeline '{label}' is not ready")]
    PipelineNotReady {
        /// Label of the pipeline state
        label: String,
    },

    // ========================================================================
    // Configuration & I/O Errors
    // ========================================================================
    /// Settings failed validation.
    #[error("Invalid pipeline cache settings: {0}")]
    InvalidSettings(String),

    /// JSON parsing error (settings or usage manifest).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PsoError {
    /// Returns `true` for backend compilation failures of any pipeline kind.
    #[must_use]
    pub fn is_compile_failure(&self) -> bool {
        matches!(
            self,
            Self::GraphicsCompileFailed(_)
                | Self::ComputeCompileFailed { .. }
                | Self::RayTracingCompileFailed { .. }
        )
    }
}

/// Alias for `Result<T, PsoError>`.
pub type Result<T> = std::result::Result<T, PsoError>;

// ============================================================================
// Failure Report
// ============================================================================

/// Diagnostic dump of a graphics descriptor that failed to compile.
///
/// Lists every bound shader stage by name and the render target layout so the
/// offending combination can be reproduced from a bug report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailureReport {
    /// `(stage, shader name)` for each stage present in the descriptor.
    pub stages: Vec<(&'static str, String)>,
    pub render_target_formats: Vec<Option<wgpu::TextureFormat>>,
    pub depth_stencil_format: Option<wgpu::TextureFormat>,
}

impl PipelineFailureReport {
    #[must_use]
    pub fn from_desc(desc: &GraphicsPipelineDesc) -> Self {
        let shaders = &desc.shaders;
        let stages = [
            ("Vertex", Some(&shaders.vertex)),
            ("Hull", shaders.hull.as_ref()),
            ("Domain", shaders.domain.as_ref()),
            ("Geometry", shaders.geometry.as_ref()),
            ("Pixel", shaders.pixel.as_ref()),
        ]
        .into_iter()
        .filter_map(|(stage, shader)| shader.map(|s| (stage, s.name().to_owned())))
        .collect();

        Self {
            stages,
            render_target_formats: desc.render_targets.formats.to_vec(),
            depth_stencil_format: desc.render_targets.depth_stencil_format,
        }
    }

    /// Writes the report to the error log, one line per entry.
    pub fn log(&self) {
        for line in self.to_string().lines() {
            log::error!("{line}");
        }
    }
}

impl fmt::Display for PipelineFailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (stage, name) in &self.stages {
            writeln!(f, "{stage}: {name}")?;
        }
        writeln!(f, "Render Targets: ({})", self.render_target_formats.len())?;
        for format in &self.render_target_formats {
            match format {
                Some(format) => writeln!(f, "{format:?}")?,
                None => writeln!(f, "<unbound>")?,
            }
        }
        writeln!(f, "Depth Stencil Format:")?;
        match self.depth_stencil_format {
            Some(format) => write!(f, "{format:?}"),
            None => write!(f, "<none>"),
        }
    }
}
