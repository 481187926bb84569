//! Compile Tasks
//!
//! A [`CompileTask`] is one unit of background work: call the backend's
//! pipeline creation for a single pipeline state, store the result in the
//! state and fire the completion event. Tasks always run to completion; there
//! is no cancellation.
//!
//! The task holds an `Arc` to the state, and the state owns its descriptor
//! with `Arc`-shared shader and fixed-function objects. Everything the backend
//! reads therefore stays alive for the task's lifetime, whatever the caller
//! does with its own descriptor in the meantime.

use crate::errors::{PipelineFailureReport, PsoError};
use crate::pipeline::completion::CompletionEvent;
use crate::pipeline::desc::{GraphicsPipelineDesc, PipelineDesc};
use crate::pipeline::state::{ComputePipelineHandle, GraphicsPipelineHandle, RequestOrigin};
use crate::rhi::backend::RhiBackend;

/// The pipeline state a task compiles.
#[derive(Debug, Clone)]
pub enum CompileTarget {
    Graphics(GraphicsPipelineHandle),
    Compute(ComputePipelineHandle),
}

impl CompileTarget {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Graphics(state) => state.label(),
            Self::Compute(state) => state.label(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> RequestOrigin {
        match self {
            Self::Graphics(state) => state.origin(),
            Self::Compute(state) => state.origin(),
        }
    }
}

/// One background compilation.
#[derive(Debug)]
pub struct CompileTask {
    target: CompileTarget,
    completion: CompletionEvent,
}

impl CompileTask {
    /// Creates a task and attaches its completion event to the state.
    #[must_use]
    pub fn new(target: CompileTarget) -> Self {
        let completion = CompletionEvent::new();
        match &target {
            CompileTarget::Graphics(state) => state.set_completion_event(completion.clone()),
            CompileTarget::Compute(state) => state.set_completion_event(completion.clone()),
        }
        Self { target, completion }
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionEvent {
        &self.completion
    }

    #[must_use]
    pub fn target(&self) -> &CompileTarget {
        &self.target
    }

    /// Compiles the target, stores the result and signals completion.
    ///
    /// The completion event fires even on failure; the state is then marked
    /// failed and the error is returned for the caller to escalate or ignore.
    ///
    /// The task's reference to the state is released before the event fires.
    pub fn run(self, backend: &dyn RhiBackend) -> Result<(), PsoError> {
        let Self { target, completion } = self;
        let result = compile_target(&target, backend);
        drop(target);
        completion.complete();
        result
    }
}

/// Compiles `target` inline on the calling thread.
pub(crate) fn compile_target(target: &CompileTarget, backend: &dyn RhiBackend) -> Result<(), PsoError> {
    match target {
        CompileTarget::Graphics(state) => {
            let pipeline = backend.create_graphics_pipeline(state.desc());
            let failed = pipeline.is_none();
            state.set_compiled(pipeline);
            if failed {
                return Err(handle_graphics_failure(state.desc(), state.origin()));
            }
        }
        CompileTarget::Compute(state) => {
            let pipeline = backend.create_compute_pipeline(&state.desc().shader);
            let failed = pipeline.is_none();
            state.set_compiled(pipeline);
            if failed {
                log::error!("Failed to create ComputePipeline '{}'", state.label());
                return Err(PsoError::ComputeCompileFailed {
                    shader: state.desc().shader.name().to_owned(),
                });
            }
        }
    }
    Ok(())
}

/// Logs the failed descriptor and builds the error.
///
/// Preload requests only warn; callers must not escalate them.
pub(crate) fn handle_graphics_failure(desc: &GraphicsPipelineDesc, origin: RequestOrigin) -> PsoError {
    let report = PipelineFailureReport::from_desc(desc);
    if origin.is_preload() {
        log::warn!(
            "Failed to create GraphicsPipeline '{}' from the pipeline file cache; leaving it uncompiled",
            desc.label()
        );
    } else {
        log::error!("Failed to create GraphicsPipeline");
        report.log();
    }
    PsoError::GraphicsCompileFailed(Box::new(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::desc::ComputePipelineDesc;
    use crate::pipeline::state::{CompileStatus, PipelineState};
    use crate::rhi::backend::NullBackend;
    use crate::rhi::shader::{Shader, ShaderStage};
    use std::sync::Arc;

    #[test]
    fn test_run_compiles_and_signals() {
        let backend = NullBackend::new();
        let shader = Shader::shared("BlurCS", ShaderStage::Compute, vec![1u8; 4]);
        let state = Arc::new(PipelineState::new(
            ComputePipelineDesc::new(shader),
            RequestOrigin::Runtime,
            0,
            None,
        ));

        let task = CompileTask::new(CompileTarget::Compute(Arc::clone(&state)));
        let event = task.completion().clone();
        assert!(!state.is_compile_complete());

        task.run(&backend).unwrap();

        assert!(event.is_complete());
        assert!(state.is_compile_complete());
        assert_eq!(state.status(), CompileStatus::Ready);
        assert_eq!(backend.compute_created(), 1);
    }
}
