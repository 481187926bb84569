//! Command Lists
//!
//! A [`CommandList`] is owned by one recording thread. It collects pipeline
//! binds and the completion events of compiles those binds depend on. Nothing
//! blocks while recording; [`CommandList::wait_for_pending_compiles`] is the
//! single wait point, performed when the list is submitted.

use crate::pipeline::completion::CompletionEvent;
use crate::pipeline::state::{ComputePipelineHandle, GraphicsPipelineHandle};
use crate::rhi::state::RenderTargetLayout;

/// A bind recorded into a command list.
#[derive(Debug, Clone)]
pub enum RecordedCommand {
    SetGraphicsPipeline(GraphicsPipelineHandle),
    SetComputePipeline(ComputePipelineHandle),
}

#[derive(Debug, Default)]
pub struct CommandList {
    bypass: bool,
    pending_compiles: Vec<CompletionEvent>,
    cached_render_targets: Option<RenderTargetLayout>,
    commands: Vec<RecordedCommand>,
}

impl CommandList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A list that executes immediately. Pipelines requested through it are
    /// always compiled inline.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            bypass: true,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    // ── Compile dependencies ─────────────────────────────────────────────────

    /// Makes the list's execution depend on `event`.
    pub fn queue_async_pipeline_state_compile(&mut self, event: CompletionEvent) {
        if self.pending_compiles.iter().any(|e| e.ptr_eq(&event)) {
            return;
        }
        self.pending_compiles.push(event);
    }

    #[must_use]
    pub fn pending_compile_count(&self) -> usize {
        self.pending_compiles.len()
    }

    /// Blocks until every queued compile has finished. Returns how many
    /// events were waited on.
    pub fn wait_for_pending_compiles(&mut self) -> usize {
        let count = self.pending_compiles.len();
        for event in self.pending_compiles.drain(..) {
            event.wait();
        }
        count
    }

    // ── Render targets ───────────────────────────────────────────────────────

    /// Remembers the currently bound render targets.
    pub fn set_render_targets(&mut self, layout: RenderTargetLayout) {
        self.cached_render_targets = Some(layout);
    }

    #[must_use]
    pub fn cached_render_targets(&self) -> Option<&RenderTargetLayout> {
        self.cached_render_targets.as_ref()
    }

    // ── Recorded commands ────────────────────────────────────────────────────

    pub(crate) fn record(&mut self, command: RecordedCommand) {
        self.commands.push(command);
    }

    #[must_use]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub(crate) fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.pending_compiles.is_empty()
    }
}
