//! Completion Signals
//!
//! A [`CompletionEvent`] is raised exactly once by a compile task when it has
//! stored its result into the pipeline state. Recording threads never block on
//! it while recording; they queue it on their command list and the wait happens
//! when the list is submitted.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct EventInner {
    complete: Mutex<bool>,
    signal: Condvar,
}

/// Cloneable, one-shot completion signal.
#[derive(Clone, Default)]
pub struct CompletionEvent {
    inner: Arc<EventInner>,
}

impl CompletionEvent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An event that is already complete.
    #[must_use]
    pub fn completed() -> Self {
        let event = Self::new();
        event.complete();
        event
    }

    /// Marks the event complete and wakes every waiter.
    pub fn complete(&self) {
        let mut complete = self.inner.complete.lock();
        *complete = true;
        self.inner.signal.notify_all();
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self.inner.complete.lock()
    }

    /// Blocks until the event is complete.
    pub fn wait(&self) {
        let mut complete = self.inner.complete.lock();
        while !*complete {
            self.inner.signal.wait(&mut complete);
        }
    }

    /// Blocks for at most `timeout`. Returns whether the event completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut complete = self.inner.complete.lock();
        if !*complete {
            let _ = self.inner.signal.wait_while_for(&mut complete, |c| !*c, timeout);
        }
        *complete
    }

    /// Whether two handles refer to the same event.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for CompletionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionEvent")
            .field("complete", &self.is_complete())
            .finish()
    }
}
