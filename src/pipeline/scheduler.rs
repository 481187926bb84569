//! Background Compile Scheduler
//!
//! A fixed pool of named worker threads fed by a `flume` channel. Recording
//! threads dispatch [`CompileTask`]s and return immediately; workers call the
//! backend and signal each task's completion event.
//!
//! Dropping the scheduler closes the channel, lets the workers drain every
//! queued task and joins them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crate::errors::Result;
use crate::pipeline::task::CompileTask;
use crate::rhi::backend::RhiBackend;

/// Worker count used when the settings ask for the default (`0`).
///
/// Leaves two cores for the render and RHI threads.
#[must_use]
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().saturating_sub(2).max(1))
}

#[derive(Default)]
struct SchedulerCounters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
}

pub struct CompileScheduler {
    sender: Option<flume::Sender<CompileTask>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<SchedulerCounters>,
}

impl CompileScheduler {
    /// Spawns `worker_count` workers (`0` picks [`default_worker_count`]).
    pub fn new(backend: Arc<dyn RhiBackend>, worker_count: usize) -> Result<Self> {
        let worker_count = if worker_count == 0 {
            default_worker_count()
        } else {
            worker_count
        };

        let (sender, receiver) = flume::unbounded::<CompileTask>();
        let counters = Arc::new(SchedulerCounters::default());

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let backend = Arc::clone(&backend);
            let counters = Arc::clone(&counters);

            let handle = std::thread::Builder::new()
                .name(format!("pso-compile-{index}"))
                .spawn(move || {
                    // Ends once every sender is gone and the queue is drained.
                    for task in receiver.iter() {
                        match task.run(backend.as_ref()) {
                            Ok(()) => counters.completed.fetch_add(1, Ordering::Relaxed),
                            Err(_) => counters.failed.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                })?;
            workers.push(handle);
        }

        log::debug!("Pipeline compile scheduler started with {worker_count} workers");

        Ok(Self {
            sender: Some(sender),
            workers,
            counters,
        })
    }

    /// Queues a task for background compilation.
    ///
    /// A stopped scheduler hands the task back so the caller can run it
    /// inline; its completion event must still fire.
    pub fn dispatch(&self, task: CompileTask) -> std::result::Result<(), CompileTask> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(task);
        };
        sender.send(task).map_err(|err| err.into_inner())?;
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting tasks, finishes the queued ones and joins the workers.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Pipeline compile worker panicked");
            }
        }
        log::debug!("Pipeline compile scheduler stopped");
    }
}

impl Drop for CompileScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
