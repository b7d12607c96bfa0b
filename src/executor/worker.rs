use crate::executor::core::Core;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::trace;

pub(crate) struct Worker {
    id: usize,
    core: Arc<Core>,
}

impl Worker {
    pub(crate) fn new(id: usize, core: Arc<Core>) -> Self {
        Self { id, core }
    }

    /// Dequeues and runs tasks until the queue closes and drains. A task
    /// that panics settles its future as rejected inside the job wrapper
    /// and never unwinds into this loop.
    pub(crate) fn run(&self) {
        trace!(worker = self.id, "worker started");

        while let Some(task) = self.core.queue.pop_into(&self.core.running[self.id]) {
            self.core.in_flight.fetch_add(1, Ordering::AcqRel);

            (task.job)();

            self.core.in_flight.fetch_sub(1, Ordering::AcqRel);
            *self.core.running[self.id].lock().unwrap() = None;
        }

        trace!(worker = self.id, "worker exiting");
        self.core.worker_exited();
    }
}
