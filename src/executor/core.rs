use crate::error::Error;
use crate::executor::state::{DRAINING, RUNNING, TERMINATED};
use crate::executor::worker::Worker;
use crate::future::{Future, Promise};
use crate::queue::TaskQueue;
use crate::task::{CancelToken, Job, Spawner, Task, run_captured};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

/// Fixed-size worker pool over a shared task queue.
///
/// Work is accepted while the pool is running, drained while it shuts down,
/// and refused once terminated. Dropping the executor performs a graceful
/// shutdown and joins every worker.
pub struct Executor {
    core: Arc<Core>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

pub(crate) struct Core {
    pub(crate) queue: TaskQueue,
    pub(crate) state: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    /// Cancellation flag of the task each worker is currently running,
    /// indexed by worker id. Forced shutdown trips them all.
    pub(crate) running: Vec<Mutex<Option<CancelToken>>>,
    alive: Mutex<usize>,
    terminated: Condvar,
}

impl Executor {
    pub(crate) fn start(pool_size: usize, queue_capacity: usize) -> Self {
        let core = Arc::new(Core {
            queue: TaskQueue::new(queue_capacity),
            state: AtomicUsize::new(RUNNING),
            in_flight: AtomicUsize::new(0),
            running: (0..pool_size).map(|_| Mutex::new(None)).collect(),
            alive: Mutex::new(pool_size),
            terminated: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(pool_size);

        for id in 0..pool_size {
            let worker = Worker::new(id, core.clone());
            handles.push(thread::spawn(move || worker.run()));
        }

        Self {
            core,
            handles: Mutex::new(handles),
        }
    }

    /// Enqueues an operation and returns its future immediately.
    ///
    /// Fails with [`Error::Rejected`] once shutdown has begun. A bounded
    /// queue blocks the submitter while full.
    pub fn submit<T, F>(&self, f: F) -> Result<Future<T>, Error>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.core.submit(move |_token| f())
    }

    /// Like [`Executor::submit`], passing the task's [`CancelToken`] into
    /// the operation so it can check for cancellation at its own
    /// checkpoints.
    pub fn submit_with_token<T, F>(&self, f: F) -> Result<Future<T>, Error>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        self.core.submit(f)
    }

    /// Begins shutdown. Graceful lets queued tasks run to completion;
    /// forced discards the queue (those futures settle cancelled) and trips
    /// the cancellation flag of every in-flight task.
    pub fn shutdown(&self, graceful: bool) {
        self.core.shutdown(graceful);
    }

    /// Blocks until every worker has exited or the timeout elapses; returns
    /// whether termination completed in time.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut alive = self.core.alive.lock().unwrap();

        while *alive > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let (guard, _) = self
                .core
                .terminated
                .wait_timeout(alive, deadline - now)
                .unwrap();
            alive = guard;
        }

        true
    }

    pub fn is_terminated(&self) -> bool {
        self.core.state.load(Ordering::Acquire) == TERMINATED
    }

    /// Number of tasks currently executing on workers.
    pub fn in_flight(&self) -> usize {
        self.core.in_flight.load(Ordering::Acquire)
    }

    /// Handle for dispatching continuations and scheduled work onto this
    /// pool.
    pub fn spawner(&self) -> Arc<dyn Spawner> {
        self.core.clone()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.core.shutdown(true);

        for handle in self.handles.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Core {
    fn submit<T, F>(self: &Arc<Self>, f: F) -> Result<Future<T>, Error>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        if self.state.load(Ordering::Acquire) != RUNNING {
            return Err(Error::Rejected);
        }

        let promise = Promise::with_spawner(self.clone() as Arc<dyn Spawner>);
        let future = promise.future();
        let token = future.token();

        let job_token = token.clone();
        let job: Job = Box::new(move || {
            if job_token.is_cancelled() {
                promise.settle_cancelled();
                return;
            }

            match run_captured(move || f(&job_token)) {
                Ok(value) => {
                    promise.fulfill(value);
                }
                Err(error) => {
                    promise.reject(error);
                }
            }
        });

        self.queue
            .push(Task { job, token })
            .map_err(|_| Error::Rejected)?;

        Ok(future)
    }

    fn shutdown(&self, graceful: bool) {
        if self
            .state
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        debug!(graceful, "executor shutting down");

        if !graceful {
            // Settle discarded tasks as cancelled without running their
            // operations: the wrapper observes the tripped flag up front.
            for task in self.queue.drain() {
                task.token.cancel();
                (task.job)();
            }

            for slot in &self.running {
                if let Some(token) = slot.lock().unwrap().as_ref() {
                    token.cancel();
                }
            }
        }

        self.queue.close();
    }

    pub(crate) fn worker_exited(&self) {
        let mut alive = self.alive.lock().unwrap();
        *alive -= 1;

        if *alive == 0 {
            self.state.store(TERMINATED, Ordering::Release);
            self.terminated.notify_all();
            debug!("executor terminated");
        }
    }
}

impl Spawner for Core {
    fn dispatch(&self, job: Job) {
        if self.state.load(Ordering::Acquire) != RUNNING {
            job();
            return;
        }

        // Never block on the capacity bound here: the dispatching thread may
        // itself be a worker flushing continuations, and parking the queue's
        // own consumer on `not_full` wedges the pool. A full or closed queue
        // hands the job back and it runs inline so it is never lost.
        if let Err(task) = self.queue.try_push(Task {
            job,
            token: CancelToken::new(),
        }) {
            (task.job)();
        }
    }
}
