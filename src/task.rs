use crate::error::Error;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A boxed unit of work, ready to run on whatever thread picks it up.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cooperative cancellation flag shared between a future and its task.
///
/// Cancellation is advisory: setting the flag never preempts a running
/// operation, it only becomes visible at the operation's next checkpoint.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// A queued unit of work plus the cancellation flag of the future it
/// settles.
pub(crate) struct Task {
    pub(crate) job: Job,
    pub(crate) token: CancelToken,
}

/// A place jobs can be dispatched onto: an executor pool, or the calling
/// thread itself for deterministic tests.
///
/// Continuations registered on a future are dispatched through a `Spawner`
/// rather than run on the thread performing resolution. The exception is an
/// executor that cannot take the job right now — already stopped accepting
/// work, or its bounded queue is full: its `dispatch` runs the job inline so
/// no continuation is ever lost.
pub trait Spawner: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Runs every job synchronously on the dispatching thread.
pub struct CallerThread;

impl Spawner for CallerThread {
    fn dispatch(&self, job: Job) {
        job();
    }
}

pub fn caller_thread() -> Arc<dyn Spawner> {
    Arc::new(CallerThread)
}

/// Runs an operation, converting a panic into [`Error::Execution`] with the
/// payload message preserved.
pub(crate) fn run_captured<T>(f: impl FnOnce() -> T) -> Result<T, Error> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };

        Error::Execution(message)
    })
}
