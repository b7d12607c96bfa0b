//! A thread-based future/promise runtime.
//!
//! Work submitted to an [`Executor`] or a [`Scheduler`] yields a
//! [`Future`]; continuations chained onto that future are dispatched back
//! onto an executor when it settles. [`sync`] provides explicit lock and
//! semaphore handles for coordinating user tasks across executors.
//!
//! Rejections that are never observed (no `get`, no `on_failure`) are
//! dropped silently.

mod queue;
mod task;

pub mod error;
pub mod executor;
pub mod future;
pub mod scheduler;
pub mod sync;

pub use error::Error;
pub use executor::{Executor, ExecutorBuilder};
pub use future::{Future, Promise, all, any};
pub use scheduler::{RepeatHandle, Scheduler};
pub use task::{CallerThread, CancelToken, Job, Spawner, caller_thread};
