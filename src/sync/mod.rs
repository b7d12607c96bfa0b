//! Synchronization primitives.
//!
//! Explicit, named handles rather than data-wrapping guards: a critical
//! section names the [`Mutex`] it is protected by, and a [`Semaphore`]
//! bounds how many threads may be inside a resource at once. These guard
//! state shared between tasks, including tasks running on different
//! executors.

mod mutex;
mod semaphore;

pub use mutex::Mutex;
pub use semaphore::Semaphore;
