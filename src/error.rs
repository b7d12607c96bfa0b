use thiserror::Error;

/// Errors surfaced by the runtime.
///
/// Errors raised inside a submitted operation never escape the worker that
/// ran it; they are captured as [`Error::Execution`] and settle the task's
/// future as rejected. Misuse of a primitive ([`Error::IllegalState`]) is
/// returned synchronously to the misusing caller and never flows through a
/// future.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The executor is shut down and no longer accepts work.
    #[error("submission rejected: executor is shut down")]
    Rejected,

    /// A bounded wait expired. The underlying work is not cancelled.
    #[error("wait timed out")]
    Timeout,

    /// The operation observed cooperative cancellation.
    #[error("operation was cancelled")]
    Cancelled,

    /// A submitted operation panicked; the payload message is preserved.
    #[error("task failed: {0}")]
    Execution(String),

    /// A primitive was misused, e.g. unlocking a mutex the caller does not
    /// hold.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// A blocking wait was interrupted externally, e.g. by closing the
    /// semaphore it was waiting on.
    #[error("wait was interrupted")]
    Interrupted,
}
