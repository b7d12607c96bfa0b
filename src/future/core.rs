use crate::error::Error;
use crate::task::{CancelToken, Spawner, caller_thread};

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Final state of a future.
#[derive(Clone, Debug)]
pub(crate) enum Outcome<T> {
    Fulfilled(T),
    Rejected(Error),
    Cancelled,
}

type Continuation<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

enum State<T> {
    Pending(Vec<(Arc<dyn Spawner>, Continuation<T>)>),
    Settled(Outcome<T>),
}

/// Single-assignment outcome cell shared by a [`Future`] and its
/// [`Promise`].
///
/// The transition out of `Pending` is one-way and exactly-once: whichever
/// settlement takes the lock first wins, flushes the continuation list, and
/// every later settlement attempt reports defeat. Continuations registered
/// after the flush dispatch immediately.
struct Shared<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
    token: CancelToken,
    spawner: Arc<dyn Spawner>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn settle(&self, outcome: Outcome<T>) -> bool {
        let flushed = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Pending(continuations) => {
                    let continuations = std::mem::take(continuations);
                    *state = State::Settled(outcome.clone());
                    continuations
                }
                State::Settled(_) => return false,
            }
        };

        self.settled.notify_all();

        // Continuations run in registration order, each on its own spawner,
        // never on the thread holding the state lock.
        for (spawner, continuation) in flushed {
            let outcome = outcome.clone();
            spawner.dispatch(Box::new(move || continuation(outcome)));
        }

        true
    }

    fn when_settled(&self, spawner: Arc<dyn Spawner>, continuation: Continuation<T>) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Pending(continuations) => {
                continuations.push((spawner, continuation));
            }
            State::Settled(outcome) => {
                let outcome = outcome.clone();
                drop(state);
                spawner.dispatch(Box::new(move || continuation(outcome)));
            }
        }
    }
}

/// Writer half of a future: settles the outcome exactly once.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a detached promise whose continuations run on the caller's
    /// thread. Promises produced by an executor dispatch continuations back
    /// onto that executor instead.
    pub fn new() -> Self {
        Self::with_spawner(caller_thread())
    }

    pub(crate) fn with_spawner(spawner: Arc<dyn Spawner>) -> Self {
        Promise {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending(Vec::new())),
                settled: Condvar::new(),
                token: CancelToken::new(),
                spawner,
            }),
        }
    }

    pub fn future(&self) -> Future<T> {
        Future {
            shared: self.shared.clone(),
        }
    }

    /// Returns whether this settlement won the race.
    pub fn fulfill(&self, value: T) -> bool {
        self.shared.settle(Outcome::Fulfilled(value))
    }

    pub fn reject(&self, error: Error) -> bool {
        self.shared.settle(Outcome::Rejected(error))
    }

    pub(crate) fn settle_cancelled(&self) -> bool {
        self.shared.settle(Outcome::Cancelled)
    }

    pub(crate) fn settle(&self, outcome: Outcome<T>) -> bool {
        self.shared.settle(outcome)
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an eventual value: fulfilled, rejected, or cancelled, exactly
/// once.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// The cooperative cancellation flag observed by the underlying task.
    pub fn token(&self) -> CancelToken {
        self.shared.token.clone()
    }

    pub(crate) fn spawner(&self) -> Arc<dyn Spawner> {
        self.shared.spawner.clone()
    }

    pub(crate) fn when_settled(&self, spawner: Arc<dyn Spawner>, continuation: Continuation<T>) {
        self.shared.when_settled(spawner, continuation);
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.state.lock().unwrap(), State::Settled(_))
    }

    /// Transitions a pending future to cancelled and trips the task's
    /// cancellation flag. Returns `false` if the future already settled; the
    /// resolved value is never altered.
    pub fn cancel(&self) -> bool {
        if self.shared.settle(Outcome::Cancelled) {
            self.shared.token.cancel();
            true
        } else {
            false
        }
    }

    /// Blocks the calling thread until the future settles.
    pub fn get(&self) -> Result<T, Error> {
        let mut state = self.shared.state.lock().unwrap();

        loop {
            if let State::Settled(outcome) = &*state {
                return outcome_to_result(outcome.clone());
            }

            state = self.shared.settled.wait(state).unwrap();
        }
    }

    /// Bounded wait variant of [`Future::get`]. Expiry raises
    /// [`Error::Timeout`] without cancelling the underlying work; a later
    /// `get` still observes the eventual outcome.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, Error> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock().unwrap();

        loop {
            if let State::Settled(outcome) = &*state {
                return outcome_to_result(outcome.clone());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }

            let (guard, _) = self
                .shared
                .settled
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
    }
}

fn outcome_to_result<T>(outcome: Outcome<T>) -> Result<T, Error> {
    match outcome {
        Outcome::Fulfilled(value) => Ok(value),
        Outcome::Rejected(error) => Err(error),
        Outcome::Cancelled => Err(Error::Cancelled),
    }
}
