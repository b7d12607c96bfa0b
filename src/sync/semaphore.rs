use crate::error::Error;

use std::collections::VecDeque;
use std::sync::Condvar;
use std::sync::Mutex as Mutex_std;
use std::time::{Duration, Instant};

/// Counting permit gate limiting concurrent access to a resource.
///
/// The default mode is non-fair: a releasing thread wakes the waiters and
/// whichever re-checks first takes the permits, which favors throughput.
/// [`Semaphore::fair`] grants permits strictly in arrival order instead.
///
/// Over-release is allowed by design: releasing more permits than were
/// ever acquired simply raises the available count.
pub struct Semaphore {
    inner: Mutex_std<Permits>,
    available: Condvar,
    fair: bool,
}

struct Permits {
    count: usize,
    closed: bool,
    next_ticket: u64,
    /// Arrival order of waiting acquirers; only consulted in fair mode.
    waiting: VecDeque<u64>,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self::build(permits, false)
    }

    pub fn fair(permits: usize) -> Self {
        Self::build(permits, true)
    }

    fn build(permits: usize, fair: bool) -> Self {
        Self {
            inner: Mutex_std::new(Permits {
                count: permits,
                closed: false,
                next_ticket: 0,
                waiting: VecDeque::new(),
            }),
            available: Condvar::new(),
            fair,
        }
    }

    /// Blocks until `permits` are available, then takes them atomically.
    ///
    /// Fails with [`Error::Interrupted`] if the semaphore is closed while
    /// waiting.
    pub fn acquire(&self, permits: usize) -> Result<(), Error> {
        let mut state = self.inner.lock().unwrap();

        if self.fair {
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiting.push_back(ticket);

            loop {
                if state.closed {
                    state.waiting.retain(|t| *t != ticket);
                    return Err(Error::Interrupted);
                }

                if state.waiting.front() == Some(&ticket) && state.count >= permits {
                    state.count -= permits;
                    state.waiting.pop_front();
                    drop(state);

                    // Leftover permits may satisfy the next in line.
                    self.available.notify_all();
                    return Ok(());
                }

                state = self.available.wait(state).unwrap();
            }
        }

        loop {
            if state.closed {
                return Err(Error::Interrupted);
            }

            if state.count >= permits {
                state.count -= permits;
                return Ok(());
            }

            state = self.available.wait(state).unwrap();
        }
    }

    /// Bounded wait variant; returns `false` without side effect on timeout
    /// or when the semaphore closes while waiting.
    pub fn try_acquire(&self, permits: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock().unwrap();

        if self.fair {
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiting.push_back(ticket);

            loop {
                if state.closed {
                    state.waiting.retain(|t| *t != ticket);
                    return false;
                }

                if state.waiting.front() == Some(&ticket) && state.count >= permits {
                    state.count -= permits;
                    state.waiting.pop_front();
                    drop(state);

                    self.available.notify_all();
                    return true;
                }

                let now = Instant::now();
                if now >= deadline {
                    state.waiting.retain(|t| *t != ticket);
                    drop(state);

                    // Give up the place in line so later arrivals make
                    // progress.
                    self.available.notify_all();
                    return false;
                }

                state = self.available.wait_timeout(state, deadline - now).unwrap().0;
            }
        }

        loop {
            if state.closed {
                return false;
            }

            if state.count >= permits {
                state.count -= permits;
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            state = self.available.wait_timeout(state, deadline - now).unwrap().0;
        }
    }

    /// Returns `permits` to the gate and wakes waiters.
    pub fn release(&self, permits: usize) {
        self.inner.lock().unwrap().count += permits;
        self.available.notify_all();
    }

    /// Interrupts every current and future waiter with
    /// [`Error::Interrupted`].
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.available.notify_all();
    }

    pub fn available_permits(&self) -> usize {
        self.inner.lock().unwrap().count
    }
}
