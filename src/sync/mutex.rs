use crate::error::Error;

use std::sync::Mutex as Mutex_std;
use std::sync::{Condvar, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// An explicit exclusive lock handle.
///
/// Unlike `std::sync::Mutex` this does not wrap the data it protects: the
/// handle is named, passed to every critical section that needs it, and
/// paired `lock`/`unlock` calls delimit the section. `unlock` by a thread
/// that does not hold the lock is a programming error and is reported as
/// [`Error::IllegalState`].
///
/// The primitive never detects or breaks deadlocks. Two of these acquired
/// in opposite order by two threads deadlock both of them, and a
/// non-reentrant handle relocked by its own holder deadlocks that thread;
/// both are properties of use, not of the lock.
pub struct Mutex {
    inner: Mutex_std<Owner>,
    freed: Condvar,
    reentrant: bool,
}

#[derive(Default)]
struct Owner {
    holder: Option<ThreadId>,
    holds: usize,
}

impl Mutex {
    /// A non-reentrant lock.
    pub fn new() -> Self {
        Self {
            inner: Mutex_std::new(Owner::default()),
            freed: Condvar::new(),
            reentrant: false,
        }
    }

    /// A reentrant lock: `lock` by the current holder increments a hold
    /// count instead of blocking, and the lock is released to others only
    /// once `unlock` brings the count back to zero.
    pub fn reentrant() -> Self {
        Self {
            inner: Mutex_std::new(Owner::default()),
            freed: Condvar::new(),
            reentrant: true,
        }
    }

    /// Blocks until the lock is held by the calling thread.
    pub fn lock(&self) {
        let me = thread::current().id();
        let mut owner = self.inner.lock().unwrap();

        if self.try_take(&mut owner, me) {
            return;
        }

        loop {
            owner = self.freed.wait(owner).unwrap();

            if self.try_take(&mut owner, me) {
                return;
            }
        }
    }

    /// Bounded wait variant of [`Mutex::lock`]; returns whether the lock
    /// was acquired before the timeout elapsed.
    pub fn try_lock(&self, timeout: Duration) -> bool {
        let me = thread::current().id();
        let deadline = Instant::now() + timeout;
        let mut owner = self.inner.lock().unwrap();

        loop {
            if self.try_take(&mut owner, me) {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let (guard, _) = self.freed.wait_timeout(owner, deadline - now).unwrap();
            owner = guard;
        }
    }

    /// Releases one hold on the lock.
    pub fn unlock(&self) -> Result<(), Error> {
        let me = thread::current().id();
        let mut owner = self.inner.lock().unwrap();

        if owner.holder != Some(me) {
            return Err(Error::IllegalState(
                "unlock by a thread that does not hold the lock",
            ));
        }

        owner.holds -= 1;

        if owner.holds == 0 {
            owner.holder = None;
            drop(owner);
            self.freed.notify_one();
        }

        Ok(())
    }

    fn try_take(&self, owner: &mut MutexGuard<'_, Owner>, me: ThreadId) -> bool {
        if self.reentrant && owner.holder == Some(me) {
            owner.holds += 1;
            return true;
        }

        if owner.holder.is_none() {
            owner.holder = Some(me);
            owner.holds = 1;
            return true;
        }

        false
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
