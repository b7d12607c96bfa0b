use crate::task::{CancelToken, Task};

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Thread-safe queue of pending tasks shared by an executor's workers.
///
/// A capacity of 0 means unbounded; otherwise `push` blocks the submitter
/// while the queue is full. Closing the queue wakes everyone: blocked
/// submitters get their task back, workers drain what is left and then see
/// `None`.
pub(crate) struct TaskQueue {
    inner: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

struct State {
    items: VecDeque<Task>,
    closed: bool,
}

impl TaskQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
        let mut state = self.inner.lock().unwrap();

        loop {
            if state.closed {
                return Err(task);
            }

            if self.capacity == 0 || state.items.len() < self.capacity {
                break;
            }

            state = self.not_full.wait(state).unwrap();
        }

        state.items.push_back(task);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking variant of [`TaskQueue::push`]: a closed or full queue
    /// hands the task straight back instead of parking the caller. Used for
    /// internal dispatch, where the pushing thread may be a worker that is
    /// also the queue's only consumer.
    pub(crate) fn try_push(&self, task: Task) -> Result<(), Task> {
        let mut state = self.inner.lock().unwrap();

        if state.closed || (self.capacity != 0 && state.items.len() >= self.capacity) {
            return Err(task);
        }

        state.items.push_back(task);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocks until a task is available; `None` once closed and drained.
    ///
    /// The claimed task's cancellation token is published into `slot` before
    /// the queue lock is released, so a forced shutdown never observes a
    /// task that has left the queue but is not yet visible in a worker slot.
    pub(crate) fn pop_into(&self, slot: &Mutex<Option<CancelToken>>) -> Option<Task> {
        let mut state = self.inner.lock().unwrap();

        loop {
            if let Some(task) = state.items.pop_front() {
                *slot.lock().unwrap() = Some(task.token.clone());
                drop(state);
                self.not_full.notify_one();
                return Some(task);
            }

            if state.closed {
                return None;
            }

            state = self.not_empty.wait(state).unwrap();
        }
    }

    pub(crate) fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Removes everything still queued. Used by forced shutdown.
    pub(crate) fn drain(&self) -> Vec<Task> {
        let mut state = self.inner.lock().unwrap();
        let drained = state.items.drain(..).collect();
        drop(state);

        self.not_full.notify_all();
        drained
    }
}
