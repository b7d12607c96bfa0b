use crate::executor::Executor;
use crate::future::{Future, Promise};
use crate::task::{CancelToken, Job, Spawner, run_captured};

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

/// Fires tasks at or after a target time.
///
/// A dedicated timer thread sleeps until the earliest deadline in a
/// delay-ordered heap, then hands every due entry to the executor; nothing
/// user-supplied ever runs on the timer thread. Dropping the scheduler
/// shuts the timer down and joins it.
pub struct Scheduler {
    shared: Arc<TimerShared>,
    thread: Option<JoinHandle<()>>,
}

struct TimerShared {
    heap: Mutex<BinaryHeap<Entry>>,
    tick: Condvar,
    shutdown: AtomicBool,
    seq: AtomicU64,
    spawner: Arc<dyn Spawner>,
}

struct Entry {
    deadline: Instant,
    /// Insertion order; equal deadlines fire FIFO.
    seq: u64,
    cancelled: CancelToken,
    kind: EntryKind,
}

enum EntryKind {
    Once(Job),
    Repeat {
        every: Duration,
        op: Arc<dyn Fn() + Send + Sync>,
    },
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed so the heap pops the earliest deadline first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Scheduler {
    pub fn new(executor: &Executor) -> Self {
        Self::with_spawner(executor.spawner())
    }

    pub fn with_spawner(spawner: Arc<dyn Spawner>) -> Self {
        let shared = Arc::new(TimerShared {
            heap: Mutex::new(BinaryHeap::new()),
            tick: Condvar::new(),
            shutdown: AtomicBool::new(false),
            seq: AtomicU64::new(0),
            spawner,
        });

        let timer = shared.clone();
        let thread = thread::spawn(move || timer_loop(&timer));

        Self {
            shared,
            thread: Some(thread),
        }
    }

    /// Runs `f` once `delay` has elapsed. Cancelling the returned future
    /// unschedules the entry if it has not fired yet.
    pub fn schedule<T, F>(&self, f: F, delay: Duration) -> Future<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.schedule_at(f, Instant::now() + delay)
    }

    /// Runs `f` at an absolute point in time. Fire time does not shift when
    /// the timer thread wakes late.
    pub fn schedule_at<T, F>(&self, f: F, at: Instant) -> Future<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let promise = Promise::with_spawner(self.shared.spawner.clone());
        let future = promise.future();
        let token = future.token();

        let job_token = token.clone();
        let job: Job = Box::new(move || {
            if job_token.is_cancelled() {
                promise.settle_cancelled();
                return;
            }

            match run_captured(f) {
                Ok(value) => {
                    promise.fulfill(value);
                }
                Err(error) => {
                    promise.reject(error);
                }
            }
        });

        self.insert(Entry {
            deadline: at,
            seq: self.shared.seq.fetch_add(1, Ordering::Relaxed),
            cancelled: token,
            kind: EntryKind::Once(job),
        });

        future
    }

    /// Runs `f` at a fixed rate: the next deadline is the previous deadline
    /// plus `every`, so one slow tick never compounds into drift.
    pub fn schedule_repeating<F>(
        &self,
        f: F,
        initial_delay: Duration,
        every: Duration,
    ) -> RepeatHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        assert!(!every.is_zero(), "every must be > 0");

        let cancelled = CancelToken::new();

        self.insert(Entry {
            deadline: Instant::now() + initial_delay,
            seq: self.shared.seq.fetch_add(1, Ordering::Relaxed),
            cancelled: cancelled.clone(),
            kind: EntryKind::Repeat {
                every,
                op: Arc::new(f),
            },
        });

        RepeatHandle { cancelled }
    }

    /// Stops the timer thread. Entries already dispatched still run;
    /// anything scheduled afterwards settles cancelled immediately.
    pub fn shutdown(&self) {
        // Flag and wakeup happen under the heap lock. The timer thread only
        // waits after checking the flag under that same lock, so the
        // notification cannot land in the gap and be lost.
        let _heap = self.shared.heap.lock().unwrap();
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.tick.notify_all();
    }

    fn insert(&self, entry: Entry) {
        let mut heap = self.shared.heap.lock().unwrap();

        if self.shared.shutdown.load(Ordering::Acquire) {
            drop(heap);

            // The timer thread is gone; the entry can never fire. Its job
            // observes the tripped flag and settles the future cancelled.
            entry.cancelled.cancel();
            if let EntryKind::Once(job) = entry.kind {
                job();
            }
            return;
        }

        heap.push(entry);
        drop(heap);
        self.shared.tick.notify_all();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();

        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Owned handle to a repeating entry; cancelling stops future firings.
pub struct RepeatHandle {
    cancelled: CancelToken,
}

impl RepeatHandle {
    pub fn cancel(&self) {
        self.cancelled.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }
}

fn timer_loop(shared: &TimerShared) {
    loop {
        let mut due = Vec::new();
        let mut heap = shared.heap.lock().unwrap();

        // Checked under the heap lock; shutdown flags and notifies under the
        // same lock, so this thread either sees the flag here or is already
        // waiting and receives the wakeup.
        if shared.shutdown.load(Ordering::Acquire) {
            debug!("scheduler timer stopped");
            return;
        }

        let now = Instant::now();

        while heap.peek().is_some_and(|entry| entry.deadline <= now) {
            let Some(entry) = heap.pop() else { break };

            if entry.cancelled.is_cancelled() {
                continue;
            }

            // Repeating entries keep their sequence number and advance by a
            // whole interval from the previous deadline, not from now.
            if let EntryKind::Repeat { every, ref op } = entry.kind {
                heap.push(Entry {
                    deadline: entry.deadline + every,
                    seq: entry.seq,
                    cancelled: entry.cancelled.clone(),
                    kind: EntryKind::Repeat {
                        every,
                        op: op.clone(),
                    },
                });
            }

            due.push(entry);
        }

        if due.is_empty() {
            let _unused = match heap.peek().map(|entry| entry.deadline) {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        continue;
                    }

                    shared.tick.wait_timeout(heap, deadline - now).unwrap().0
                }
                None => shared.tick.wait(heap).unwrap(),
            };
            continue;
        }

        // Dispatch without the heap lock so an inline spawner can schedule
        // follow-up work from inside a due job.
        drop(heap);

        for entry in due {
            trace!(seq = entry.seq, "dispatching due entry");

            match entry.kind {
                EntryKind::Once(job) => {
                    shared.spawner.dispatch(job);
                }
                EntryKind::Repeat { op, .. } => {
                    let tick_flag = entry.cancelled;
                    shared.spawner.dispatch(Box::new(move || {
                        if !tick_flag.is_cancelled()
                            && let Err(error) = run_captured(|| op())
                        {
                            warn!(%error, "repeating task failed");
                        }
                    }));
                }
            }
        }
    }
}
