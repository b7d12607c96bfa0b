use crate::error::Error;
use crate::future::core::{Future, Outcome, Promise};
use crate::task::{Spawner, caller_thread, run_captured};

use std::sync::{Arc, Mutex};

impl<T: Clone + Send + 'static> Future<T> {
    /// Transforms a fulfilled value; rejection and cancellation pass through
    /// untouched, without invoking `f`. `f` runs on the executor that
    /// resolved this future.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.map_on(self.spawner(), f)
    }

    /// [`Future::map`] with an explicitly supplied executor for `f`.
    pub fn map_on<U, F>(&self, spawner: Arc<dyn Spawner>, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let promise = Promise::with_spawner(spawner.clone());
        let mapped = promise.future();

        self.when_settled(
            spawner,
            Box::new(move |outcome| match outcome {
                Outcome::Fulfilled(value) => match run_captured(move || f(value)) {
                    Ok(value) => {
                        promise.fulfill(value);
                    }
                    Err(error) => {
                        promise.reject(error);
                    }
                },
                Outcome::Rejected(error) => {
                    promise.reject(error);
                }
                Outcome::Cancelled => {
                    promise.settle_cancelled();
                }
            }),
        );

        mapped
    }

    /// Like [`Future::map`] but `f` returns a future itself; the result
    /// settles only when the inner future settles (flattening). Failure in
    /// either stage propagates the same way.
    pub fn and_then<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        let spawner = self.spawner();
        let promise = Promise::with_spawner(spawner.clone());
        let flattened = promise.future();

        self.when_settled(
            spawner.clone(),
            Box::new(move |outcome| match outcome {
                Outcome::Fulfilled(value) => match run_captured(move || f(value)) {
                    Ok(inner) => {
                        inner.when_settled(
                            spawner,
                            Box::new(move |inner_outcome| {
                                promise.settle(inner_outcome);
                            }),
                        );
                    }
                    Err(error) => {
                        promise.reject(error);
                    }
                },
                Outcome::Rejected(error) => {
                    promise.reject(error);
                }
                Outcome::Cancelled => {
                    promise.settle_cancelled();
                }
            }),
        );

        flattened
    }

    /// Registers a side-effecting observer for fulfillment. Runs on
    /// resolution, immediately if already resolved; never alters the value.
    pub fn on_success<F>(&self, f: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.when_settled(
            self.spawner(),
            Box::new(move |outcome| {
                if let Outcome::Fulfilled(value) = outcome {
                    let _ = run_captured(move || f(value));
                }
            }),
        );
    }

    /// Registers a side-effecting observer for rejection.
    pub fn on_failure<F>(&self, f: F)
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.when_settled(
            self.spawner(),
            Box::new(move |outcome| {
                if let Outcome::Rejected(error) = outcome {
                    let _ = run_captured(move || f(error));
                }
            }),
        );
    }

    /// Converts a rejection into a success by invoking `f`; a fulfilled
    /// value passes through unchanged. Cancellation is not caught.
    pub fn recover<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(Error) -> T + Send + 'static,
    {
        let spawner = self.spawner();
        let promise = Promise::with_spawner(spawner.clone());
        let recovered = promise.future();

        self.when_settled(
            spawner,
            Box::new(move |outcome| match outcome {
                Outcome::Fulfilled(value) => {
                    promise.fulfill(value);
                }
                Outcome::Rejected(error) => match run_captured(move || f(error)) {
                    Ok(value) => {
                        promise.fulfill(value);
                    }
                    Err(error) => {
                        promise.reject(error);
                    }
                },
                Outcome::Cancelled => {
                    promise.settle_cancelled();
                }
            }),
        );

        recovered
    }

    /// Settles once both inputs fulfill, applying `f`; rejects with the
    /// first error observed. When both inputs fail, this future's error is
    /// preferred so the result is well-defined.
    pub fn combine<U, V, F>(&self, other: &Future<U>, f: F) -> Future<V>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        let spawner = self.spawner();
        let promise = Promise::with_spawner(spawner.clone());
        let combined = promise.future();

        let pair = Arc::new(Mutex::new(Both {
            left: None,
            right: None,
            f: Some(f),
            promise,
        }));

        let left = pair.clone();
        self.when_settled(
            spawner.clone(),
            Box::new(move |outcome| {
                let mut pair = left.lock().unwrap();
                pair.left = Some(outcome);
                settle_both(&mut pair);
            }),
        );

        let right = pair.clone();
        other.when_settled(
            spawner,
            Box::new(move |outcome| {
                let mut pair = right.lock().unwrap();
                pair.right = Some(outcome);
                settle_both(&mut pair);
            }),
        );

        combined
    }
}

struct Both<T, U, V, F> {
    left: Option<Outcome<T>>,
    right: Option<Outcome<U>>,
    /// Doubles as the not-yet-settled marker.
    f: Option<F>,
    promise: Promise<V>,
}

fn settle_both<T, U, V, F>(pair: &mut Both<T, U, V, F>)
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    V: Clone + Send + 'static,
    F: FnOnce(T, U) -> V + Send + 'static,
{
    if pair.f.is_none() {
        return;
    }

    enum Decision {
        Wait,
        Apply,
        Fail(Error),
        Cancel,
    }

    // The left input's failure wins whenever it is known; a failure on the
    // right settles immediately only while the left is still pending or
    // already fulfilled.
    let decision = match (&pair.left, &pair.right) {
        (Some(Outcome::Rejected(error)), _) => Decision::Fail(error.clone()),
        (Some(Outcome::Cancelled), _) => Decision::Cancel,
        (_, Some(Outcome::Rejected(error))) => Decision::Fail(error.clone()),
        (_, Some(Outcome::Cancelled)) => Decision::Cancel,
        (Some(Outcome::Fulfilled(_)), Some(Outcome::Fulfilled(_))) => Decision::Apply,
        _ => Decision::Wait,
    };

    match decision {
        Decision::Wait => {}
        Decision::Fail(error) => {
            pair.f.take();
            pair.promise.reject(error);
        }
        Decision::Cancel => {
            pair.f.take();
            pair.promise.settle_cancelled();
        }
        Decision::Apply => {
            let (Some(f), Some(Outcome::Fulfilled(a)), Some(Outcome::Fulfilled(b))) =
                (pair.f.take(), pair.left.take(), pair.right.take())
            else {
                return;
            };

            match run_captured(move || f(a, b)) {
                Ok(value) => {
                    pair.promise.fulfill(value);
                }
                Err(error) => {
                    pair.promise.reject(error);
                }
            }
        }
    }
}

/// Resolves when every input fulfills, preserving input order in the result;
/// rejects with the first error observed without waiting for stragglers. An
/// empty input resolves immediately to an empty vector.
pub fn all<T>(futures: &[Future<T>]) -> Future<Vec<T>>
where
    T: Clone + Send + 'static,
{
    let spawner = futures
        .first()
        .map(|future| future.spawner())
        .unwrap_or_else(caller_thread);
    let promise = Promise::with_spawner(spawner.clone());
    let gathered = promise.future();

    if futures.is_empty() {
        promise.fulfill(Vec::new());
        return gathered;
    }

    struct Gather<T> {
        slots: Vec<Option<T>>,
        remaining: usize,
        promise: Option<Promise<Vec<T>>>,
    }

    let gather = Arc::new(Mutex::new(Gather {
        slots: vec![None; futures.len()],
        remaining: futures.len(),
        promise: Some(promise),
    }));

    for (index, future) in futures.iter().enumerate() {
        let gather = gather.clone();
        future.when_settled(
            spawner.clone(),
            Box::new(move |outcome| {
                let mut gather = gather.lock().unwrap();
                if gather.promise.is_none() {
                    return;
                }

                match outcome {
                    Outcome::Fulfilled(value) => {
                        gather.slots[index] = Some(value);
                        gather.remaining -= 1;

                        if gather.remaining == 0 {
                            let values = gather.slots.drain(..).flatten().collect();
                            if let Some(promise) = gather.promise.take() {
                                promise.fulfill(values);
                            }
                        }
                    }
                    Outcome::Rejected(error) => {
                        if let Some(promise) = gather.promise.take() {
                            promise.reject(error);
                        }
                    }
                    Outcome::Cancelled => {
                        if let Some(promise) = gather.promise.take() {
                            promise.settle_cancelled();
                        }
                    }
                }
            }),
        );
    }

    gathered
}

/// Settles with whichever input settles first, success or failure; later
/// settlements are ignored. An empty input never settles.
pub fn any<T>(futures: &[Future<T>]) -> Future<T>
where
    T: Clone + Send + 'static,
{
    let spawner = futures
        .first()
        .map(|future| future.spawner())
        .unwrap_or_else(caller_thread);
    let promise = Promise::with_spawner(spawner.clone());
    let first = promise.future();

    for future in futures {
        let promise = promise.clone();
        future.when_settled(
            spawner.clone(),
            Box::new(move |outcome| {
                promise.settle(outcome);
            }),
        );
    }

    first
}
