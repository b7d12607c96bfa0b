use promissum::{Error, ExecutorBuilder};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_submit_returns_value() {
    let executor = ExecutorBuilder::new().pool_size(2).build();

    let future = executor.submit(|| 21 * 2).unwrap();

    assert_eq!(future.get(), Ok(42));
}

#[test]
fn test_submit_many_tasks() {
    let executor = ExecutorBuilder::new().pool_size(4).build();

    let futures: Vec<_> = (0..100)
        .map(|i| executor.submit(move || i * 2).unwrap())
        .collect();

    for (i, future) in futures.into_iter().enumerate() {
        assert_eq!(future.get(), Ok(i * 2));
    }
}

#[test]
fn test_panicking_task_rejects_future_and_keeps_worker() {
    let executor = ExecutorBuilder::new().pool_size(1).build();

    let failed: promissum::Future<i32> = executor.submit(|| panic!("boom")).unwrap();
    assert_eq!(failed.get(), Err(Error::Execution("boom".into())));

    // The single worker survived the panic.
    let ok = executor.submit(|| 1).unwrap();
    assert_eq!(ok.get(), Ok(1));
}

#[test]
fn test_submit_after_shutdown_is_rejected() {
    let executor = ExecutorBuilder::new().pool_size(1).build();

    executor.shutdown(true);

    assert_eq!(executor.submit(|| 1).err(), Some(Error::Rejected));
}

#[test]
fn test_graceful_shutdown_runs_queued_tasks() {
    let executor = ExecutorBuilder::new().pool_size(1).build();
    let counter = Arc::new(AtomicU64::new(0));

    let futures: Vec<_> = (0..10)
        .map(|_| {
            let counter = counter.clone();
            executor
                .submit(move || {
                    thread::sleep(Duration::from_millis(5));
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        })
        .collect();

    executor.shutdown(true);
    assert!(executor.await_termination(Duration::from_secs(5)));

    for future in futures {
        assert_eq!(future.get(), Ok(()));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn test_forced_shutdown_cancels_queued_tasks() {
    let executor = ExecutorBuilder::new().pool_size(1).build();

    let release = Arc::new(AtomicBool::new(false));
    let blocker_release = release.clone();
    let blocker = executor
        .submit_with_token(move |token| {
            while !blocker_release.load(Ordering::SeqCst) && !token.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

    let queued: Vec<_> = (0..5)
        .map(|i| executor.submit(move || i).unwrap())
        .collect();

    // Let the blocker start so the rest sit in the queue.
    thread::sleep(Duration::from_millis(30));

    executor.shutdown(false);

    for future in queued {
        assert_eq!(future.get(), Err(Error::Cancelled));
    }

    // The in-flight task observed its tripped flag and finished.
    assert!(blocker.token().is_cancelled());
    assert_eq!(blocker.get(), Ok(()));
    assert!(executor.await_termination(Duration::from_secs(5)));
    release.store(true, Ordering::SeqCst);
}

#[test]
fn test_await_termination_times_out_while_busy() {
    let executor = ExecutorBuilder::new().pool_size(1).build();

    let _busy = executor
        .submit(|| thread::sleep(Duration::from_millis(200)))
        .unwrap();

    executor.shutdown(true);

    assert!(!executor.await_termination(Duration::from_millis(20)));
    assert!(executor.await_termination(Duration::from_secs(5)));
    assert!(executor.is_terminated());
    assert_eq!(executor.in_flight(), 0);
}

#[test]
fn test_bounded_queue_still_completes_everything() {
    let executor = ExecutorBuilder::new()
        .pool_size(2)
        .queue_capacity(2)
        .build();

    let futures: Vec<_> = (0..40)
        .map(|i| {
            executor
                .submit(move || {
                    thread::sleep(Duration::from_millis(1));
                    i
                })
                .unwrap()
        })
        .collect();

    for (i, future) in futures.into_iter().enumerate() {
        assert_eq!(future.get(), Ok(i));
    }
}

#[test]
fn test_continuation_completes_with_full_bounded_queue() {
    let executor = ExecutorBuilder::new()
        .pool_size(1)
        .queue_capacity(1)
        .build();

    let busy = executor
        .submit(|| {
            thread::sleep(Duration::from_millis(60));
            1
        })
        .unwrap();

    // Occupies the single queue slot while the worker is busy, so the
    // continuation flush below finds the queue full and must not park the
    // worker on its own queue.
    let queued = executor.submit(|| 2).unwrap();
    let mapped = busy.map(|v| v + 1);

    assert_eq!(mapped.get_timeout(Duration::from_secs(2)), Ok(2));
    assert_eq!(queued.get_timeout(Duration::from_secs(2)), Ok(2));
}

#[test]
fn test_forced_shutdown_settles_every_future() {
    for _ in 0..20 {
        let executor = ExecutorBuilder::new().pool_size(2).build();

        let futures: Vec<_> = (0..50)
            .map(|i| {
                executor
                    .submit(move || {
                        thread::sleep(Duration::from_micros(200));
                        i
                    })
                    .unwrap()
            })
            .collect();

        executor.shutdown(false);
        assert!(executor.await_termination(Duration::from_secs(5)));

        // Tasks racing the shutdown either ran or were cancelled; none may
        // be left pending.
        for (i, future) in futures.into_iter().enumerate() {
            let settled = future.get_timeout(Duration::from_secs(1));
            assert!(
                settled == Ok(i) || settled == Err(Error::Cancelled),
                "task {i} ended as {settled:?}"
            );
        }
    }
}

#[test]
fn test_cancelled_queued_task_never_runs() {
    let executor = ExecutorBuilder::new().pool_size(1).build();

    let _blocker = executor
        .submit(|| thread::sleep(Duration::from_millis(100)))
        .unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    let ran_clone = ran.clone();
    let queued = executor
        .submit(move || {
            ran_clone.store(true, Ordering::SeqCst);
        })
        .unwrap();

    assert!(queued.cancel());
    assert_eq!(queued.get(), Err(Error::Cancelled));

    executor.shutdown(true);
    assert!(executor.await_termination(Duration::from_secs(5)));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_continuation_runs_on_executor() {
    let executor = ExecutorBuilder::new().pool_size(2).build();

    let mapped = executor
        .submit(|| 10)
        .unwrap()
        .map(|v| v + 1)
        .map(|v| v * 2);

    assert_eq!(mapped.get(), Ok(22));
}

#[test]
#[should_panic(expected = "pool_size must be > 0")]
fn test_pool_size_zero_panics() {
    let _ = ExecutorBuilder::new().pool_size(0).build();
}

#[test]
fn test_no_lost_updates_across_two_executors() {
    let first = ExecutorBuilder::new().pool_size(4).build();
    let second = ExecutorBuilder::new().pool_size(4).build();

    let lock = Arc::new(promissum::sync::Mutex::new());
    let counter = Arc::new(AtomicU64::new(0));

    let futures: Vec<_> = (0..1000)
        .map(|i| {
            let executor = if i % 2 == 0 { &first } else { &second };
            let lock = lock.clone();
            let counter = counter.clone();

            executor
                .submit(move || {
                    lock.lock();
                    // Read-modify-write made atomic only by the lock.
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                    lock.unlock().unwrap();
                })
                .unwrap()
        })
        .collect();

    for future in futures {
        assert_eq!(future.get(), Ok(()));
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1000);
}
