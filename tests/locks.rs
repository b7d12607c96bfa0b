use promissum::Error;
use promissum::sync::Mutex;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_mutual_exclusion() {
    let lock = Arc::new(Mutex::new());
    let counter = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lock = lock.clone();
            let counter = counter.clone();

            thread::spawn(move || {
                for _ in 0..500 {
                    lock.lock();
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                    lock.unlock().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 8 * 500);
}

#[test]
fn test_unlock_by_non_owner_is_an_error() {
    let lock = Arc::new(Mutex::new());

    lock.lock();

    let outsider = lock.clone();
    let result = thread::spawn(move || outsider.unlock())
        .join()
        .unwrap();

    assert!(matches!(result, Err(Error::IllegalState(_))));

    lock.unlock().unwrap();
}

#[test]
fn test_unlock_without_lock_is_an_error() {
    let lock = Mutex::new();

    assert!(matches!(lock.unlock(), Err(Error::IllegalState(_))));
}

#[test]
fn test_try_lock_times_out_while_held() {
    let lock = Arc::new(Mutex::new());
    lock.lock();

    let contender = lock.clone();
    let acquired = thread::spawn(move || contender.try_lock(Duration::from_millis(50)))
        .join()
        .unwrap();

    assert!(!acquired);

    lock.unlock().unwrap();
}

#[test]
fn test_try_lock_succeeds_once_released() {
    let lock = Arc::new(Mutex::new());
    lock.lock();

    let contender = lock.clone();
    let handle = thread::spawn(move || {
        let acquired = contender.try_lock(Duration::from_millis(500));
        if acquired {
            contender.unlock().unwrap();
        }
        acquired
    });

    thread::sleep(Duration::from_millis(30));
    lock.unlock().unwrap();

    assert!(handle.join().unwrap());
}

#[test]
fn test_reentrant_lock_counts_holds() {
    let lock = Arc::new(Mutex::reentrant());

    lock.lock();
    lock.lock();
    lock.unlock().unwrap();

    // Still held by this thread until the count reaches zero.
    let contender = lock.clone();
    let acquired = thread::spawn(move || contender.try_lock(Duration::from_millis(40)))
        .join()
        .unwrap();
    assert!(!acquired);

    lock.unlock().unwrap();

    let contender = lock.clone();
    let acquired = thread::spawn(move || {
        let acquired = contender.try_lock(Duration::from_millis(500));
        if acquired {
            contender.unlock().unwrap();
        }
        acquired
    })
    .join()
    .unwrap();
    assert!(acquired);
}

#[test]
fn test_opposite_order_acquisition_deadlocks() {
    let a = Arc::new(Mutex::new());
    let b = Arc::new(Mutex::new());

    let first_done = Arc::new(AtomicBool::new(false));
    let second_done = Arc::new(AtomicBool::new(false));

    {
        let a = a.clone();
        let b = b.clone();
        let done = first_done.clone();
        thread::spawn(move || {
            a.lock();
            thread::sleep(Duration::from_millis(100));
            b.lock();
            done.store(true, Ordering::SeqCst);
        });
    }

    {
        let a = a.clone();
        let b = b.clone();
        let done = second_done.clone();
        thread::spawn(move || {
            b.lock();
            thread::sleep(Duration::from_millis(100));
            a.lock();
            done.store(true, Ordering::SeqCst);
        });
    }

    // The primitive must not break the deadlock: both threads stay blocked.
    // The threads are leaked deliberately.
    thread::sleep(Duration::from_millis(500));
    assert!(!first_done.load(Ordering::SeqCst));
    assert!(!second_done.load(Ordering::SeqCst));
}
