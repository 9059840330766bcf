//! A panicking task body or initializer must never take down a worker
//! thread or the pool itself (spec §4.6, §7): the panic is caught at the
//! envelope boundary and turned into a `TaskError`, and the worker loops
//! right back around to pick up its next envelope.

use pbb_core::{CallKey, Cause, TaskError, ThreadPoolBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn worker_survives_a_panicking_body_and_keeps_serving_the_pool() {
    let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    for _ in 0..20 {
        let handle = pool.submit_default(|| -> i32 { panic!("expected") });
        assert!(matches!(handle.get(), Err(TaskError::Failed(_))));
    }
    // The single worker thread is still alive and serving requests.
    let ok = pool.submit_default(|| 7);
    assert_eq!(ok.get().unwrap(), 7);
}

#[test]
fn worker_survives_a_panicking_initializer() {
    let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let key = CallKey::from_ptr(0x5 as *const ());
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts2 = Arc::clone(&attempts);
    pool.register_initialize(key, move || {
        attempts2.fetch_add(1, Ordering::SeqCst);
        panic!("init exploded");
        #[allow(unreachable_code)]
        Ok(())
    });

    let handle = pool.submit(|| Ok::<(), Cause>(()), Some(key));
    assert!(matches!(handle.get(), Err(TaskError::InitFailed(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    pool.remove_initialize(key);
    let ok = pool.submit_default(|| 1);
    assert_eq!(ok.get().unwrap(), 1);
}
