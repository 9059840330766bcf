//! `ThreadLocalRegistry` exercised through a real pool's worker threads,
//! as `parallel_for` in the `pbb` crate uses it, rather than through
//! threads spawned directly (covered already in the in-module tests).

use pbb_core::{Cause, ThreadLocalRegistry, ThreadPoolBuilder};
use std::cell::Cell;
use std::sync::Arc;

#[test]
fn each_pool_worker_gets_its_own_slot() {
    let pool = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let registry: Arc<ThreadLocalRegistry<Cell<usize>>> = Arc::new(ThreadLocalRegistry::new());

    let n = pool.num_threads() * 6;
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let registry = Arc::clone(&registry);
            pool.submit(
                move || {
                    let cell = registry.local();
                    cell.set(cell.get() + i);
                    Ok::<(), Cause>(())
                },
                None,
            )
        })
        .collect();
    for h in handles {
        h.get().unwrap();
    }

    assert!(registry.len() >= 1);
    assert!(registry.len() <= pool.num_threads());
    let total: usize = registry.registry().iter().map(|cell| cell.get()).sum();
    assert_eq!(total, (0..n).sum());
}
