//! The process-wide default pool (spec §6's "cross-invocation state").
//!
//! Grounded on `PBB::ThreadPoolSingleton` (`MeyersSingleton.hpp`): a
//! function-local static, lazily constructed on first use and never torn
//! down before the process exits. `std::sync::OnceLock` is the direct
//! Rust analogue of that Meyers-singleton idiom; `rayon_core::registry`'s
//! own `static mut THE_REGISTRY` + `Once` predates `OnceLock`'s
//! stabilization and does the same job by hand.

use crate::builder::ThreadPoolBuilder;
use crate::pool::ThreadPool;
use std::sync::OnceLock;

static DEFAULT_POOL: OnceLock<ThreadPool> = OnceLock::new();

/// Returns the process-wide default pool, constructing it on first call
/// with `ThreadPoolBuilder::default()` (hardware parallelism, or
/// `PBB_DEFAULT_WORKERS` if set). The worker count is fixed at that
/// first call for the remaining lifetime of the process: subsequent
/// changes to the environment variable have no effect (spec §6).
pub fn pool_default() -> &'static ThreadPool {
    DEFAULT_POOL.get_or_init(|| {
        ThreadPoolBuilder::new()
            .build()
            .expect("default pbb thread pool failed to construct")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_is_shared_across_calls() {
        let a = pool_default() as *const ThreadPool;
        let b = pool_default() as *const ThreadPool;
        assert_eq!(a, b);
    }

    #[test]
    fn default_pool_runs_work() {
        let handle = pool_default().submit_default(|| 1 + 1);
        assert_eq!(handle.get().unwrap(), 2);
    }
}
