//! Parallel building blocks: a bounded work queue, a worker pool (default
//! and init-aware submission disciplines) and a `parallel_for` dispatcher
//! for CPU-bound work, split the way `rayon`/`rayon-core` are split: this
//! crate is the thin, end-user-facing surface; [`pbb_core`] is the engine.

mod parallel_for;

pub use pbb_core::{
    pool_default, task_failure, CallKey, Cause, ErrorKind, ParallelForError, PoolBuildError,
    ResultHandle, TaskError, ThreadPool, ThreadPoolBuilder, PBB_DEFAULT_WORKERS,
};
pub use parallel_for::{parallel_for, ParallelFunctor};
