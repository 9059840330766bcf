//! Core engine for `pbb`: a bounded work queue, a worker pool supporting
//! the default and init-aware submission disciplines, and the building
//! blocks `parallel_for` is layered on in the `pbb` crate.
//!
//! Split from the public `pbb` crate the way `rayon-core` is split from
//! `rayon`: this crate owns the engine, `pbb` owns the end-user-facing
//! `parallel_for` API built on top of it.

mod builder;
mod cache_aligned;
mod envelope;
mod error;
mod global;
mod pool;
mod queue;
mod result;
mod thread_local_registry;
mod unwind;

pub use builder::{ThreadPoolBuilder, PBB_DEFAULT_WORKERS};
pub use cache_aligned::CacheAlignedCell;
pub use envelope::CallKey;
pub use error::{Cause, ErrorKind, ParallelForError, PoolBuildError, TaskError};
pub use global::pool_default;
pub use pool::ThreadPool;
pub use result::{task_failure, ResultHandle};
pub use thread_local_registry::ThreadLocalRegistry;
