//! `parallel_for`: splits a `[begin, end)` range across the default pool,
//! running a user functor over each chunk on a per-worker local
//! accumulator and reducing those accumulators once every chunk has
//! completed without error.
//!
//! Grounded on `PBB::Tools::ParallelFor` (`ParallelFor.hpp`): derive a
//! call key from the functor's address, register its `Initialize` (if it
//! has meaningful per-worker setup) under that key, submit one chunk per
//! piece of the range, wait for every chunk without short-circuiting on
//! the first failure, and call `Reduce` only if nothing failed. C++ uses
//! `if constexpr (has_initialize_v<Functor>)` / `has_reduce_v<Functor>`
//! to make `Initialize`/`Reduce` optional; Rust has no direct equivalent
//! of that SFINAE-style detection, so [`ParallelFunctor`] gives both
//! methods default no-op bodies instead -- a functor opts in simply by
//! overriding the one(s) it needs, same as `Iterator::size_hint` or any
//! other default-method trait in the ecosystem.

use pbb_core::{pool_default, CallKey, Cause, ParallelForError, TaskError};
use std::cell::RefCell;
use std::sync::Arc;

/// A unit of work dispatched by [`parallel_for`]. `Local` is the
/// per-worker accumulator: each worker thread that ever touches this
/// functor gets exactly one, default-constructed and then passed through
/// `initialize` before its first chunk (spec §4.7, §4.3).
pub trait ParallelFunctor: Send + Sync {
    type Local: Default + Send + 'static;

    /// Runs the body over `[begin, end)` of the original range, folding
    /// into `local`.
    fn call(&self, local: &mut Self::Local, begin: usize, end: usize);

    /// Runs at most once per worker thread, before that worker's first
    /// `call`. Default: no setup.
    fn initialize(&self, _local: &mut Self::Local) {}

    /// Runs once, after every chunk has completed with no error, folding
    /// every worker's `Local` into this functor. Skipped entirely if the
    /// range was empty (no chunks, no workers touched) or if any chunk
    /// failed. Default: no reduction.
    fn reduce(&self, _locals: Vec<Self::Local>) {}
}

/// Splits `[begin, end)` into at most `max_chunks` pieces (or one per
/// pool worker, if `None`) and runs `functor` over each on the process
/// default pool. Ordering between chunks is unspecified; aggregation of
/// chunk failures preserves submission order (spec §4.7, §8).
pub fn parallel_for<F>(
    begin: usize,
    end: usize,
    functor: F,
    max_chunks: Option<usize>,
) -> Result<(), ParallelForError>
where
    F: ParallelFunctor + 'static,
{
    let functor = Arc::new(functor);
    let pool = pool_default();
    let registry: Arc<pbb_core::ThreadLocalRegistry<RefCell<F::Local>>> =
        Arc::new(pbb_core::ThreadLocalRegistry::new());
    let call_key = CallKey::from_ref(&*functor);

    let init_functor = Arc::clone(&functor);
    let init_registry = Arc::clone(&registry);
    pool.register_initialize(call_key, move || {
        let cell = init_registry.local();
        init_functor.initialize(&mut cell.borrow_mut());
        Ok::<(), Cause>(())
    });

    let total = end.saturating_sub(begin);
    let num_workers = pool.num_threads().max(1);
    let num_chunks = max_chunks.map(|m| m.max(1).min(num_workers)).unwrap_or(num_workers);
    let chunk_len = if total == 0 {
        0
    } else {
        (total + num_chunks - 1) / num_chunks
    };

    let mut handles = Vec::new();
    let mut chunk_begin = begin;
    while chunk_begin < end {
        let chunk_end = (chunk_begin + chunk_len).min(end);
        let functor = Arc::clone(&functor);
        let registry = Arc::clone(&registry);
        let handle = pool.submit::<_, ()>(
            move || {
                let cell = registry.local();
                functor.call(&mut cell.borrow_mut(), chunk_begin, chunk_end);
                Ok(())
            },
            Some(call_key),
        );
        handles.push(handle);
        chunk_begin = chunk_end;
    }

    let mut errors: Vec<TaskError> = Vec::new();
    for handle in handles {
        if let Err(err) = handle.get() {
            errors.push(err);
        }
    }

    pool.remove_initialize(call_key);

    if !errors.is_empty() {
        return Err(ParallelForError::new(errors));
    }

    if total > 0 {
        let locals: Vec<F::Local> = registry
            .registry()
            .drain(..)
            .map(|boxed| (*boxed).into_inner().into_inner())
            .collect();
        functor.reduce(locals);
    }

    Ok(())
}

#[allow(dead_code)]
fn assert_error_is_send_sync(_: &Cause) {}
