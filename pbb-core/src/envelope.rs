//! `TaskEnvelope`: the queued unit of work, grounded on
//! `PBB::Thread::{IThreadTask, ThreadTask<Func>, InitAwareTask<Func, Promise>}`
//! (`ThreadPoolCommon.hpp`). The C++ side uses virtual dispatch
//! (`IThreadTask::Execute` / `OnInitializeFailure`); the Rust rendition
//! type-erases the same two operations as boxed closures plus a third,
//! `on_abandon`, for the one path the C++ class hierarchy does not model
//! explicitly: a queued task dropped unexecuted at pool teardown still
//! needs its `ResultHandle` to observe `PoolShutDown` rather than hang.

use crate::error::{Cause, TaskError};
use crate::result::{self, Producer, ResultHandle};
use crate::unwind;

/// Opaque token grouping envelopes that share a per-worker initializer
/// (spec §3, §6's "call-key contract"). Callers commonly derive it from
/// the address of their functor, mirroring the original C++
/// `static_cast<void*>(&func)` (`ParallelFor.hpp`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CallKey(usize);

impl CallKey {
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        CallKey(ptr as usize)
    }

    pub fn from_ref<T>(value: &T) -> Self {
        Self::from_ptr(value as *const T)
    }
}

type RunBody = Box<dyn FnOnce() + Send>;
type InitFailureHook = Box<dyn FnOnce(Cause) + Send>;
type AbandonHook = Box<dyn FnOnce() + Send>;

pub struct TaskEnvelope {
    call_key: Option<CallKey>,
    run: RunBody,
    on_init_failure: InitFailureHook,
    on_abandon: AbandonHook,
}

impl TaskEnvelope {
    pub fn call_key(&self) -> Option<CallKey> {
        self.call_key
    }

    /// Runs the body. Consumes the envelope: after this call returns,
    /// neither `fail_init` nor `abandon` may be called on it.
    pub(crate) fn run(self) {
        (self.run)();
    }

    /// Invoked instead of `run` when this envelope's group initializer
    /// failed on the worker currently processing it (spec §4.5 step 2).
    pub(crate) fn fail_init(self, cause: Cause) {
        (self.on_init_failure)(cause);
    }

    /// Invoked for envelopes still sitting in the queue when the pool is
    /// torn down (spec §4.4 step 4): never reached a worker, so `run`
    /// and `fail_init` are both skipped, but the handle still needs a
    /// terminal state.
    pub(crate) fn abandon(self) {
        (self.on_abandon)();
    }
}

/// Builds an envelope (and its handle) for the default discipline: `f`
/// is declared not to fail; if it panics anyway, that is surfaced as a
/// `TaskFailure` (spec §4.4).
pub fn default_envelope<F, T>(f: F) -> (TaskEnvelope, ResultHandle<T>)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (handle, producer) = result::new_pair();
    let run_producer = producer.clone();
    let run: RunBody = Box::new(move || match unwind::halt_unwinding(f) {
        Ok(value) => run_producer.set_value(value),
        Err(payload) => run_producer.set_error(TaskError::Failed(Cause::new(payload))),
    });
    let on_init_failure: InitFailureHook = Box::new(|_cause| {
        // Default discipline has no initializer; this hook is never
        // actually invoked by the worker loop, but every envelope
        // carries one so the queue's element type stays uniform.
    });
    let abandon_producer = producer;
    let on_abandon: AbandonHook = Box::new(move || abandon_producer.set_error(TaskError::PoolShutDown));

    (
        TaskEnvelope {
            call_key: None,
            run,
            on_init_failure,
            on_abandon,
        },
        handle,
    )
}

/// Builds an envelope (and its handle) for the init-aware discipline:
/// `f` itself decides success/failure by returning a `Result`, and
/// `call_key` groups this envelope with others sharing a per-worker
/// initializer (spec §4.5).
pub fn init_aware_envelope<F, T>(f: F, call_key: Option<CallKey>) -> (TaskEnvelope, ResultHandle<T>)
where
    F: FnOnce() -> Result<T, Cause> + Send + 'static,
    T: Send + 'static,
{
    let (handle, producer) = result::new_pair();
    let run_producer = producer.clone();
    let run: RunBody = Box::new(move || match unwind::halt_unwinding(f) {
        Ok(Ok(value)) => run_producer.set_value(value),
        Ok(Err(cause)) => run_producer.set_error(TaskError::Failed(cause)),
        Err(payload) => run_producer.set_error(TaskError::Failed(Cause::new(payload))),
    });
    let init_producer = producer.clone();
    let on_init_failure: InitFailureHook =
        Box::new(move |cause| init_producer.set_error(TaskError::InitFailed(cause)));
    let abandon_producer = producer;
    let on_abandon: AbandonHook = Box::new(move || abandon_producer.set_error(TaskError::PoolShutDown));

    (
        TaskEnvelope {
            call_key,
            run,
            on_init_failure,
            on_abandon,
        },
        handle,
    )
}

#[allow(dead_code)]
fn assert_producer_is_send<T: Send>(_: &Producer<T>) {}
