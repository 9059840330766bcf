//! `ResultHandle<T>`: a one-shot producer/consumer cell carrying a value,
//! an error, or nothing (if dropped before the producer ever wrote).
//!
//! Grounded on `PBB::Thread::TaskFuture<T>` (`ThreadPoolCommon.hpp`): a
//! wrapper around `std::future<T>` whose destructor blocks on `get()`
//! unless `Detach()` was called first. The weak-producer-reference trick
//! described in spec §4.2/§9 (so a detached, dropped handle turns a
//! still-queued body's terminal write into a no-op instead of a
//! use-after-free) has no `std::future` analogue in the C++ source --
//! `shared_ptr`/`weak_ptr` there play the same role `Arc`/`Weak` play
//! here.

use crate::error::{Cause, TaskError};
use std::sync::{Arc, Condvar, Mutex, Weak};

enum State<T> {
    Pending,
    Value(T),
    Error(TaskError),
    /// `get()` already consumed the terminal state once.
    Consumed,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
}

/// One-shot consumer handle. Drop policy defaults to *wait*: dropping an
/// un-detached handle blocks until the producer has written a terminal
/// state (or the pool abandons the envelope). Call [`detach`](Self::detach)
/// to switch to *fire-and-forget*.
pub struct ResultHandle<T> {
    inner: Arc<Inner<T>>,
    detached: bool,
}

/// The producer side of the pair, held (weakly) by the envelope's body
/// closure. See the module doc for why this is a `Weak`, not an `Arc`.
pub(crate) struct Producer<T> {
    inner: Weak<Inner<T>>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Producer {
            inner: Weak::clone(&self.inner),
        }
    }
}

pub(crate) fn new_pair<T>() -> (ResultHandle<T>, Producer<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State::Pending),
        condvar: Condvar::new(),
    });
    let producer = Producer {
        inner: Arc::downgrade(&inner),
    };
    let handle = ResultHandle {
        inner,
        detached: false,
    };
    (handle, producer)
}

impl<T> Producer<T> {
    /// Writes the value terminal, if the handle is still alive.
    pub(crate) fn set_value(&self, value: T) {
        self.set(State::Value(value));
    }

    /// Writes the error terminal, if the handle is still alive.
    pub(crate) fn set_error(&self, cause: TaskError) {
        self.set(State::Error(cause));
    }

    fn set(&self, terminal: State<T>) {
        let Some(inner) = self.inner.upgrade() else {
            // Handle was detached and dropped before we got here: the
            // write becomes a no-op rather than touching freed memory.
            return;
        };
        let mut state = inner.state.lock().unwrap();
        assert!(
            matches!(*state, State::Pending),
            "ResultHandle terminal state set twice"
        );
        *state = terminal;
        drop(state);
        inner.condvar.notify_all();
    }
}

impl<T> ResultHandle<T> {
    /// Blocks until the producer has written a terminal state and
    /// returns it, re-raising a stored error. Calling `get()` again
    /// after it has already returned once is a programming error.
    pub fn get(&self) -> Result<T, TaskError> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            match &*state {
                State::Pending => {
                    state = self.inner.condvar.wait(state).unwrap();
                }
                _ => break,
            }
        }
        match std::mem::replace(&mut *state, State::Consumed) {
            State::Value(v) => Ok(v),
            State::Error(e) => Err(e),
            State::Consumed => panic!("ResultHandle::get called after the value was consumed"),
            State::Pending => unreachable!(),
        }
    }

    /// Returns `true` if the producer has written a terminal state (or
    /// it was already consumed by `get()`), without blocking.
    pub fn is_ready(&self) -> bool {
        !matches!(*self.inner.state.lock().unwrap(), State::Pending)
    }

    /// Switches the destructor policy from *wait* to *fire-and-forget*:
    /// a subsequent drop of this handle will not block, and any terminal
    /// state that does eventually arrive is discarded.
    pub fn detach(&mut self) {
        self.detached = true;
    }
}

impl<T> Drop for ResultHandle<T> {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        while matches!(*state, State::Pending) {
            state = self.inner.condvar.wait(state).unwrap();
        }
    }
}

/// Convenience for constructing a [`TaskError::Failed`] from a plain
/// message, used by callables that want to report a typed failure
/// without panicking.
pub fn task_failure(msg: impl Into<String>) -> TaskError {
    TaskError::Failed(Cause::from_message(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn value_round_trips() {
        let (handle, producer) = new_pair::<i32>();
        producer.set_value(42);
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn error_round_trips() {
        let (handle, producer) = new_pair::<i32>();
        producer.set_error(task_failure("boom"));
        let err = handle.get().unwrap_err();
        assert_eq!(err.to_string(), "task failed: boom");
    }

    #[test]
    #[should_panic(expected = "set twice")]
    fn double_set_is_a_programming_error() {
        let (_handle, producer) = new_pair::<i32>();
        producer.set_value(1);
        producer.set_value(2);
    }

    #[test]
    fn detach_then_drop_does_not_block() {
        let (mut handle, producer) = new_pair::<i32>();
        handle.detach();
        let start = std::time::Instant::now();
        drop(handle);
        assert!(start.elapsed() < Duration::from_millis(50));
        // Producer write after the handle is gone is a safe no-op.
        producer.set_value(7);
    }

    #[test]
    fn undetached_drop_blocks_until_terminal() {
        let (handle, producer) = new_pair::<i32>();
        let producer = StdArc::new(producer);
        let p2 = StdArc::clone(&producer);
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            p2.set_value(9);
        });
        drop(handle); // should block ~30ms, not return immediately
        writer.join().unwrap();
    }

    #[test]
    fn weak_producer_write_after_detached_drop_is_a_noop_not_uaf() {
        let (mut handle, producer) = new_pair::<i32>();
        handle.detach();
        drop(handle);
        // This must not crash even though nobody will ever read it.
        producer.set_value(1);
        producer.set_error(task_failure("ignored"));
    }
}
