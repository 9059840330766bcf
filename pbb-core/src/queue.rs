//! `BoundedFIFO`: a mutex-protected, multi-reader/multi-writer FIFO of
//! task envelopes with blocking and non-blocking pop, invalidation and
//! predictable shutdown.
//!
//! Grounded on the original C++ `PBB::MRMWQueue<T>` (`MRMWQueue.hpp`):
//! a `std::queue<T>` behind a `std::mutex` and `std::condition_variable`,
//! with an `std::atomic<bool> m_valid` flag checked both before waiting
//! and inside the wait predicate. The Rust version keeps the same shape
//! (`Mutex<VecDeque<E>>` + `Condvar` + `AtomicBool`) rather than reaching
//! for `crossbeam-channel`, since the spec's `Invalidate` is a distinct
//! operation from dropping producers/consumers and needs its own flag.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// Unbounded (per spec §3) FIFO of envelopes, safe for any number of
/// concurrent producers and consumers.
pub struct BoundedFifo<E> {
    queue: Mutex<VecDeque<E>>,
    condition: Condvar,
    valid: AtomicBool,
}

impl<E> Default for BoundedFifo<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> BoundedFifo<E> {
    pub fn new() -> Self {
        BoundedFifo {
            queue: Mutex::new(VecDeque::new()),
            condition: Condvar::new(),
            valid: AtomicBool::new(true),
        }
    }

    /// Pushes `e`. Returns `e` back in `Err` without enqueuing iff the
    /// queue had already been invalidated at the time of the call, so the
    /// caller can still route a terminal state to whatever the rejected
    /// element owns (e.g. a `TaskEnvelope`'s handle) instead of silently
    /// dropping it.
    pub fn push(&self, e: E) -> Result<(), E> {
        if !self.valid.load(Ordering::Acquire) {
            return Err(e);
        }
        let mut queue = self.queue.lock().unwrap();
        // Re-check under the lock: a concurrent `invalidate()` may have
        // flipped the flag between our optimistic load above and here.
        if !self.valid.load(Ordering::Acquire) {
            return Err(e);
        }
        queue.push_back(e);
        self.condition.notify_one();
        Ok(())
    }

    /// Non-blocking pop. Returns `None` if the queue is currently empty,
    /// regardless of validity.
    pub fn try_pop(&self) -> Option<E> {
        let mut queue = self.queue.lock().unwrap();
        queue.pop_front()
    }

    /// Blocks until an element is available or the queue is invalidated.
    /// Returns `None` on invalidation (spurious wakes are absorbed by the
    /// wait predicate, matching the C++ `m_condition.wait(lock, pred)`).
    pub fn pop(&self) -> Option<E> {
        if !self.valid.load(Ordering::Acquire) {
            return None;
        }
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(e) = queue.pop_front() {
                return Some(e);
            }
            if !self.valid.load(Ordering::Acquire) {
                return None;
            }
            queue = self.condition.wait(queue).unwrap();
        }
    }

    /// Drops every queued element, in FIFO order.
    pub fn clear(&self) {
        let mut queue = self.queue.lock().unwrap();
        queue.clear();
        self.condition.notify_all();
    }

    /// Sets `valid = false` and wakes every blocked `pop`. Idempotent:
    /// a second call is a no-op (the spec requires `true -> false` at
    /// most once, which this naturally satisfies since the flag only
    /// ever moves in one direction).
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
        let _queue = self.queue.lock().unwrap();
        self.condition.notify_all();
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Drains and returns every remaining element, in FIFO order. Used
    /// by pool teardown to fail out any envelopes left after workers
    /// have joined (spec §4.4 step 4).
    pub fn drain(&self) -> Vec<E> {
        let mut queue = self.queue.lock().unwrap();
        queue.drain(..).collect()
    }
}
