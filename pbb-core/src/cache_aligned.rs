//! `CacheAlignedCell<T>`: placement storage for one `T`, padded and
//! aligned to a 64-byte cache line so that two cells never share a line.
//!
//! Grounded on `crossbeam_utils::CachePadded`, which the teacher pulls in
//! as `crossbeam-utils` (already a `rayon-core` dependency) precisely to
//! avoid false sharing between per-worker data, the same problem
//! `ThreadLocalRegistry` needs solved for its per-worker accumulators.
//! We wrap it instead of re-exporting it directly so the public name and
//! doc match the spec's vocabulary, and so accesses go through `&`/`&mut`
//! on the inner value rather than requiring callers to know about the
//! `crossbeam_utils` type.

use crossbeam_utils::CachePadded;
use std::ops::{Deref, DerefMut};

#[repr(transparent)]
pub struct CacheAlignedCell<T>(CachePadded<T>);

impl<T> CacheAlignedCell<T> {
    pub fn new(value: T) -> Self {
        CacheAlignedCell(CachePadded::new(value))
    }

    pub fn into_inner(self) -> T {
        CachePadded::into_inner(self.0)
    }
}

impl<T> Deref for CacheAlignedCell<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CacheAlignedCell<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Default> Default for CacheAlignedCell<T> {
    fn default() -> Self {
        CacheAlignedCell::new(T::default())
    }
}
