//! `ThreadPoolBuilder`: construction-time configuration.
//!
//! Named and shaped after `rayon_core::ThreadPoolBuilder` (referenced
//! from the grounding file's `use` list: `ThreadPoolBuilder`,
//! `StartHandler`, `ExitHandler`, `PanicHandler`). Worker-count
//! resolution follows the original C++ `ThreadPoolSingleton`'s lazy,
//! process-wide construction (spec §6, §9 "Singletons").

use crate::error::{ErrorKind, PoolBuildError};
use crate::pool::ThreadPool;
use std::any::Any;
use std::env;

pub(crate) type StartHandler = dyn Fn(usize) + Send + Sync;
pub(crate) type ExitHandler = dyn Fn(usize) + Send + Sync;
pub(crate) type PanicHandler = dyn Fn(Box<dyn Any + Send>) + Send + Sync;

/// Name of the environment variable that overrides the hardware-reported
/// parallelism at pool construction (spec §6). Zero or unset means "use
/// the hardware default"; a negative value is rejected at construction.
pub const PBB_DEFAULT_WORKERS: &str = "PBB_DEFAULT_WORKERS";

pub struct ThreadPoolBuilder {
    num_threads: Option<usize>,
    thread_name: Option<Box<dyn FnMut(usize) -> String + Send>>,
    start_handler: Option<Box<StartHandler>>,
    exit_handler: Option<Box<ExitHandler>>,
    panic_handler: Option<Box<PanicHandler>>,
}

impl Default for ThreadPoolBuilder {
    fn default() -> Self {
        ThreadPoolBuilder::new()
    }
}

impl ThreadPoolBuilder {
    pub fn new() -> Self {
        ThreadPoolBuilder {
            num_threads: None,
            thread_name: None,
            start_handler: None,
            exit_handler: None,
            panic_handler: None,
        }
    }

    /// Overrides the number of worker threads. Absent a call to this,
    /// `build()` consults `PBB_DEFAULT_WORKERS` and then hardware
    /// parallelism (spec §6).
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn thread_name<F>(mut self, closure: F) -> Self
    where
        F: FnMut(usize) -> String + Send + 'static,
    {
        self.thread_name = Some(Box::new(closure));
        self
    }

    pub fn start_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.start_handler = Some(Box::new(handler));
        self
    }

    pub fn exit_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.exit_handler = Some(Box::new(handler));
        self
    }

    pub fn panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Box<dyn Any + Send>) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Box::new(handler));
        self
    }

    pub(crate) fn thread_name_for(&mut self, index: usize) -> Option<String> {
        self.thread_name.as_mut().map(|f| f(index))
    }

    pub(crate) fn take_start_handler(&mut self) -> Option<Box<StartHandler>> {
        self.start_handler.take()
    }

    pub(crate) fn take_exit_handler(&mut self) -> Option<Box<ExitHandler>> {
        self.exit_handler.take()
    }

    pub(crate) fn take_panic_handler(&mut self) -> Option<Box<PanicHandler>> {
        self.panic_handler.take()
    }

    /// Resolves the worker count: explicit `num_threads()` wins, else
    /// `PBB_DEFAULT_WORKERS` (when set to something other than `0`),
    /// else `num_cpus::get()`.
    pub(crate) fn resolve_num_threads(&self) -> Result<usize, PoolBuildError> {
        if let Some(n) = self.num_threads {
            return Ok(n.max(1));
        }
        match env::var(PBB_DEFAULT_WORKERS) {
            Ok(raw) => match raw.trim().parse::<isize>() {
                Ok(n) if n < 0 => Err(PoolBuildError::new(ErrorKind::NegativeThreadCount)),
                Ok(0) | Err(_) => Ok(num_cpus::get().max(1)),
                Ok(n) => Ok(n as usize),
            },
            Err(_) => Ok(num_cpus::get().max(1)),
        }
    }

    pub fn build(mut self) -> Result<ThreadPool, PoolBuildError> {
        let num_threads = self.resolve_num_threads()?;
        ThreadPool::new(num_threads, &mut self)
    }
}
