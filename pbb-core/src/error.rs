//! Error types produced by the pool, the queue and `parallel_for`.
//!
//! Modeled on the hand-written `ErrorKind` / `ThreadPoolBuildError` pair
//! `rayon-core` carries instead of pulling in an error-derive crate.

use std::any::Any;
use std::error::Error;
use std::fmt;

/// Opaque cause of a failed task body or a failed initializer.
///
/// Wraps whatever was caught by `catch_unwind` (a panic payload) or
/// returned as an `Err` by a fallible body; either way the pool has no
/// useful way to downcast it beyond the string message, so we keep the
/// raw payload around for a caller who does know the concrete type, and
/// offer a best-effort `Display`.
pub struct Cause(Box<dyn Any + Send + 'static>);

impl Cause {
    pub fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        Cause(payload)
    }

    pub fn from_message(msg: impl Into<String>) -> Self {
        Cause(Box::new(msg.into()))
    }

    /// Best-effort extraction of a human-readable message, the way one
    /// would inspect a caught `Box<dyn Any>` panic payload: `&str` and
    /// `String` are checked explicitly, anything else renders generically.
    pub fn message(&self) -> String {
        if let Some(s) = self.0.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = self.0.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        }
    }

    pub fn into_payload(self) -> Box<dyn Any + Send + 'static> {
        self.0
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cause").field(&self.message()).finish()
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// The terminal error state of a [`crate::ResultHandle`], per spec §7.
#[derive(Debug)]
pub enum TaskError {
    /// The task body itself panicked or returned an error (`TaskFailure`).
    Failed(Cause),
    /// A registered initializer failed before the body could run
    /// (`InitFailure`); the body was never invoked.
    InitFailed(Cause),
    /// The pool was torn down while this envelope was pending or in
    /// flight (`PoolShutDown`).
    PoolShutDown,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Failed(cause) => write!(f, "task failed: {}", cause),
            TaskError::InitFailed(cause) => write!(f, "initializer failed: {}", cause),
            TaskError::PoolShutDown => write!(f, "pool shut down before task ran"),
        }
    }
}

impl Error for TaskError {}

/// Reason a [`crate::ThreadPoolBuilder::build`] call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// `PBB_DEFAULT_WORKERS`, or an explicit `num_threads`, was negative.
    NegativeThreadCount,
    /// The configured spawn handler returned an I/O error for some thread.
    IoError,
}

#[derive(Debug)]
pub struct PoolBuildError {
    kind: ErrorKind,
    detail: Option<std::io::Error>,
}

impl PoolBuildError {
    pub fn new(kind: ErrorKind) -> Self {
        PoolBuildError { kind, detail: None }
    }

    pub fn from_io(err: std::io::Error) -> Self {
        PoolBuildError {
            kind: ErrorKind::IoError,
            detail: Some(err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for PoolBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::NegativeThreadCount => {
                write!(f, "requested a negative number of worker threads")
            }
            ErrorKind::IoError => match &self.detail {
                Some(err) => write!(f, "failed to spawn worker thread: {}", err),
                None => write!(f, "failed to spawn worker thread"),
            },
        }
    }
}

impl Error for PoolBuildError {}

/// Aggregated failure surfaced by `parallel_for` when one or more chunks
/// failed. Aggregation order matches chunk submission order (spec §4.7).
#[derive(Debug)]
pub struct ParallelForError {
    errors: Vec<TaskError>,
}

impl ParallelForError {
    /// Builds an aggregate from the chunk failures collected by
    /// `parallel_for`. Panics if `errors` is empty -- callers should
    /// return `Ok(())` instead when nothing failed.
    pub fn new(errors: Vec<TaskError>) -> Self {
        assert!(!errors.is_empty(), "ParallelForError::new called with no errors");
        ParallelForError { errors }
    }

    pub fn errors(&self) -> &[TaskError] {
        &self.errors
    }
}

impl fmt::Display for ParallelForError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "parallel_for: {} chunk(s) failed", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            writeln!(f, "  [{}] {}", i, e)?;
        }
        Ok(())
    }
}

impl Error for ParallelForError {}
