//! Flush queue error types

use thiserror::Error;

use spool_executor::{ExecutorError, SchedulerError};

/// Why an item was not accepted into the queue
///
/// Every variant returns the rejected item to the caller and has already
/// been counted against the queue's drop counter when it is produced by a
/// queue operation.
#[derive(Error)]
pub enum EnqueueError<T> {
    /// The buffer is at capacity
    #[error("queue buffer is full")]
    Full(T),

    /// The bounded wait for buffer space elapsed
    #[error("timed out waiting for buffer space")]
    TimedOut(T),

    /// The queue has been closed
    #[error("queue is closed")]
    Closed(T),
}

impl<T> EnqueueError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::TimedOut(item) | Self::Closed(item) => item,
        }
    }

    /// Whether the rejection was due to a closed queue
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

// Manual impl so the error stays usable for item types without Debug
impl<T> std::fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Self::Full(_) => "Full",
            Self::TimedOut(_) => "TimedOut",
            Self::Closed(_) => "Closed",
        };
        f.debug_tuple(variant).finish()
    }
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The queue name is empty
    #[error("queue name must not be empty")]
    EmptyName,
}

/// Errors constructing a flush queue
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The default scheduler could not be created
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The default worker pool could not be created
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
