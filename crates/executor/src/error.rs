//! Executor error types

use thiserror::Error;

/// Worker pool errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A worker thread could not be spawned
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Timer scheduling errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No tokio runtime was reachable from the calling context
    #[error("no tokio runtime available for timer scheduling")]
    NoRuntime,
}
