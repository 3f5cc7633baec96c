//! Worker pool configuration

use serde::{Deserialize, Serialize};

/// Default backlog capacity before submissions are rejected
const DEFAULT_BACKLOG_CAPACITY: usize = 256;

/// Cap on the default worker count
const MAX_DEFAULT_WORKERS: usize = 8;

/// Configuration for a [`WorkerPool`](crate::WorkerPool)
///
/// # Example
///
/// ```toml
/// [pool]
/// name = "flush"
/// workers = 4
/// backlog_capacity = 512
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool name, used for worker thread names and log fields
    pub name: String,

    /// Number of worker threads; values below 1 are clamped to 1
    pub workers: usize,

    /// Maximum queued tasks before the rejection policy fires
    pub backlog_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "spool-pool".to_string(),
            workers: default_workers(),
            backlog_capacity: DEFAULT_BACKLOG_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Create a config with the given name and defaults elsewhere
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the backlog capacity
    pub fn with_backlog_capacity(mut self, capacity: usize) -> Self {
        self.backlog_capacity = capacity.max(1);
        self
    }
}

/// Default worker count: available parallelism, capped
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .min(MAX_DEFAULT_WORKERS)
}
