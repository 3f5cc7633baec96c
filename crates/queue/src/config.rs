//! Flush queue configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Size threshold values below this disable the size trigger
pub(crate) const MIN_SIZE_TRIGGER: usize = 2;

/// Time threshold values below this disable the time trigger
pub(crate) const MIN_TIME_TRIGGER: Duration = Duration::from_millis(1);

/// Configuration for a [`FlushQueue`](crate::FlushQueue)
///
/// Either trigger may be disabled: `size_threshold < 2` disables the size
/// trigger and `time_threshold < 1ms` disables the time trigger. With both
/// disabled the queue runs in bypass mode and dispatches every item
/// individually without buffering.
///
/// # Example
///
/// ```toml
/// [queue]
/// name = "traces"
/// size_threshold = 128
/// time_threshold = "5s"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name, used in log fields and the stats surface
    pub name: String,

    /// Buffered item count that triggers a flush
    pub size_threshold: usize,

    /// Elapsed time since the last flush attempt that triggers a flush
    #[serde(with = "humantime_serde")]
    pub time_threshold: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "telemetry".to_string(),
            size_threshold: 100,
            time_threshold: Duration::from_secs(15),
        }
    }
}

impl QueueConfig {
    /// Create a config with the given name and defaults elsewhere
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the size threshold
    pub fn with_size_threshold(mut self, threshold: usize) -> Self {
        self.size_threshold = threshold;
        self
    }

    /// Set the time threshold
    pub fn with_time_threshold(mut self, threshold: Duration) -> Self {
        self.time_threshold = threshold;
        self
    }

    /// Whether this configuration disables buffering entirely
    pub fn is_bypass(&self) -> bool {
        self.size_threshold < MIN_SIZE_TRIGGER && self.time_threshold < MIN_TIME_TRIGGER
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }
}
