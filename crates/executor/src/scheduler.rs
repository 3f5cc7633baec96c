//! One-shot timer scheduling
//!
//! The [`Scheduler`] trait is the injection seam for timer callbacks: the
//! flush queue only ever asks for "run this once after `delay`" and a handle
//! it can cancel. [`TokioScheduler`] is the stock implementation, backed by
//! a runtime handle and a cancellation token.
//!
//! Cancellation is explicit: dropping a [`TimerHandle`] does not cancel the
//! timer it refers to.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;

/// Callback fired when a timer elapses
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer source
pub trait Scheduler: Send + Sync {
    /// Arm a timer that runs `task` once after `delay`, unless cancelled
    fn schedule_once(&self, delay: Duration, task: TimerTask)
    -> Result<TimerHandle, SchedulerError>;
}

/// Cancel handle for an armed timer
///
/// Cancelling after the timer fired is a no-op.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Wrap a cancellation token controlling an armed timer
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Cancel the timer if it has not fired yet
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// [`Scheduler`] backed by a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Create a scheduler on the given runtime handle
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler on the runtime of the calling context
    pub fn from_current() -> Result<Self, SchedulerError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|_| SchedulerError::NoRuntime)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(
        &self,
        delay: Duration,
        task: TimerTask,
    ) -> Result<TimerHandle, SchedulerError> {
        let token = CancellationToken::new();
        let armed = token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = armed.cancelled() => {}
                _ = tokio::time::sleep(delay) => task(),
            }
        });
        Ok(TimerHandle::new(token))
    }
}
