//! Flush queue counters and snapshot
//!
//! The live counters are mutated only by the flush execution path; anything
//! may read them. Queue-state gauges (buffered item count, flush lock state)
//! are owned by the queue itself and folded into the snapshot at read time.

use std::time::Duration;

use crate::{Counter, Gauge};

/// Live counters for a flush queue
///
/// All counters are process-lifetime and monotonic unless [`reset`] is
/// called. `last_flush_millis` is a gauge holding the wall duration of the
/// most recent delivery, successful or not.
///
/// [`reset`]: QueueCounters::reset
#[derive(Debug, Default)]
pub struct QueueCounters {
    /// Completed delivery attempts (success or receiver error)
    flushes: Counter,

    /// Deliveries where the receiver returned an error or panicked
    flush_errors: Counter,

    /// Items rejected before they were ever buffered (full/timeout/closed)
    dropped_items: Counter,

    /// Wall duration of the most recent delivery, in milliseconds
    last_flush_millis: Gauge,
}

impl QueueCounters {
    /// Create counters with all values at zero
    pub const fn new() -> Self {
        Self {
            flushes: Counter::new(),
            flush_errors: Counter::new(),
            dropped_items: Counter::new(),
            last_flush_millis: Gauge::new(),
        }
    }

    /// Record a completed delivery attempt and its wall duration
    #[inline]
    pub fn record_flush(&self, elapsed: Duration) {
        self.flushes.inc();
        self.last_flush_millis.set(elapsed.as_millis() as u64);
    }

    /// Record a delivery that failed (receiver error or panic)
    #[inline]
    pub fn record_flush_error(&self) {
        self.flush_errors.inc();
    }

    /// Record `count` items dropped before entering the buffer
    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.dropped_items.add(count);
    }

    /// Completed delivery attempts so far
    #[inline]
    pub fn flush_count(&self) -> u64 {
        self.flushes.get()
    }

    /// Failed deliveries so far
    #[inline]
    pub fn flush_error_count(&self) -> u64 {
        self.flush_errors.get()
    }

    /// Items dropped so far
    #[inline]
    pub fn dropped_items(&self) -> u64 {
        self.dropped_items.get()
    }

    /// Wall duration of the most recent delivery, in milliseconds
    #[inline]
    pub fn last_flush_millis(&self) -> u64 {
        self.last_flush_millis.get()
    }

    /// Reset every counter and gauge to zero
    pub fn reset(&self) {
        self.flushes.take();
        self.flush_errors.take();
        self.dropped_items.take();
        self.last_flush_millis.set(0);
    }

    /// Fold the counters and the queue-owned gauges into a snapshot
    pub fn snapshot(&self, queue_size: u64, flush_lock_held: bool) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            queue_size,
            flush_lock_held,
            flush_count: self.flushes.get(),
            flush_error_count: self.flush_errors.get(),
            dropped_items: self.dropped_items.get(),
            last_flush_millis: self.last_flush_millis.get(),
        }
    }
}

/// Point-in-time snapshot of a flush queue's observable state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStatsSnapshot {
    /// Items currently buffered and not yet drained
    pub queue_size: u64,
    /// Whether a flush attempt currently holds the flush lock
    pub flush_lock_held: bool,
    /// Completed delivery attempts
    pub flush_count: u64,
    /// Deliveries that failed
    pub flush_error_count: u64,
    /// Items dropped before entering the buffer
    pub dropped_items: u64,
    /// Wall duration of the most recent delivery, in milliseconds
    pub last_flush_millis: u64,
}

/// Trait for flush queues to expose their stats to an exporter
pub trait QueueStatsProvider: Send + Sync {
    /// The queue's configured name
    fn queue_name(&self) -> &str;

    /// Get a snapshot of current stats
    fn snapshot(&self) -> QueueStatsSnapshot;
}
