//! Spool - Metrics
//!
//! Lock-free counters and exporter-facing stat snapshots for the flush queue
//! and worker pool.
//!
//! # Design
//!
//! - **Lock-free updates**: counters and gauges are atomics with relaxed
//!   ordering; readers see eventually-consistent values.
//! - **Snapshot structs**: readers never touch live atomics directly. Each
//!   component produces a point-in-time snapshot that is `Copy`, comparable,
//!   and serde-serializable, so any external exporter (metrics bridge,
//!   dashboard, management console) can poll and render it without this
//!   crate knowing the exporter's protocol.
//! - **Provider traits**: components expose their snapshots through
//!   [`QueueStatsProvider`] / [`PoolStatsProvider`] so an exporter can hold
//!   a `Vec<Arc<dyn Provider>>` without knowing concrete types.

mod pool;
mod queue;

pub use pool::{PoolStatsProvider, PoolStatsSnapshot};
pub use queue::{QueueCounters, QueueStatsProvider, QueueStatsSnapshot};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment the counter by `val`
    #[inline]
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Increment the counter by 1
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// Get the current value
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset the counter to 0 and return the previous value
    #[inline]
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Atomic gauge holding the most recent observation of a value
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    /// Create a new gauge initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Replace the current value
    #[inline]
    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    /// Get the current value
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
