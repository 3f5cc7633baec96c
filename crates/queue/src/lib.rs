//! Spool - Queue
//!
//! A size/time dual-triggered flush queue: buffers telemetry from
//! concurrent producers without blocking them on delivery, and drains
//! itself into a receiver through a worker pool.
//!
//! # Architecture
//!
//! ```text
//! [Producers]                 [FlushQueue]                  [WorkerPool]
//!   try_enqueue ──┐                                       ┌─► flush attempt
//!   offer ────────┼──► BoundedBuffer ──[size >= N]────────┤    try_lock
//!   put ──────────┘         ▲                             │    drain
//!                           │          [time >= T]────────┘    deliver ──► FlushReceiver
//!                        Scheduler ◄─────── rearm ─────────────┘
//! ```
//!
//! # Key Design
//!
//! - **Never inline**: both triggers dispatch flush attempts to the pool;
//!   producer latency is never coupled to flush cost.
//! - **Try-lock exclusion**: an attempt that finds a flush in flight is a
//!   no-op; the next trigger retries. At most one delivery runs per queue.
//! - **Self-rearming**: every completed attempt arms a fresh timer before
//!   releasing the lock.
//! - **Drop accounting**: a full buffer rejects instead of blocking
//!   `try_enqueue`; every rejection is counted and returns the item.
//! - **Bypass mode**: with both triggers disabled, items dispatch
//!   individually through the same accounting and no buffer exists.
//!
//! # Example
//!
//! ```ignore
//! use spool_queue::{FlushQueue, QueueConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let queue = FlushQueue::builder(
//!     QueueConfig::named("traces")
//!         .with_size_threshold(128)
//!         .with_time_threshold(Duration::from_secs(5)),
//!     Arc::new(|batch: Vec<Trace>| {
//!         exporter.send(batch)?;
//!         Ok(())
//!     }),
//! )
//! .build()?;
//!
//! queue.try_enqueue(trace).ok();
//! ```

mod buffer;
mod config;
mod error;
mod queue;
mod receiver;

pub use config::QueueConfig;
pub use error::{BuildError, ConfigError, EnqueueError};
pub use queue::{FlushQueue, FlushQueueBuilder};
pub use receiver::{FlushError, FlushReceiver};

// Re-export the injection seams and stats surface for convenience
pub use spool_executor::{PoolConfig, Scheduler, TokioScheduler, WorkerPool, rejection};
pub use spool_metrics::{QueueStatsProvider, QueueStatsSnapshot};
