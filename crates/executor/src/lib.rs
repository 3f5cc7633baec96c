//! Spool - Executor
//!
//! The worker pool that runs flush deliveries and other background tasks,
//! plus the one-shot timer scheduling they are triggered by.
//!
//! # Architecture
//!
//! ```text
//! submit() ──► bounded backlog ──► worker threads ──► task()
//!                  │ full               │
//!                  ▼                    ├─ pause gate (mutex + condvar)
//!           rejection policy           ├─ catch_unwind isolation
//!                                       └─ optional per-task instrumentation
//! ```
//!
//! # Key Design
//!
//! - **Dedicated OS threads**: tasks may block (receivers doing network or
//!   disk I/O) and per-task thread CPU time is only meaningful when a task
//!   runs on one thread start to finish.
//! - **Cooperative pause**: a shared gate is checked immediately before a
//!   task starts; tasks already executing always run to completion.
//! - **Explicit rejection**: the backlog is bounded and the rejection policy
//!   is supplied by the caller at construction. There is no implicit default.
//! - **Failure isolation**: a panicking task is counted and logged; the
//!   worker survives and keeps serving.
//! - **Injected timers**: the [`Scheduler`] trait is the seam for one-shot
//!   timer callbacks; [`TokioScheduler`] is the stock implementation.

mod config;
mod error;
mod instrument;
mod pool;
mod scheduler;
mod shared;
mod stats;

pub use config::PoolConfig;
pub use error::{ExecutorError, SchedulerError};
pub use instrument::{TaskClock, TaskSample, cpu_times_available};
pub use pool::{RejectionPolicy, Task, WorkerPool, rejection};
pub use scheduler::{Scheduler, TimerHandle, TimerTask, TokioScheduler};
pub use shared::{shared_pool, shared_scheduler};

// Re-export the read-side types components hand to exporters
pub use spool_metrics::{PoolStatsProvider, PoolStatsSnapshot};
