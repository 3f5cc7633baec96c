//! Process-wide default pool and scheduler
//!
//! Convenience for callers that do not care to wire their own instances.
//! Core types never reach for these themselves; they take injected
//! `Arc<WorkerPool>` / `Arc<dyn Scheduler>` and callers opt in.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::{ExecutorError, SchedulerError};
use crate::pool::{WorkerPool, rejection};
use crate::scheduler::TokioScheduler;

static SHARED_POOL: OnceLock<Arc<WorkerPool>> = OnceLock::new();
static SHARED_SCHEDULER: OnceLock<Arc<TokioScheduler>> = OnceLock::new();
static INIT: Mutex<()> = Mutex::new(());

/// The process-wide worker pool, created on first use
///
/// Rejected tasks on the shared pool are discarded after the pool's own
/// logging and counting; callers that need a different policy should build
/// their own pool.
pub fn shared_pool() -> Result<Arc<WorkerPool>, ExecutorError> {
    if let Some(pool) = SHARED_POOL.get() {
        return Ok(Arc::clone(pool));
    }
    let _guard = INIT.lock();
    if let Some(pool) = SHARED_POOL.get() {
        return Ok(Arc::clone(pool));
    }
    let pool = Arc::new(WorkerPool::new(
        PoolConfig::named("spool-shared"),
        rejection::discard(),
    )?);
    let _ = SHARED_POOL.set(Arc::clone(&pool));
    Ok(pool)
}

/// The process-wide timer scheduler, created on first use
///
/// The first call must happen inside a tokio runtime; the captured handle is
/// reused for the life of the process.
pub fn shared_scheduler() -> Result<Arc<TokioScheduler>, SchedulerError> {
    if let Some(scheduler) = SHARED_SCHEDULER.get() {
        return Ok(Arc::clone(scheduler));
    }
    let _guard = INIT.lock();
    if let Some(scheduler) = SHARED_SCHEDULER.get() {
        return Ok(Arc::clone(scheduler));
    }
    let scheduler = Arc::new(TokioScheduler::from_current()?);
    let _ = SHARED_SCHEDULER.set(Arc::clone(&scheduler));
    Ok(scheduler)
}
