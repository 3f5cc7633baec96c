//! Pausable, instrumented worker pool
//!
//! A fixed set of named OS worker threads serving a bounded backlog. Pausing
//! is cooperative: a shared gate is checked immediately before each task
//! starts, so tasks already executing always run to completion and `resume`
//! wakes every held worker (wake order is not FIFO).
//!
//! Saturation is the caller's problem by contract: the backlog is bounded
//! and a rejection policy must be supplied at construction. A rejected task
//! is handed to the policy, which may drop it, run it inline, or divert it.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use spool_metrics::{Counter, PoolStatsProvider, PoolStatsSnapshot};

use crate::config::PoolConfig;
use crate::error::ExecutorError;
use crate::instrument::TaskClock;
use crate::stats::InstrumentStats;

#[cfg(test)]
#[path = "pool_test.rs"]
mod tests;

/// A unit of work submitted to the pool
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Policy invoked with tasks the saturated backlog refused
pub type RejectionPolicy = Box<dyn Fn(Task) + Send + Sync>;

/// Stock rejection policies
///
/// The pool itself never defaults to one of these; construction requires an
/// explicit choice.
pub mod rejection {
    use super::{RejectionPolicy, Task};

    /// Drop the rejected task
    ///
    /// The pool has already counted and logged the rejection, so nothing
    /// further happens.
    pub fn discard() -> RejectionPolicy {
        Box::new(|_task: Task| {})
    }

    /// Run the rejected task inline on the submitting thread
    pub fn caller_runs() -> RejectionPolicy {
        Box::new(|task: Task| task())
    }
}

/// A queued task plus its submission instant for wait accounting
struct Job {
    task: Task,
    submitted_at: Instant,
}

/// State shared between the pool handle and its workers
struct PoolShared {
    name: String,
    backlog_capacity: usize,

    /// Queued jobs; its condvar wakes idle workers
    backlog: Mutex<VecDeque<Job>>,
    work_available: Condvar,

    /// Pause gate, independent of the backlog lock
    gate: Mutex<bool>,
    unpaused: Condvar,

    shutdown: AtomicBool,

    running_tasks: AtomicU64,
    run_tasks: Counter,
    rejected_tasks: Counter,
    failed_tasks: Counter,

    instrumented: AtomicBool,
    stats: InstrumentStats,

    rejection: RejectionPolicy,
}

/// Pausable, instrumented task executor over dedicated worker threads
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool and start its worker threads
    ///
    /// `rejection` is invoked with every task the saturated backlog refuses;
    /// there is no implicit default policy. See [`rejection`] for stock
    /// choices.
    pub fn new(config: PoolConfig, rejection: RejectionPolicy) -> Result<Self, ExecutorError> {
        let workers = config.workers.max(1);
        let shared = Arc::new(PoolShared {
            name: config.name,
            backlog_capacity: config.backlog_capacity.max(1),
            backlog: Mutex::new(VecDeque::new()),
            work_available: Condvar::new(),
            gate: Mutex::new(false),
            unpaused: Condvar::new(),
            shutdown: AtomicBool::new(false),
            running_tasks: AtomicU64::new(0),
            run_tasks: Counter::new(),
            rejected_tasks: Counter::new(),
            failed_tasks: Counter::new(),
            instrumented: AtomicBool::new(false),
            stats: InstrumentStats::default(),
            rejection,
        });

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let worker_shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("{}-worker-{}", shared.name, index))
                .spawn(move || worker_loop(worker_shared))?;
            handles.push(handle);
        }

        tracing::info!(pool = %shared.name, workers, "worker pool started");

        Ok(Self {
            shared,
            workers: Mutex::new(handles),
        })
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Submit a task for execution
    ///
    /// Returns `true` if the task was accepted. On a saturated backlog (or
    /// after shutdown) the rejection counter is incremented, the task is
    /// handed to the rejection policy, and `false` is returned.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let job = Job {
            task: Box::new(task),
            submitted_at: Instant::now(),
        };

        if self.shared.shutdown.load(Ordering::Relaxed) {
            self.reject(job);
            return false;
        }

        {
            let mut backlog = self.shared.backlog.lock();
            if backlog.len() >= self.shared.backlog_capacity {
                drop(backlog);
                self.reject(job);
                return false;
            }
            backlog.push_back(job);
        }
        self.shared.work_available.notify_one();
        true
    }

    fn reject(&self, job: Job) {
        self.shared.rejected_tasks.inc();
        tracing::warn!(pool = %self.shared.name, "task rejected: backlog saturated or pool shut down");
        (self.shared.rejection)(job.task);
    }

    /// Gate new task starts
    ///
    /// Tasks already executing run to completion. Idempotent.
    pub fn pause(&self) {
        let mut paused = self.shared.gate.lock();
        if !*paused {
            *paused = true;
            tracing::debug!(pool = %self.shared.name, "pool paused");
        }
    }

    /// Reopen the gate and wake held workers
    ///
    /// A no-op when the pool is not paused.
    pub fn resume(&self) {
        let mut paused = self.shared.gate.lock();
        if *paused {
            *paused = false;
            self.shared.unpaused.notify_all();
            tracing::debug!(pool = %self.shared.name, "pool resumed");
        }
    }

    /// Whether new task starts are currently gated
    pub fn is_paused(&self) -> bool {
        *self.shared.gate.lock()
    }

    /// Enable or disable per-task instrumentation
    ///
    /// Any state change atomically resets the accumulators.
    pub fn set_instrumented(&self, enabled: bool) {
        if self.shared.instrumented.swap(enabled, Ordering::Relaxed) != enabled {
            self.shared.stats.reset();
        }
    }

    /// Whether per-task instrumentation is enabled
    pub fn is_instrumented(&self) -> bool {
        self.shared.instrumented.load(Ordering::Relaxed)
    }

    /// Tasks currently executing on a worker
    pub fn running_tasks(&self) -> u64 {
        self.shared.running_tasks.load(Ordering::Relaxed)
    }

    /// Tasks currently queued in the backlog
    pub fn backlog_len(&self) -> usize {
        self.shared.backlog.lock().len()
    }

    /// Reset the task counters and instrumentation accumulators
    pub fn reset_counters(&self) {
        self.shared.run_tasks.take();
        self.shared.rejected_tasks.take();
        self.shared.failed_tasks.take();
        self.shared.stats.reset();
    }

    /// Point-in-time stats snapshot
    pub fn stats(&self) -> PoolStatsSnapshot {
        let derived = self.shared.stats.derived();
        PoolStatsSnapshot {
            running_tasks: self.shared.running_tasks.load(Ordering::Relaxed),
            run_tasks: self.shared.run_tasks.get(),
            rejected_tasks: self.shared.rejected_tasks.get(),
            failed_tasks: self.shared.failed_tasks.get(),
            instrumented: self.is_instrumented(),
            sample_count: derived.sample_count,
            avg_elapsed_ns: derived.avg_elapsed_ns,
            avg_cpu_ns: derived.avg_cpu_ns,
            avg_wait_ns: derived.avg_wait_ns,
            avg_block_ns: derived.avg_block_ns,
            utilization_avg_pct: derived.utilization_avg_pct,
            utilization_total_pct: derived.utilization_total_pct,
            avg_stats_update_ns: self.shared.stats.avg_update_ns(),
        }
    }

    /// Stop accepting work, finish queued and in-flight tasks, join workers
    ///
    /// Shutdown overrides pause: held workers are released so the backlog
    /// can drain. Idempotent. Must not be called from a worker thread.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::Relaxed) {
            return;
        }
        self.shared.wake_all();

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.join();
        }
        tracing::info!(pool = %self.shared.name, "worker pool shut down");
    }
}

impl PoolShared {
    /// Wake every sleeping worker after the shutdown flag is set
    ///
    /// Each condvar's mutex is taken and released first: a worker that
    /// checked the flag before it was set is then guaranteed to be parked in
    /// `wait`, so the notification cannot be lost.
    fn wake_all(&self) {
        drop(self.backlog.lock());
        self.work_available.notify_all();
        drop(self.gate.lock());
        self.unpaused.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal only: joining here could deadlock a drop on a worker thread.
        if !self.shared.shutdown.swap(true, Ordering::Relaxed) {
            self.shared.wake_all();
        }
    }
}

impl PoolStatsProvider for WorkerPool {
    fn pool_name(&self) -> &str {
        self.name()
    }

    fn snapshot(&self) -> PoolStatsSnapshot {
        self.stats()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("paused", &self.is_paused())
            .field("running_tasks", &self.running_tasks())
            .field("backlog_len", &self.backlog_len())
            .finish()
    }
}

/// Worker body: dequeue, gate, execute, account
fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let job = {
            let mut backlog = shared.backlog.lock();
            loop {
                if let Some(job) = backlog.pop_front() {
                    break job;
                }
                if shared.shutdown.load(Ordering::Relaxed) {
                    return;
                }
                shared.work_available.wait(&mut backlog);
            }
        };

        let wait = job.submitted_at.elapsed();
        let block = hold_at_gate(&shared);

        let clock = shared
            .instrumented
            .load(Ordering::Relaxed)
            .then(|| TaskClock::start(job.submitted_at, wait, block));

        shared.running_tasks.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(job.task));
        shared.running_tasks.fetch_sub(1, Ordering::Relaxed);

        shared.run_tasks.inc();
        if outcome.is_err() {
            shared.failed_tasks.inc();
            tracing::error!(pool = %shared.name, "task panicked; worker continues");
        }

        if let Some(clock) = clock {
            if shared.instrumented.load(Ordering::Relaxed) {
                shared.stats.update(&clock.finish());
            }
        }
    }
}

/// Block at the pause gate until resumed or shut down
///
/// Returns the time the worker was held; zero when the pool is not paused.
fn hold_at_gate(shared: &PoolShared) -> Duration {
    let mut paused = shared.gate.lock();
    if !*paused {
        return Duration::ZERO;
    }
    let started = Instant::now();
    while *paused && !shared.shutdown.load(Ordering::Relaxed) {
        shared.unpaused.wait(&mut paused);
    }
    started.elapsed()
}
