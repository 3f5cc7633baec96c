//! Per-task instrumentation
//!
//! A [`TaskClock`] is opened by a worker immediately before a task starts and
//! closed when it completes; the resulting [`TaskSample`] carries the deltas
//! that feed the pool's accumulators.
//!
//! Time components per task:
//!
//! - **elapsed**: submit-to-completion wall time. This spans the backlog
//!   wait, any pause-gate hold, and execution, so `elapsed - (wait + block)`
//!   is the execution time.
//! - **cpu**: thread CPU time consumed during execution. Valid because a
//!   task runs on one worker thread start to finish. `None` on platforms
//!   without a per-thread CPU clock.
//! - **wait**: time spent queued in the backlog before a worker picked the
//!   task up.
//! - **block**: time the worker spent held at the pause gate before starting
//!   the task.

use std::time::{Duration, Instant};

/// Read the calling thread's CPU clock
#[cfg(unix)]
fn thread_cpu_time() -> Option<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return None;
    }
    Some(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}

#[cfg(not(unix))]
fn thread_cpu_time() -> Option<Duration> {
    None
}

/// Whether per-thread CPU times are obtainable on this platform
pub fn cpu_times_available() -> bool {
    thread_cpu_time().is_some()
}

/// Open instrumentation measurement for one task
///
/// Created on the worker thread right before the task body runs; the CPU
/// reading anchors the delta computed by [`finish`](TaskClock::finish).
#[derive(Debug)]
pub struct TaskClock {
    submitted_at: Instant,
    wait: Duration,
    block: Duration,
    cpu_start: Option<Duration>,
}

impl TaskClock {
    /// Start the clock for a task that was submitted at `submitted_at`,
    /// waited `wait` in the backlog, and held the worker at the pause gate
    /// for `block`
    pub fn start(submitted_at: Instant, wait: Duration, block: Duration) -> Self {
        Self {
            submitted_at,
            wait,
            block,
            cpu_start: thread_cpu_time(),
        }
    }

    /// Close the measurement and produce the sample
    pub fn finish(self) -> TaskSample {
        let cpu = match (self.cpu_start, thread_cpu_time()) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };
        TaskSample {
            elapsed: self.submitted_at.elapsed(),
            cpu,
            wait: self.wait,
            block: self.block,
        }
    }
}

/// Closed per-task measurement
#[derive(Debug, Clone, Copy)]
pub struct TaskSample {
    /// Submit-to-completion wall time
    pub elapsed: Duration,
    /// Thread CPU time consumed during execution, where obtainable
    pub cpu: Option<Duration>,
    /// Backlog wait before a worker picked the task up
    pub wait: Duration,
    /// Pause-gate hold before the task started
    pub block: Duration,
}
