//! Instrumentation accumulators
//!
//! Running sums and a sample count only, never history. Averages and
//! utilization are derived at snapshot time with guards so they report 0
//! instead of dividing by zero or a non-positive execution time.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use spool_metrics::Counter;

use crate::instrument::TaskSample;

/// Accumulated totals behind the stats lock
#[derive(Debug, Default)]
struct Accum {
    elapsed: Duration,
    cpu: Duration,
    wait: Duration,
    block: Duration,
    count: u64,
}

/// Averages and utilization derived from the accumulators
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DerivedStats {
    pub sample_count: u64,
    pub avg_elapsed_ns: u64,
    pub avg_cpu_ns: u64,
    pub avg_wait_ns: u64,
    pub avg_block_ns: u64,
    pub utilization_avg_pct: f64,
    pub utilization_total_pct: f64,
}

/// Lock-guarded instrumentation accumulators plus meta-counters tracking the
/// cost of the updates themselves
#[derive(Debug, Default)]
pub(crate) struct InstrumentStats {
    inner: Mutex<Accum>,
    update_count: Counter,
    update_total_ns: Counter,
}

impl InstrumentStats {
    /// Fold one task sample into the totals
    pub fn update(&self, sample: &TaskSample) {
        let started = Instant::now();
        {
            let mut accum = self.inner.lock();
            accum.count += 1;
            accum.elapsed += sample.elapsed;
            accum.cpu += sample.cpu.unwrap_or(Duration::ZERO);
            accum.wait += sample.wait;
            accum.block += sample.block;
        }
        self.update_total_ns
            .add(started.elapsed().as_nanos() as u64);
        self.update_count.inc();
    }

    /// Zero every accumulator and meta-counter
    pub fn reset(&self) {
        *self.inner.lock() = Accum::default();
        self.update_count.take();
        self.update_total_ns.take();
    }

    /// Derive averages and utilization from the current totals
    pub fn derived(&self) -> DerivedStats {
        let accum = self.inner.lock();
        let count = accum.count;

        let avg_elapsed_ns = avg_ns(accum.elapsed, count);
        let avg_cpu_ns = avg_ns(accum.cpu, count);
        let avg_wait_ns = avg_ns(accum.wait, count);
        let avg_block_ns = avg_ns(accum.block, count);

        DerivedStats {
            sample_count: count,
            avg_elapsed_ns,
            avg_cpu_ns,
            avg_wait_ns,
            avg_block_ns,
            utilization_avg_pct: utilization_pct(avg_cpu_ns, avg_elapsed_ns, avg_wait_ns, avg_block_ns),
            utilization_total_pct: utilization_pct(
                accum.cpu.as_nanos() as u64,
                accum.elapsed.as_nanos() as u64,
                accum.wait.as_nanos() as u64,
                accum.block.as_nanos() as u64,
            ),
        }
    }

    /// Average cost of one accumulator update, in nanoseconds
    pub fn avg_update_ns(&self) -> u64 {
        let count = self.update_count.get();
        if count == 0 {
            0
        } else {
            self.update_total_ns.get() / count
        }
    }
}

/// `total / count`, 0 when there are no samples
fn avg_ns(total: Duration, count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        (total.as_nanos() as u64) / count
    }
}

/// `cpu / (elapsed - (wait + block))` as a percentage
///
/// Reports 0 when there is no CPU reading or the execution-time denominator
/// is not positive.
fn utilization_pct(cpu_ns: u64, elapsed_ns: u64, wait_ns: u64, block_ns: u64) -> f64 {
    let denom = elapsed_ns as i128 - (wait_ns as i128 + block_ns as i128);
    if cpu_ns == 0 || denom <= 0 {
        return 0.0;
    }
    (cpu_ns as f64 / denom as f64) * 100.0
}
