//! Worker pool stats snapshot
//!
//! The pool's accumulators live in `spool-executor` behind a lock; this
//! module defines only the read side: the snapshot an exporter polls and the
//! provider trait that hands it over.

/// Point-in-time snapshot of a worker pool's observable state
///
/// Duration-valued averages are reported in nanoseconds. Utilization values
/// are percentages derived from the instrumentation accumulators:
/// `cpu / (elapsed - (wait + block))`, guarded to report 0 instead of
/// dividing by a non-positive execution time. When instrumentation is
/// disabled every derived field is 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct PoolStatsSnapshot {
    /// Tasks currently executing on a worker
    pub running_tasks: u64,
    /// Tasks executed to completion (including panicked ones)
    pub run_tasks: u64,
    /// Tasks refused because the backlog was saturated
    pub rejected_tasks: u64,
    /// Tasks that panicked while executing
    pub failed_tasks: u64,
    /// Whether per-task instrumentation is currently enabled
    pub instrumented: bool,
    /// Instrumented samples accumulated since the last reset
    pub sample_count: u64,
    /// Average submit-to-completion wall time per task (ns)
    pub avg_elapsed_ns: u64,
    /// Average thread CPU time per task (ns); 0 where unobtainable
    pub avg_cpu_ns: u64,
    /// Average backlog wait per task (ns)
    pub avg_wait_ns: u64,
    /// Average pause-gate hold per task (ns)
    pub avg_block_ns: u64,
    /// CPU utilization percentage derived from the averages
    pub utilization_avg_pct: f64,
    /// CPU utilization percentage derived from the totals
    pub utilization_total_pct: f64,
    /// Average time spent updating the accumulators themselves (ns)
    pub avg_stats_update_ns: u64,
}

/// Trait for worker pools to expose their stats to an exporter
pub trait PoolStatsProvider: Send + Sync {
    /// The pool's configured name
    fn pool_name(&self) -> &str;

    /// Get a snapshot of current stats
    fn snapshot(&self) -> PoolStatsSnapshot;
}
