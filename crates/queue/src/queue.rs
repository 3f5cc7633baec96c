//! Size/time dual-triggered flush queue
//!
//! Producers enqueue without ever blocking on delivery; the queue drains
//! itself into a [`FlushReceiver`] when either the buffered item count
//! reaches the size threshold or the time threshold elapses since the last
//! flush attempt.
//!
//! # Flush protocol
//!
//! Both trigger paths submit a *flush attempt* task to the worker pool
//! (never inline on the producer's call stack), and the attempt runs the
//! whole protocol on a pool worker:
//!
//! ```text
//! try_lock ── busy ──► no-op (the next trigger retries)
//!    │
//!    ▼ acquired
//! cancel pending timer (size trigger only)
//! drain buffer ── empty ──► rearm ──► release
//!    │
//!    ▼ non-empty
//! deliver batch to receiver (timed, counted, errors swallowed)
//! rearm ──► release
//! ```
//!
//! The lock is held across delivery, so at most one `flush_to` call is in
//! flight per queue, and every attempt rearms the timer before releasing:
//! the time trigger is self-perpetuating for the life of the queue.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use spool_executor::{Scheduler, TimerHandle, WorkerPool, shared_pool, shared_scheduler};
use spool_metrics::{QueueCounters, QueueStatsProvider, QueueStatsSnapshot};

use crate::buffer::BoundedBuffer;
use crate::config::{MIN_SIZE_TRIGGER, QueueConfig};
use crate::error::{BuildError, EnqueueError};
use crate::receiver::FlushReceiver;

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;

/// Extra buffer capacity beyond the size threshold, admitting producers that
/// race in after a trigger fires but before the flush claims the lock
const CAPACITY_SLACK: usize = 2;

/// Which condition initiated a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    /// Buffered item count reached the size threshold
    Size,
    /// The time threshold elapsed since the last attempt
    Time,
}

/// Buffering, dual-triggered dispatch queue in front of a [`FlushReceiver`]
///
/// Cheap to clone; clones share the same buffer, counters, and triggers.
pub struct FlushQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for FlushQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    name: String,

    /// Runtime-mutable triggers; size takes effect at the next trigger
    /// evaluation, time at the next rearm
    size_threshold: AtomicUsize,
    time_threshold_ms: AtomicU64,

    /// None in bypass mode
    buffer: Option<BoundedBuffer<T>>,

    receiver: Arc<dyn FlushReceiver<T>>,
    scheduler: Arc<dyn Scheduler>,
    pool: Arc<WorkerPool>,

    /// Guards {drain, decide-to-dispatch, deliver, rearm} as one step
    flush_lock: Mutex<()>,

    /// Handle for the pending time-trigger timer
    timer: Mutex<Option<TimerHandle>>,

    closed: AtomicBool,
    counters: QueueCounters,
}

/// Builder for [`FlushQueue`]
///
/// Scheduler and pool are injected; when omitted the process-wide shared
/// instances are used.
pub struct FlushQueueBuilder<T> {
    config: QueueConfig,
    receiver: Arc<dyn FlushReceiver<T>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    pool: Option<Arc<WorkerPool>>,
}

impl<T: Send + 'static> FlushQueueBuilder<T> {
    /// Inject the timer scheduler
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Inject the worker pool that runs flush attempts and deliveries
    pub fn pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validate the config, construct the queue, and arm the initial timer
    pub fn build(self) -> Result<FlushQueue<T>, BuildError> {
        self.config.validate()?;

        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => shared_scheduler()?,
        };
        let pool = match self.pool {
            Some(pool) => pool,
            None => shared_pool()?,
        };

        let bypass = self.config.is_bypass();
        let buffer = (!bypass)
            .then(|| BoundedBuffer::new(self.config.size_threshold + CAPACITY_SLACK));

        let inner = Arc::new(Inner {
            name: self.config.name,
            size_threshold: AtomicUsize::new(self.config.size_threshold),
            time_threshold_ms: AtomicU64::new(self.config.time_threshold.as_millis() as u64),
            buffer,
            receiver: self.receiver,
            scheduler,
            pool,
            flush_lock: Mutex::new(()),
            timer: Mutex::new(None),
            closed: AtomicBool::new(false),
            counters: QueueCounters::new(),
        });

        if !bypass {
            Inner::rearm(&inner);
        }

        tracing::info!(
            queue = %inner.name,
            size_threshold = inner.size_threshold.load(Ordering::Relaxed),
            time_threshold_ms = inner.time_threshold_ms.load(Ordering::Relaxed),
            bypass,
            "flush queue created"
        );

        Ok(FlushQueue { inner })
    }
}

impl<T: Send + 'static> FlushQueue<T> {
    /// Start building a queue over the given receiver
    pub fn builder(
        config: QueueConfig,
        receiver: Arc<dyn FlushReceiver<T>>,
    ) -> FlushQueueBuilder<T> {
        FlushQueueBuilder {
            config,
            receiver,
            scheduler: None,
            pool: None,
        }
    }

    /// Queue name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Enqueue without waiting
    ///
    /// A full buffer or closed queue rejects the item: it comes back inside
    /// the error and the drop counter is incremented.
    pub fn try_enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Relaxed) {
            inner.counters.record_dropped(1);
            return Err(EnqueueError::Closed(item));
        }
        let Some(buffer) = &inner.buffer else {
            Inner::dispatch_direct(inner, vec![item]);
            return Ok(());
        };
        match buffer.try_push(item) {
            Ok(buffered) => {
                Inner::evaluate_size_trigger(inner, buffered);
                Ok(())
            }
            Err(err) => {
                inner.counters.record_dropped(1);
                Err(err)
            }
        }
    }

    /// Enqueue a collection, best-effort
    ///
    /// Items that do not fit are individually counted as drops; the rest are
    /// accepted. Returns `true` only if every item was accepted.
    pub fn enqueue_all(&self, items: impl IntoIterator<Item = T>) -> bool {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Relaxed) {
            let rejected = items.into_iter().count() as u64;
            if rejected > 0 {
                inner.counters.record_dropped(rejected);
            }
            return rejected == 0;
        }
        let Some(buffer) = &inner.buffer else {
            let batch: Vec<T> = items.into_iter().collect();
            if !batch.is_empty() {
                Inner::dispatch_direct(inner, batch);
            }
            return true;
        };

        let mut all_accepted = true;
        let mut buffered = 0;
        for item in items {
            match buffer.try_push(item) {
                Ok(len) => buffered = len,
                Err(_) => {
                    inner.counters.record_dropped(1);
                    all_accepted = false;
                }
            }
        }
        if buffered > 0 {
            Inner::evaluate_size_trigger(inner, buffered);
        }
        all_accepted
    }

    /// Enqueue, waiting up to `timeout` for buffer space
    pub fn offer(&self, item: T, timeout: Duration) -> Result<(), EnqueueError<T>> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Relaxed) {
            inner.counters.record_dropped(1);
            return Err(EnqueueError::Closed(item));
        }
        let Some(buffer) = &inner.buffer else {
            Inner::dispatch_direct(inner, vec![item]);
            return Ok(());
        };
        match buffer.push_timeout(item, timeout) {
            Ok(buffered) => {
                Inner::evaluate_size_trigger(inner, buffered);
                Ok(())
            }
            Err(err) => {
                inner.counters.record_dropped(1);
                Err(err)
            }
        }
    }

    /// Enqueue, waiting until space is available or the queue closes
    pub fn put(&self, item: T) -> Result<(), EnqueueError<T>> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Relaxed) {
            inner.counters.record_dropped(1);
            return Err(EnqueueError::Closed(item));
        }
        let Some(buffer) = &inner.buffer else {
            Inner::dispatch_direct(inner, vec![item]);
            return Ok(());
        };
        match buffer.push_blocking(item) {
            Ok(buffered) => {
                Inner::evaluate_size_trigger(inner, buffered);
                Ok(())
            }
            Err(err) => {
                inner.counters.record_dropped(1);
                Err(err)
            }
        }
    }

    /// Stop accepting items, cancel the timer, wait out any in-flight flush,
    /// and deliver whatever is still buffered as a final batch
    ///
    /// Idempotent. The final delivery runs on the closing thread.
    pub fn close(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(buffer) = &inner.buffer {
            buffer.close();
        }
        if let Some(handle) = inner.timer.lock().take() {
            handle.cancel();
        }

        let _guard = inner.flush_lock.lock();
        let batch = inner
            .buffer
            .as_ref()
            .map(BoundedBuffer::drain)
            .unwrap_or_default();
        if !batch.is_empty() {
            Inner::deliver(inner, batch);
        }
        tracing::info!(queue = %inner.name, "flush queue closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    /// Items currently buffered and not yet drained
    pub fn queue_size(&self) -> usize {
        self.inner.buffer.as_ref().map_or(0, BoundedBuffer::len)
    }

    /// Whether a flush attempt currently holds the flush lock
    pub fn flush_lock_held(&self) -> bool {
        self.inner.flush_lock.is_locked()
    }

    /// Current size threshold
    pub fn size_threshold(&self) -> usize {
        self.inner.size_threshold.load(Ordering::Relaxed)
    }

    /// Change the size threshold; takes effect at the next trigger
    /// evaluation
    ///
    /// Values below 2 disable the size trigger. Buffer capacity stays as
    /// sized at construction.
    pub fn set_size_threshold(&self, threshold: usize) {
        self.inner.size_threshold.store(threshold, Ordering::Relaxed);
    }

    /// Current time threshold
    pub fn time_threshold(&self) -> Duration {
        Duration::from_millis(self.inner.time_threshold_ms.load(Ordering::Relaxed))
    }

    /// Change the time threshold; takes effect at the next rearm
    ///
    /// Values below 1ms disable the time trigger.
    pub fn set_time_threshold(&self, threshold: Duration) {
        self.inner
            .time_threshold_ms
            .store(threshold.as_millis() as u64, Ordering::Relaxed);
    }

    /// Point-in-time stats snapshot
    pub fn stats(&self) -> QueueStatsSnapshot {
        self.inner
            .counters
            .snapshot(self.queue_size() as u64, self.flush_lock_held())
    }

    /// Reset the flush/drop counters and the last-flush gauge
    pub fn reset_counters(&self) {
        self.inner.counters.reset();
    }
}

impl<T: Send + 'static> Inner<T> {
    /// Schedule a flush attempt on the pool if the size trigger is armed and
    /// met
    fn evaluate_size_trigger(inner: &Arc<Self>, buffered: usize) {
        let threshold = inner.size_threshold.load(Ordering::Relaxed);
        if threshold >= MIN_SIZE_TRIGGER && buffered >= threshold {
            Self::spawn_flush_attempt(inner, FlushTrigger::Size);
        }
    }

    /// Hand a flush attempt to the pool
    ///
    /// A rejected size attempt loses nothing: the items stay buffered and
    /// the armed timer retries. A rejected time attempt rearms directly so
    /// the time trigger stays alive.
    fn spawn_flush_attempt(inner: &Arc<Self>, trigger: FlushTrigger) {
        let task_inner = Arc::clone(inner);
        let accepted = inner
            .pool
            .submit(move || Self::flush_attempt(&task_inner, trigger));
        if !accepted {
            tracing::warn!(queue = %inner.name, ?trigger, "flush attempt rejected by worker pool");
            if trigger == FlushTrigger::Time {
                Self::rearm(inner);
            }
        }
    }

    /// The flush protocol; runs on a pool worker
    fn flush_attempt(inner: &Arc<Self>, trigger: FlushTrigger) {
        let Some(_guard) = inner.flush_lock.try_lock() else {
            tracing::trace!(queue = %inner.name, ?trigger, "flush already in flight");
            return;
        };

        if trigger == FlushTrigger::Size {
            // A time-window fire right behind this flush would be stale
            if let Some(handle) = inner.timer.lock().take() {
                handle.cancel();
            }
        }

        let batch = inner
            .buffer
            .as_ref()
            .map(BoundedBuffer::drain)
            .unwrap_or_default();
        if !batch.is_empty() {
            Self::deliver(inner, batch);
        }

        Self::rearm(inner);
    }

    /// Hand one batch to the receiver with timing and error accounting
    fn deliver(inner: &Arc<Self>, batch: Vec<T>) {
        let items = batch.len();
        let started = Instant::now();
        let result =
            std::panic::catch_unwind(AssertUnwindSafe(|| inner.receiver.flush_to(batch)));
        let elapsed = started.elapsed();

        match result {
            Ok(Ok(())) => {
                tracing::debug!(
                    queue = %inner.name,
                    items,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "flush delivered"
                );
            }
            Ok(Err(error)) => {
                inner.counters.record_flush_error();
                tracing::warn!(queue = %inner.name, items, error = %error, "flush receiver failed");
            }
            Err(_) => {
                inner.counters.record_flush_error();
                tracing::warn!(queue = %inner.name, items, "flush receiver panicked");
            }
        }
        inner.counters.record_flush(elapsed);
    }

    /// Bypass-mode dispatch: the batch goes straight to the pool through the
    /// same delivery accounting as a drained flush
    fn dispatch_direct(inner: &Arc<Self>, batch: Vec<T>) {
        let items = batch.len() as u64;
        let task_inner = Arc::clone(inner);
        let accepted = inner.pool.submit(move || Self::deliver(&task_inner, batch));
        if !accepted {
            inner.counters.record_dropped(items);
            tracing::warn!(queue = %inner.name, items, "direct dispatch rejected by worker pool");
        }
    }

    /// Arm a fresh time-trigger timer
    ///
    /// No-op when the queue is closed or the time trigger is disabled. A
    /// scheduler failure halts time-triggered flushing until the next flush
    /// attempt retries; the size trigger is unaffected.
    fn rearm(inner: &Arc<Self>) {
        if inner.closed.load(Ordering::Relaxed) {
            return;
        }
        let millis = inner.time_threshold_ms.load(Ordering::Relaxed);
        if millis == 0 {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(inner);
        let task = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                if !inner.closed.load(Ordering::Relaxed) {
                    Self::spawn_flush_attempt(&inner, FlushTrigger::Time);
                }
            }
        });

        match inner
            .scheduler
            .schedule_once(Duration::from_millis(millis), task)
        {
            Ok(handle) => {
                *inner.timer.lock() = Some(handle);
            }
            Err(error) => {
                tracing::error!(
                    queue = %inner.name,
                    error = %error,
                    "failed to rearm flush timer; time-triggered flushing halted"
                );
            }
        }
    }
}

impl<T: Send + 'static> QueueStatsProvider for FlushQueue<T> {
    fn queue_name(&self) -> &str {
        self.name()
    }

    fn snapshot(&self) -> QueueStatsSnapshot {
        self.stats()
    }
}

impl<T> std::fmt::Debug for FlushQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushQueue")
            .field("name", &self.inner.name)
            .field(
                "size_threshold",
                &self.inner.size_threshold.load(Ordering::Relaxed),
            )
            .field(
                "time_threshold_ms",
                &self.inner.time_threshold_ms.load(Ordering::Relaxed),
            )
            .field("bypass", &self.inner.buffer.is_none())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}
