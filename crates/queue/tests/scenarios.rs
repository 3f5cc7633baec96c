//! End-to-end flush queue scenarios
//!
//! Real worker pool, real tokio-backed timers. Each test wires its own pool
//! so pause/shutdown in one scenario cannot leak into another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use spool_queue::{
    FlushError, FlushQueue, FlushReceiver, PoolConfig, QueueConfig, TokioScheduler, WorkerPool,
    rejection,
};

/// Receiver that records batches, optionally slow or failing
struct Recorder {
    batches: Mutex<Vec<Vec<u32>>>,
    delivered: AtomicU64,
    delay: Duration,
    fail: bool,
}

impl Recorder {
    fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            delivered: AtomicU64::new(0),
            delay,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            delivered: AtomicU64::new(0),
            delay: Duration::ZERO,
            fail: true,
        }
    }

    fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn all_items(&self) -> Vec<u32> {
        self.batches.lock().iter().flatten().copied().collect()
    }
}

impl FlushReceiver<u32> for Recorder {
    fn flush_to(&self, batch: Vec<u32>) -> Result<(), FlushError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.delivered.fetch_add(batch.len() as u64, Ordering::Relaxed);
        self.batches.lock().push(batch);
        if self.fail {
            return Err("receiver configured to fail".into());
        }
        Ok(())
    }
}

fn wired(
    name: &str,
    size_threshold: usize,
    time_threshold: Duration,
    receiver: Arc<Recorder>,
) -> (FlushQueue<u32>, Arc<WorkerPool>) {
    let pool = Arc::new(
        WorkerPool::new(
            PoolConfig::named(format!("{name}-pool"))
                .with_workers(2)
                .with_backlog_capacity(128),
            rejection::discard(),
        )
        .unwrap(),
    );
    let queue: FlushQueue<u32> = FlushQueue::builder(
        QueueConfig::named(name)
            .with_size_threshold(size_threshold)
            .with_time_threshold(time_threshold),
        receiver,
    )
    .scheduler(Arc::new(TokioScheduler::from_current().unwrap()))
    .pool(Arc::clone(&pool))
    .build()
    .unwrap();
    (queue, pool)
}

async fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn size_trigger_flushes_exactly_once() {
    let receiver = Arc::new(Recorder::new());
    let (queue, pool) = wired("size-once", 5, Duration::from_secs(100), receiver.clone());

    for i in 0..5 {
        queue.try_enqueue(i).unwrap();
    }

    assert!(wait_until(Duration::from_secs(2), || receiver.batch_count() == 1).await);
    assert_eq!(receiver.all_items(), vec![0, 1, 2, 3, 4]);

    let stats = queue.stats();
    assert_eq!(stats.flush_count, 1);
    assert_eq!(stats.dropped_items, 0);

    // Nothing further flushes without a trigger
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(receiver.batch_count(), 1);
    pool.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn time_trigger_flushes_a_partial_buffer() {
    let receiver = Arc::new(Recorder::new());
    let (queue, pool) = wired("time-partial", 1000, Duration::from_millis(50), receiver.clone());

    queue.try_enqueue(1).unwrap();
    queue.try_enqueue(2).unwrap();
    queue.try_enqueue(3).unwrap();

    assert!(wait_until(Duration::from_secs(2), || receiver.batch_count() >= 1).await);
    assert_eq!(receiver.all_items(), vec![1, 2, 3]);
    assert_eq!(queue.stats().flush_count, receiver.batch_count() as u64);
    pool.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overload_drops_are_counted_not_lost() {
    let receiver = Arc::new(Recorder::with_delay(Duration::from_millis(50)));
    let (queue, pool) = wired("overload", 2, Duration::from_millis(40), receiver.clone());

    // Capacity is size_threshold + slack = 4; a slow receiver holds the
    // flush lock while producers race ahead
    let mut accepted = 0u64;
    for i in 0..10 {
        if queue.try_enqueue(i).is_ok() {
            accepted += 1;
        }
    }

    // Every accepted item is eventually delivered; the rest were counted
    assert!(
        wait_until(Duration::from_secs(5), || {
            receiver.delivered() + queue.stats().dropped_items == 10
        })
        .await
    );
    let stats = queue.stats();
    assert!(stats.dropped_items > 0);
    assert_eq!(receiver.delivered(), accepted);
    pool.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_receiver_counts_errors_and_keeps_flushing() {
    let receiver = Arc::new(Recorder::failing());
    let (queue, pool) = wired("failing", 100, Duration::from_millis(40), receiver.clone());

    queue.try_enqueue(1).unwrap();
    assert!(
        wait_until(Duration::from_secs(2), || {
            queue.stats().flush_count >= 1 && queue.stats().flush_error_count >= 1
        })
        .await
    );

    // The timer rearmed after the failed delivery: later flushes still occur
    queue.try_enqueue(2).unwrap();
    assert!(
        wait_until(Duration::from_secs(2), || {
            queue.stats().flush_count >= 2 && queue.stats().flush_error_count >= 2
        })
        .await
    );

    let stats = queue.stats();
    assert_eq!(stats.flush_count, stats.flush_error_count);
    pool.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn flushes_partition_the_accepted_stream() {
    let receiver = Arc::new(Recorder::new());
    let (queue, pool) = wired("partition", 10, Duration::from_millis(20), receiver.clone());

    // Blocking producers: nothing is dropped, so the union of all batches
    // must be exactly the accepted stream, no gaps, no duplicates
    let mut producers = Vec::new();
    for p in 0..4u32 {
        let queue = queue.clone();
        producers.push(std::thread::spawn(move || {
            for i in 0..100u32 {
                queue.put(p * 1000 + i).unwrap();
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || receiver.delivered() == 400).await);
    queue.close();

    let mut items = receiver.all_items();
    items.sort_unstable();
    let mut expected: Vec<u32> = (0..4u32)
        .flat_map(|p| (0..100u32).map(move |i| p * 1000 + i))
        .collect();
    expected.sort_unstable();

    assert_eq!(items, expected);
    assert_eq!(queue.stats().dropped_items, 0);
    pool.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_most_one_delivery_in_flight_per_queue() {
    struct Exclusive {
        in_flight: AtomicU64,
        max_seen: AtomicU64,
        delivered: AtomicU64,
    }

    impl FlushReceiver<u32> for Exclusive {
        fn flush_to(&self, batch: Vec<u32>) -> Result<(), FlushError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.delivered.fetch_add(batch.len() as u64, Ordering::SeqCst);
            Ok(())
        }
    }

    let receiver = Arc::new(Exclusive {
        in_flight: AtomicU64::new(0),
        max_seen: AtomicU64::new(0),
        delivered: AtomicU64::new(0),
    });

    let pool = Arc::new(
        WorkerPool::new(
            PoolConfig::named("exclusive-pool").with_workers(4).with_backlog_capacity(256),
            rejection::discard(),
        )
        .unwrap(),
    );
    let queue = FlushQueue::builder(
        QueueConfig::named("exclusive")
            .with_size_threshold(2)
            .with_time_threshold(Duration::from_millis(10)),
        Arc::clone(&receiver) as Arc<dyn FlushReceiver<u32>>,
    )
    .scheduler(Arc::new(TokioScheduler::from_current().unwrap()))
    .pool(Arc::clone(&pool))
    .build()
    .unwrap();

    // Two producers hammer the queue so size and time triggers overlap
    let mut producers = Vec::new();
    for _ in 0..2 {
        let queue = queue.clone();
        producers.push(std::thread::spawn(move || {
            for i in 0..200u32 {
                let _ = queue.try_enqueue(i);
                std::thread::sleep(Duration::from_micros(200));
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(
        wait_until(Duration::from_secs(5), || {
            receiver.delivered.load(Ordering::SeqCst) + queue.stats().dropped_items == 400
        })
        .await
    );
    assert_eq!(receiver.max_seen.load(Ordering::SeqCst), 1);
    pool.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bypass_boundary_dispatches_every_item() {
    let receiver = Arc::new(Recorder::new());
    let pool = Arc::new(
        WorkerPool::new(
            PoolConfig::named("bypass-pool").with_workers(2).with_backlog_capacity(64),
            rejection::discard(),
        )
        .unwrap(),
    );

    // size_threshold 0 and sub-millisecond time threshold: bypass mode
    let queue = FlushQueue::builder(
        QueueConfig::named("bypass")
            .with_size_threshold(0)
            .with_time_threshold(Duration::from_micros(500)),
        Arc::clone(&receiver) as Arc<dyn FlushReceiver<u32>>,
    )
    .scheduler(Arc::new(TokioScheduler::from_current().unwrap()))
    .pool(Arc::clone(&pool))
    .build()
    .unwrap();

    for i in 0..4 {
        queue.try_enqueue(i).unwrap();
    }

    assert!(wait_until(Duration::from_secs(2), || receiver.batch_count() == 4).await);
    assert!(receiver.batches.lock().iter().all(|b| b.len() == 1));
    assert_eq!(queue.queue_size(), 0);
    assert_eq!(queue.stats().flush_count, 4);
    pool.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_stops_timers_and_late_producers() {
    let receiver = Arc::new(Recorder::new());
    let (queue, pool) = wired("close", 100, Duration::from_millis(30), receiver.clone());

    queue.try_enqueue(1).unwrap();
    queue.close();

    // The buffered item was delivered by the final drain
    assert_eq!(receiver.all_items(), vec![1]);
    let flushes_at_close = queue.stats().flush_count;

    // No time-triggered flushes happen after close
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(queue.stats().flush_count, flushes_at_close);

    assert!(queue.try_enqueue(2).unwrap_err().is_closed());
    pool.shutdown();
}
