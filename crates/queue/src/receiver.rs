//! Flush receiver contract
//!
//! The external sink a queue hands drained batches to. `flush_to` runs on a
//! worker pool thread and occupies a pool slot for its duration, so it
//! should not block indefinitely. Returned errors (and panics) are caught at
//! the flush boundary, counted, and logged; they never propagate to
//! producers and nothing is retried.

/// Error type receivers may return from a delivery
pub type FlushError = Box<dyn std::error::Error + Send + Sync>;

/// Sink for drained batches
pub trait FlushReceiver<T>: Send + Sync {
    /// Process one drained batch
    fn flush_to(&self, batch: Vec<T>) -> Result<(), FlushError>;
}

/// Closures double as receivers, which keeps wiring and tests short
impl<T, F> FlushReceiver<T> for F
where
    F: Fn(Vec<T>) -> Result<(), FlushError> + Send + Sync,
{
    fn flush_to(&self, batch: Vec<T>) -> Result<(), FlushError> {
        self(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_receiver() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let receiver = move |batch: Vec<u32>| {
            counter.fetch_add(batch.len(), Ordering::Relaxed);
            Ok(())
        };

        receiver.flush_to(vec![1, 2, 3]).unwrap();
        assert_eq!(delivered.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_receiver_error_is_a_boxed_error() {
        let receiver = |_batch: Vec<u32>| -> Result<(), FlushError> {
            Err("sink unavailable".into())
        };

        let err = receiver.flush_to(vec![1]).unwrap_err();
        assert!(err.to_string().contains("sink unavailable"));
    }
}
