//! Bounded staging buffer
//!
//! Holds enqueued-but-undrained items in insertion order. Duplicates are
//! preserved: two equal items enqueued twice must be delivered twice.
//!
//! The capacity is fixed at construction. `drain` removes the entire
//! contents in one critical section, so an item is captured by exactly one
//! batch; insertions racing with a drain land in the fresh buffer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::EnqueueError;

struct BufferState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded, order-preserving staging buffer with blocking insertion
pub(crate) struct BoundedBuffer<T> {
    capacity: usize,
    state: Mutex<BufferState<T>>,
    not_full: Condvar,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(BufferState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
        }
    }

    /// Insert without waiting; returns the buffer length after the insert
    pub fn try_push(&self, item: T) -> Result<usize, EnqueueError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(EnqueueError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(EnqueueError::Full(item));
        }
        state.items.push_back(item);
        Ok(state.items.len())
    }

    /// Insert, waiting up to `timeout` for space
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<usize, EnqueueError<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(EnqueueError::Closed(item));
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                return Ok(state.items.len());
            }
            if Instant::now() >= deadline {
                return Err(EnqueueError::TimedOut(item));
            }
            self.not_full.wait_until(&mut state, deadline);
        }
    }

    /// Insert, waiting until space is available or the buffer closes
    pub fn push_blocking(&self, item: T) -> Result<usize, EnqueueError<T>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(EnqueueError::Closed(item));
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                return Ok(state.items.len());
            }
            self.not_full.wait(&mut state);
        }
    }

    /// Remove and return the entire contents
    pub fn drain(&self) -> Vec<T> {
        let batch: Vec<T> = {
            let mut state = self.state.lock();
            state.items.drain(..).collect()
        };
        if !batch.is_empty() {
            self.not_full.notify_all();
        }
        batch
    }

    /// Items currently buffered
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Reject further insertion and wake every blocked producer
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.not_full.notify_all();
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
