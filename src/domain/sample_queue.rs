//! Sample Queue
//!
//! Bounded FIFO of decoded accelerometer samples shared between the
//! streaming loop (producer) and any number of readers.

use crate::domain::models::Sample;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default number of samples retained
pub const DEFAULT_CAPACITY: usize = 300;

/// Overwrite-on-full sample buffer.
///
/// Cloning yields another handle to the same storage. `enqueue` never
/// blocks on a full queue: the oldest sample is evicted to make room.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    inner: Arc<Mutex<VecDeque<Sample>>>,
    capacity: usize,
}

impl SampleQueue {
    /// Create a queue holding at most `capacity` samples (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    // A panicking reader cannot leave the deque half-updated, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Sample>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, sample: Sample) {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(sample);
    }

    /// Take the oldest sample, `None` if empty
    pub fn dequeue(&self) -> Option<Sample> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Remove and return everything currently buffered, oldest first
    pub fn drain(&self) -> Vec<Sample> {
        self.lock().drain(..).collect()
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
