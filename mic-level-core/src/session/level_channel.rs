use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::config::DEFAULT_LEVEL_QUEUE_CAPACITY;

struct QueueState {
    queue: VecDeque<f64>,
    closed: bool,
}

/// Hand-off of level samples from the device callback to consumers.
///
/// The callback is the single writer. Samples are queued in arrival order;
/// when the queue is full the oldest one is dropped. The latest value is
/// kept separately and is always current, whatever the queue dropped.
pub struct LevelChannel {
    latest: AtomicU64,
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl LevelChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LEVEL_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            latest: AtomicU64::new(0f64.to_bits()),
            state: Mutex::new(QueueState {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Record a new level and wake one waiting consumer.
    pub fn publish(&self, level: f64) {
        self.latest.store(level.to_bits(), Ordering::Release);
        {
            let mut state = self.state.lock();
            state.queue.push_back(level);
            if state.queue.len() > self.capacity {
                state.queue.pop_front();
            }
        }
        self.available.notify_one();
    }

    /// Most recently published level, 0.0 before the first one. Never blocks.
    pub fn latest(&self) -> f64 {
        f64::from_bits(self.latest.load(Ordering::Acquire))
    }

    pub fn has_new(&self) -> bool {
        !self.state.lock().queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_new()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard all queued samples. The latest value is kept.
    pub fn clear(&self) {
        self.state.lock().queue.clear();
    }

    /// Pop the oldest queued level, waiting up to `timeout` for one.
    ///
    /// Returns `None` on timeout, or as soon as the channel is closed and
    /// nothing is left to pop.
    pub fn next(&self, timeout: Duration) -> Option<f64> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(level) = state.queue.pop_front() {
                return Some(level);
            }
            if state.closed {
                return None;
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return state.queue.pop_front();
            }
        }
    }

    /// Wake every waiter; `next` stops blocking until `reopen`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn reopen(&self) {
        self.state.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Default for LevelChannel {
    fn default() -> Self {
        Self::new()
    }
}
