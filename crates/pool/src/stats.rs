//! Pool counters.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Items handed to a handler task.
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub panicked: u64,
    /// Items taken from the queue but discarded by a cancelling shutdown.
    pub dropped: u64,
    /// Handlers running right now.
    pub in_flight: usize,
    /// Highest number of handlers ever running at once.
    pub peak_in_flight: usize,
}

impl PoolStats {
    /// Handlers that reached a terminal state.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled + self.panicked
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub dispatched: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub panicked: AtomicU64,
    pub dropped: AtomicU64,
    pub peak_in_flight: AtomicUsize,
}

impl Counters {
    pub fn snapshot(&self, in_flight: usize) -> PoolStats {
        PoolStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            in_flight,
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
        }
    }
}
