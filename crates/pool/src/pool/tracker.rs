use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use super::PoolShared;

/// Accounts for one handler task from dispatch to its terminal state.
///
/// Created before the task is spawned and moved into its body, so it is
/// dropped whether the body completes, is cancelled before its first poll,
/// or unwinds from a panic. The in-flight count is released before the
/// concurrency permit.
pub(super) struct Tracker {
    shared: Arc<PoolShared>,
    item: String,
    settled: bool,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Tracker {
    pub fn begin(shared: Arc<PoolShared>, item: String, permit: Option<OwnedSemaphorePermit>) -> Self {
        let counters = &shared.counters;
        shared.in_flight.send_modify(|n| {
            *n += 1;
            counters.peak_in_flight.fetch_max(*n, Ordering::Relaxed);
        });
        Self {
            shared,
            item,
            settled: false,
            _permit: permit,
        }
    }

    pub fn finish(&mut self, result: &Result<(), String>) {
        self.settled = true;
        match result {
            Ok(()) => {
                self.shared.counters.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                self.shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.shared.report_failure(&self.item, error);
            }
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if !self.settled {
            if std::thread::panicking() {
                self.shared.counters.panicked.fetch_add(1, Ordering::Relaxed);
                self.shared.report_failure(&self.item, "handler panicked");
            } else {
                self.shared.counters.cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.shared.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}
