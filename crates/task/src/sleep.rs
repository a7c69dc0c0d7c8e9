//! Suspension helpers: timers, yield points and uninterruptible regions.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Longest single timer wait; longer requests are clamped.
pub const MAX_SLEEP: Duration = Duration::from_millis((1 << 31) - 1);

/// Suspend the current task for `duration`.
///
/// This is a cancellation point. If the task is cancelled while sleeping,
/// the timer is released and `"sleep interrupted, timer released"` is
/// logged before the task's outcome is published.
pub async fn sleep(duration: Duration) {
    let duration = duration.min(MAX_SLEEP);
    let mut timer = TimerGuard {
        requested: duration,
        elapsed: false,
    };
    tokio::time::sleep(duration).await;
    timer.elapsed = true;
}

/// Drop guard standing in for the timer's cleanup callback.
struct TimerGuard {
    requested: Duration,
    elapsed: bool,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if !self.elapsed {
            warn!(requested = ?self.requested, "sleep interrupted, timer released");
        }
    }
}

/// Give every other ready task a turn before continuing.
///
/// Call this after forking a task whose first steps must be observed
/// before the parent proceeds.
pub async fn yield_now() {
    tokio::task::yield_now().await
}

/// Run `future` to completion even if the awaiting task is cancelled.
///
/// The future runs on its own tokio task; cancelling the caller only stops
/// the caller from waiting. Returns `None` if the shielded future panicked.
pub async fn shield<F>(future: F) -> Option<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(output) => Some(output),
        Err(e) => {
            debug!(error = %e, "shielded future did not complete");
            None
        }
    }
}
