//! Scheduled flush buffer.
//!
//! Items emitted into a [`FlushBuffer`] accumulate in an [`AsyncQueue`]. A
//! periodic timer task drains the queue every `window` and forwards the
//! batch to a [`Sink`]. Closing (or dropping) the buffer cancels that timer
//! and performs one final drain, so nothing emitted is lost.
//!
//! The timer runs in its own detached scope: cancelling the scope of
//! whoever started the buffer does not stop delivery.
//!
//! If the timer task dies (a panicking sink), the queue is closed so that
//! further emits fail with `Closed` instead of piling up undelivered.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use spool_task::{Outcome, Runtime, Scope, TaskContext, TaskHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::queue::AsyncQueue;
use crate::sink::Sink;

/// Delivery counters for a flush buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Non-empty batches handed to the sink, final flush included.
    pub flushes: u64,
    /// Items handed to the sink.
    pub items: u64,
    /// When the last non-empty batch was delivered.
    pub last_flush: Option<Instant>,
}

impl FlushStats {
    fn record(&mut self, batch_len: usize) {
        self.flushes += 1;
        self.items += batch_len as u64;
        self.last_flush = Some(Instant::now());
    }
}

type SharedStats = Arc<Mutex<FlushStats>>;

/// Shortest accepted flush window; shorter ones (including zero) are raised.
pub const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Batches items and forwards them to a sink on a fixed cadence.
pub struct FlushBuffer<T> {
    queue: AsyncQueue<T>,
    timer: TaskHandle<(), Infallible>,
    stats: SharedStats,
    window: Duration,
}

impl<T: Send + 'static> FlushBuffer<T> {
    /// Start a buffer over a fresh unbounded queue.
    pub fn start<S: Sink<T>>(window: Duration, sink: S, runtime: &Runtime) -> Self {
        Self::with_queue(AsyncQueue::unbounded(), window, sink, runtime)
    }

    /// Start a buffer over `queue` (use a bounded queue for back-pressure).
    ///
    /// `window` is raised to [`MIN_WINDOW`] if shorter.
    pub fn with_queue<S: Sink<T>>(
        queue: AsyncQueue<T>,
        window: Duration,
        sink: S,
        runtime: &Runtime,
    ) -> Self {
        if window < MIN_WINDOW {
            warn!(requested = ?window, min = ?MIN_WINDOW, "flush window too short, raised");
        }
        let window = window.max(MIN_WINDOW);
        let stats = SharedStats::default();
        let timer_queue = queue.clone();
        let timer_stats = Arc::clone(&stats);

        // Deliberately not a child of `runtime.scope()`.
        let timer = runtime
            .task("flush-buffer")
            .scope(&Scope::detached())
            .spawn_cooperative(move |ctx| run_timer(ctx, timer_queue, sink, window, timer_stats));

        debug!(window = ?window, "flush buffer started");
        Self {
            queue,
            timer,
            stats,
            window,
        }
    }

    /// Buffer an item without waiting.
    ///
    /// Fails with `Closed` after shutdown, or `Full` when a bounded queue is
    /// at capacity.
    pub fn emit(&self, item: T) -> Result<(), QueueError> {
        self.queue.try_offer(item)
    }

    /// Buffer an item, waiting for room in a bounded queue.
    pub async fn offer(&self, item: T) -> Result<(), QueueError> {
        self.queue.offer(item).await
    }

    /// Items emitted but not yet delivered.
    pub fn pending(&self) -> usize {
        self.queue.size()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Non-empty batches delivered so far.
    pub fn flush_count(&self) -> u64 {
        self.stats().flushes
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the timer, deliver everything still buffered, and wait for the
    /// sink to be closed.
    ///
    /// If the timer had already died, whatever is still buffered cannot be
    /// delivered; that is logged as a warning.
    pub async fn close(self) -> FlushStats {
        self.timer.cancel();
        match self.timer.join().await {
            Outcome::Succeeded(()) | Outcome::Cancelled => {}
            other => {
                self.queue.close();
                warn!(
                    outcome = other.kind(),
                    undelivered = self.queue.size(),
                    "flush timer ended abnormally"
                );
            }
        }
        self.stats()
    }
}

impl<T> Drop for FlushBuffer<T> {
    fn drop(&mut self) {
        // The timer task performs the final drain on its way out.
        self.timer.cancel();
    }
}

async fn run_timer<T, S>(
    ctx: TaskContext,
    queue: AsyncQueue<T>,
    sink: S,
    window: Duration,
    stats: SharedStats,
) -> Result<(), Infallible>
where
    T: Send + 'static,
    S: Sink<T>,
{
    let _closer = CloseOnExit(queue.clone());
    let mut ticker = tokio::time::interval(window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // Cancellation is only observed between flushes, never mid-write.
        deliver(&queue, &sink, &stats, false).await;
    }

    queue.close();
    deliver(&queue, &sink, &stats, true).await;
    sink.close().await;

    let stats = stats.lock().unwrap_or_else(PoisonError::into_inner).clone();
    debug!(flushes = stats.flushes, items = stats.items, "flush buffer closed");
    Ok(())
}

/// Closes the queue however the timer task ends, unwinding included.
struct CloseOnExit<T>(AsyncQueue<T>);

impl<T> Drop for CloseOnExit<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

async fn deliver<T, S>(queue: &AsyncQueue<T>, sink: &S, stats: &SharedStats, last: bool)
where
    T: Send + 'static,
    S: Sink<T>,
{
    let batch = queue.take_all();
    if batch.is_empty() {
        return;
    }
    let len = batch.len();
    if last {
        debug!(items = len, "final flush");
    } else {
        debug!(items = len, "scheduled flush");
    }
    sink.write(batch).await;
    stats
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(len);
    if last && !queue.is_empty() {
        warn!(items = queue.size(), "items left behind after final flush");
    }
}
