//! Worker pool runtime.
//!
//! A [`WorkerPool`] owns one dispatcher task that takes items from an
//! [`AsyncQueue`] and spawns a handler task per item, admitting them through
//! a semaphore sized by the [`ConcurrencyPolicy`]. Handler tasks live in a
//! scope of their own so that shutdown can stop the dispatcher without
//! touching them (drain) or cancel both (cancel).
//!
//! Split into:
//! - `dispatch`: the dispatcher loop and per-item spawning
//! - `tracker`: in-flight accounting and failure reporting per handler

mod dispatch;
mod tracker;


use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use spool_core::ConcurrencyPolicy;
use spool_queue::AsyncQueue;
use spool_task::{Outcome, Runtime, Scope, TaskHandle};
use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{FailureCallback, HandlerFailure, PoolConfig, ShutdownMode};
use crate::error::PoolError;
use crate::stats::{Counters, PoolStats};

use dispatch::Dispatcher;

// ── Shared state ─────────────────────────────────────────────────────

/// State shared by the pool handle, the dispatcher and every handler task.
pub(crate) struct PoolShared {
    pub name: String,
    pub counters: Counters,
    pub in_flight: watch::Sender<usize>,
    first_failure: Mutex<Option<HandlerFailure>>,
    /// Whether items already taken are still dispatched once stopping.
    draining: AtomicBool,
    fail_fast: bool,
    on_failure: Option<FailureCallback>,
    pub dispatch_scope: Scope,
    pub handler_scope: Scope,
}

impl PoolShared {
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    fn first_failure(&self) -> Option<HandlerFailure> {
        self.first_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Items taken from the queue that will never reach a handler.
    pub fn drop_items(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.counters
            .dropped
            .fetch_add(count as u64, Ordering::Relaxed);
        warn!(pool = %self.name, dropped = count, "shutdown dropped undispatched items");
    }

    pub fn report_failure(&self, item: &str, error: &str) {
        warn!(pool = %self.name, item = %item, error = %error, "handler failed");

        let failure = HandlerFailure {
            pool: self.name.clone(),
            item: item.to_string(),
            error: error.to_string(),
        };
        if let Some(callback) = &self.on_failure {
            callback(&failure);
        }

        if self.fail_fast {
            let mut first = self
                .first_failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if first.is_none() {
                error!(pool = %self.name, item = %item, "fail-fast: stopping pool");
                *first = Some(failure);
                drop(first);
                self.stop(ShutdownMode::Cancel);
            }
        }
    }

    fn stop(&self, mode: ShutdownMode) {
        self.draining
            .store(mode == ShutdownMode::Drain, Ordering::Release);
        self.dispatch_scope.cancel();
        if mode == ShutdownMode::Cancel {
            self.handler_scope.cancel();
        }
    }

    fn stats(&self) -> PoolStats {
        self.counters.snapshot(*self.in_flight.borrow())
    }
}

// ── WorkerPool ───────────────────────────────────────────────────────

/// Handle to a running worker pool.
///
/// Dropping the handle does not stop the pool; it runs until its queue is
/// closed and drained, or its runtime scope is cancelled.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    dispatcher: TaskHandle<(), PoolError>,
    policy: ConcurrencyPolicy,
    shutdown_mode: ShutdownMode,
}

impl WorkerPool {
    /// Start draining `queue` with `handler`.
    ///
    /// Every item taken is processed by exactly one handler invocation.
    /// Handler errors are logged and counted; they only stop the pool when
    /// `fail_fast` is set.
    pub fn start<T, H, Fut, E>(
        queue: AsyncQueue<T>,
        handler: H,
        config: PoolConfig,
        runtime: &Runtime,
    ) -> Self
    where
        T: fmt::Debug + Send + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (in_flight, _) = watch::channel(0usize);
        let shared = Arc::new(PoolShared {
            name: config.name.clone(),
            counters: Counters::default(),
            in_flight,
            first_failure: Mutex::new(None),
            draining: AtomicBool::new(true),
            fail_fast: config.fail_fast,
            on_failure: config.on_failure.clone(),
            dispatch_scope: runtime.scope().child(),
            handler_scope: runtime.scope().child(),
        });

        let span = info_span!(
            "pool",
            pool = %config.name,
            concurrency = config.policy.label()
        );
        let dispatcher = Dispatcher {
            queue,
            handler,
            shared: Arc::clone(&shared),
            runtime: runtime.clone(),
            policy: config.policy,
            batch_size: config.batch_size,
            span: span.clone(),
        };
        let dispatcher = runtime
            .task(format!("{}-dispatcher", config.name))
            .scope(&shared.dispatch_scope)
            .spawn_cooperative(move |ctx| dispatcher.run(ctx).instrument(span));

        info!(
            pool = %config.name,
            policy = %config.policy,
            batch_size = config.batch_size,
            "worker pool started"
        );

        Self {
            shared,
            dispatcher,
            policy: config.policy,
            shutdown_mode: config.shutdown_mode,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Whether the dispatcher is still taking items.
    pub fn is_running(&self) -> bool {
        !self.dispatcher.is_done()
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Wait until no handler is running.
    ///
    /// While the dispatcher is still active this is only a momentary state;
    /// use [`await_all`](Self::await_all) to wait for the pool to finish.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Wait for the dispatcher to stop and every dispatched handler to
    /// reach a terminal state.
    ///
    /// The dispatcher stops once the queue is closed and empty, or after a
    /// shutdown.
    pub async fn await_all(&self) -> Result<PoolStats, PoolError> {
        let dispatcher = self.dispatcher.join().await;
        self.wait_idle().await;

        if let Some(failure) = self.shared.first_failure() {
            return Err(PoolError::FailFast {
                item: failure.item,
                error: failure.error,
            });
        }
        match dispatcher {
            Outcome::Failed(e) => Err(e),
            Outcome::Panicked(message) => Err(PoolError::Dispatcher(message)),
            _ => {
                let stats = self.stats();
                info!(
                    pool = %self.shared.name,
                    dispatched = stats.dispatched,
                    succeeded = stats.succeeded,
                    failed = stats.failed,
                    cancelled = stats.cancelled,
                    "worker pool finished"
                );
                Ok(stats)
            }
        }
    }

    /// Shut down with the configured [`ShutdownMode`].
    pub async fn shutdown(&self) -> Result<PoolStats, PoolError> {
        self.shutdown_with(self.shutdown_mode).await
    }

    /// Stop taking from the queue and wait for the pool to settle.
    pub async fn shutdown_with(&self, mode: ShutdownMode) -> Result<PoolStats, PoolError> {
        info!(pool = %self.shared.name, mode = ?mode, "worker pool shutting down");
        self.shared.stop(mode);
        self.await_all().await
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("policy", &self.policy)
            .field("running", &self.is_running())
            .finish()
    }
}
