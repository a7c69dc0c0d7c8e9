//! Pool configuration and its fluent builder.

use std::fmt;
use std::sync::Arc;

use spool_core::{ConcurrencyPolicy, PoolSettings};

// ── Failure reporting ────────────────────────────────────────────────

/// A handler that returned an error (or panicked) on one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub pool: String,
    /// Debug rendering of the item being processed.
    pub item: String,
    pub error: String,
}

/// Invoked synchronously from the handler task for every failure.
pub type FailureCallback = Arc<dyn Fn(&HandlerFailure) + Send + Sync>;

// ── Shutdown ─────────────────────────────────────────────────────────

/// How [`WorkerPool::shutdown_with`](crate::WorkerPool::shutdown_with) stops the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop taking from the queue, dispatch what was already taken, and let
    /// running handlers finish.
    Drain,
    /// Stop taking from the queue and cancel running handlers. Items taken
    /// but not yet dispatched are dropped.
    Cancel,
}

// ── PoolConfig ───────────────────────────────────────────────────────

/// Finished pool configuration, produced by [`WorkerPoolBuilder::build`].
#[derive(Clone)]
pub struct PoolConfig {
    pub name: String,
    pub policy: ConcurrencyPolicy,
    /// Upper bound on items taken from the queue per dispatch round.
    pub batch_size: usize,
    pub shutdown_mode: ShutdownMode,
    /// Stop the whole pool on the first handler failure.
    pub fail_fast: bool,
    pub on_failure: Option<FailureCallback>,
}

impl PoolConfig {
    /// Build a config from file/env settings.
    pub fn from_settings(name: impl Into<String>, settings: &PoolSettings) -> Self {
        WorkerPoolBuilder::new(name)
            .policy(settings.policy)
            .batch_size(settings.batch_size)
            .drain_on_shutdown(settings.drain_on_shutdown)
            .fail_fast(settings.fail_fast)
            .build()
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("batch_size", &self.batch_size)
            .field("shutdown_mode", &self.shutdown_mode)
            .field("fail_fast", &self.fail_fast)
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

// ── WorkerPoolBuilder ────────────────────────────────────────────────

/// Fluent builder for a [`PoolConfig`].
///
/// # Example
/// ```ignore
/// let config = WorkerPoolBuilder::new("numbers")
///     .policy(ConcurrencyPolicy::bounded(4))
///     .on_failure(|f| eprintln!("{} failed: {}", f.item, f.error))
///     .build();
/// let pool = WorkerPool::start(queue, handler, config, &runtime);
/// ```
pub struct WorkerPoolBuilder {
    name: String,
    policy: ConcurrencyPolicy,
    batch_size: usize,
    shutdown_mode: ShutdownMode,
    fail_fast: bool,
    on_failure: Option<FailureCallback>,
}

impl WorkerPoolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: ConcurrencyPolicy::default(),
            batch_size: 100,
            shutdown_mode: ShutdownMode::Drain,
            fail_fast: false,
            on_failure: None,
        }
    }

    pub fn policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the most items taken per dispatch round (default: 100, minimum 1).
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Choose between [`ShutdownMode::Drain`] (default) and
    /// [`ShutdownMode::Cancel`] for [`WorkerPool::shutdown`](crate::WorkerPool::shutdown).
    pub fn drain_on_shutdown(mut self, drain: bool) -> Self {
        self.shutdown_mode = if drain {
            ShutdownMode::Drain
        } else {
            ShutdownMode::Cancel
        };
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> PoolConfig {
        PoolConfig {
            name: self.name,
            policy: self.policy,
            batch_size: self.batch_size,
            shutdown_mode: self.shutdown_mode,
            fail_fast: self.fail_fast,
            on_failure: self.on_failure,
        }
    }
}
