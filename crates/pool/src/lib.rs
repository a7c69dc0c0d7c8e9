//! Worker pool draining an [`AsyncQueue`](spool_queue::AsyncQueue) under a
//! configurable concurrency policy.

pub mod config;
pub mod error;
pub mod pool;
pub mod stats;

pub use config::{FailureCallback, HandlerFailure, PoolConfig, ShutdownMode, WorkerPoolBuilder};
pub use error::PoolError;
pub use pool::WorkerPool;
pub use spool_core::ConcurrencyPolicy;
pub use stats::PoolStats;
