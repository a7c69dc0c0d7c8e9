use spool_queue::QueueError;
use thiserror::Error;

/// Errors surfaced by a worker pool as a whole.
///
/// Individual handler failures are not pool errors unless fail-fast is on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("fail-fast: handler failed on {item}: {error}")]
    FailFast { item: String, error: String },

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("dispatcher error: {0}")]
    Dispatcher(String),
}
