use std::time::Duration;

use thiserror::Error;

/// Terminal non-success states of a task, as seen by `?`-style callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError<E> {
    #[error("task failed: {0}")]
    Failed(E),

    #[error("task cancelled")]
    Cancelled,

    #[error("task timed out after {0:?}")]
    TimedOut(Duration),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl<E> TaskError<E> {
    /// Whether the task was interrupted (explicit cancel or timeout).
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut(_))
    }
}
