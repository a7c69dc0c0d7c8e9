//! Terminal state of a task.

use std::time::Duration;

use crate::error::TaskError;

/// How a task ended.
///
/// A task that has not ended yet has no `Outcome`; "pending" is the absence
/// of a value in its [`Deferred`](crate::Deferred).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The body returned `Ok`.
    Succeeded(T),
    /// The body returned `Err`. Never produced by interruption.
    Failed(E),
    /// The task was cancelled before its body finished.
    Cancelled,
    /// The task's deadline elapsed and it was cancelled.
    TimedOut(Duration),
    /// The body panicked; carries the panic message.
    Panicked(String),
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// True for both explicit cancellation and timeout.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut(_))
    }

    /// Short name of the variant, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut(_) => "timed_out",
            Self::Panicked(_) => "panicked",
        }
    }

    pub fn into_result(self) -> Result<T, TaskError<E>> {
        match self {
            Self::Succeeded(v) => Ok(v),
            Self::Failed(e) => Err(TaskError::Failed(e)),
            Self::Cancelled => Err(TaskError::Cancelled),
            Self::TimedOut(d) => Err(TaskError::TimedOut(d)),
            Self::Panicked(msg) => Err(TaskError::Panicked(msg)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Self::Succeeded(v) => Outcome::Succeeded(f(v)),
            Self::Failed(e) => Outcome::Failed(e),
            Self::Cancelled => Outcome::Cancelled,
            Self::TimedOut(d) => Outcome::TimedOut(d),
            Self::Panicked(msg) => Outcome::Panicked(msg),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Succeeded(v),
            Err(e) => Self::Failed(e),
        }
    }
}
