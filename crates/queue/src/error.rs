//! Queue error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was closed: no more offers, and nothing left to take.
    #[error("queue closed")]
    Closed,

    #[error("queue full")]
    Full,

    #[error("batch of {len} items exceeds queue capacity {capacity}")]
    BatchTooLarge { len: usize, capacity: usize },

    #[error("invalid batch range: min {min}, max {max}")]
    InvalidRange { min: usize, max: usize },
}
