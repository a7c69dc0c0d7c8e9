pub mod error;
pub mod flush;
pub mod queue;
pub mod sink;

pub use error::QueueError;
pub use flush::{FlushBuffer, FlushStats, MIN_WINDOW};
pub use queue::AsyncQueue;
pub use sink::Sink;
