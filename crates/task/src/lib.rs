//! Cancellable tasks, single-assignment deferred values and cancellation
//! scopes on top of tokio.

pub mod deferred;
pub mod error;
pub mod outcome;
pub mod runtime;
pub mod scope;
pub mod sleep;
pub mod task;

pub use deferred::Deferred;
pub use error::TaskError;
pub use outcome::Outcome;
pub use runtime::Runtime;
pub use scope::Scope;
pub use sleep::{shield, sleep, yield_now, MAX_SLEEP};
pub use task::{Task, TaskBuilder, TaskContext, TaskHandle, TaskId};
