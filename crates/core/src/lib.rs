pub mod config;
pub mod error;
pub mod policy;

pub use config::{FlushSettings, PoolSettings, QueueSettings, SpoolConfig};
pub use error::SpoolError;
pub use policy::ConcurrencyPolicy;
