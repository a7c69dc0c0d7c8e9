//! Runtime configuration for queues, pools and flush buffers.
//!
//! Parsed from `spool.toml`, then overridden by `SPOOL_*` environment
//! variables (optionally loaded from a `.env` file).

mod loading;
mod types;
mod validation;


pub use loading::load_dotenv;
pub use types::{FlushSettings, PoolSettings, QueueSettings, SpoolConfig};
