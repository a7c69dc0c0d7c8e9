use std::path::Path;

use tracing::warn;

use crate::error::SpoolError;
use crate::policy::ConcurrencyPolicy;

use super::types::SpoolConfig;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_opt(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

impl SpoolConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SpoolError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpoolError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from defaults plus environment overrides (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, SpoolError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `SPOOL_SECTION_KEY` overrides `section.key`.
    /// - `SPOOL_QUEUE_CAPACITY` -> `queue.capacity` (`0` or `unbounded` clears it)
    /// - `SPOOL_POOL_POLICY` -> `pool.policy` (`sequential`, `unbounded`, `bounded`, `bounded:N`)
    /// - `SPOOL_POOL_LIMIT` -> limit of a bounded `pool.policy`
    /// - `SPOOL_POOL_BATCH_SIZE` -> `pool.batch_size`
    /// - `SPOOL_POOL_DRAIN_ON_SHUTDOWN` -> `pool.drain_on_shutdown`
    /// - `SPOOL_POOL_FAIL_FAST` -> `pool.fail_fast`
    /// - `SPOOL_FLUSH_WINDOW_MS` -> `flush.window_ms`
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("SPOOL_QUEUE_CAPACITY") {
            match v.as_str() {
                "0" | "unbounded" => self.queue.capacity = None,
                other => match other.parse::<usize>() {
                    Ok(cap) => self.queue.capacity = Some(cap),
                    Err(_) => warn!(value = %other, "ignoring unparseable SPOOL_QUEUE_CAPACITY"),
                },
            }
        }

        let current_limit = self.pool.policy.ceiling().unwrap_or(4);
        if let Some(v) = env_opt("SPOOL_POOL_POLICY") {
            match ConcurrencyPolicy::parse(&v, current_limit) {
                Some(policy) => self.pool.policy = policy,
                None => warn!(value = %v, "ignoring unknown SPOOL_POOL_POLICY"),
            }
        }
        if let Some(limit) = env_parsed::<usize>("SPOOL_POOL_LIMIT") {
            if let ConcurrencyPolicy::Bounded { limit: l } = &mut self.pool.policy {
                *l = limit;
            }
        }
        if let Some(size) = env_parsed("SPOOL_POOL_BATCH_SIZE") {
            self.pool.batch_size = size;
        }
        if let Some(drain) = env_parsed("SPOOL_POOL_DRAIN_ON_SHUTDOWN") {
            self.pool.drain_on_shutdown = drain;
        }
        if let Some(fail_fast) = env_parsed("SPOOL_POOL_FAIL_FAST") {
            self.pool.fail_fast = fail_fast;
        }
        if let Some(window) = env_parsed("SPOOL_FLUSH_WINDOW_MS") {
            self.flush.window_ms = window;
        }
    }
}
