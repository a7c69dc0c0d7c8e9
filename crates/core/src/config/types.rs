use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::ConcurrencyPolicy;

// ── Top-level config ────────────────────────────────────────────────

/// Full configuration consumed by the concurrency core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpoolConfig {
    /// Work queue settings.
    #[serde(default)]
    pub queue: QueueSettings,

    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolSettings,

    /// Scheduled flush buffer settings.
    #[serde(default)]
    pub flush: FlushSettings,
}

// ── Section configs ─────────────────────────────────────────────────

/// Queue section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Maximum number of buffered items. Absent = unbounded.
    #[serde(default)]
    pub capacity: Option<usize>,
}

/// Pool section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Concurrency policy (`kind = "sequential" | "unbounded" | "bounded"`).
    #[serde(default)]
    pub policy: ConcurrencyPolicy,

    /// Maximum number of items taken from the queue per dispatch round.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Let in-flight handlers finish on shutdown (`false` = cancel them).
    #[serde(default = "default_drain_on_shutdown")]
    pub drain_on_shutdown: bool,

    /// Stop the pool on the first handler failure.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_batch_size() -> usize {
    100
}

fn default_drain_on_shutdown() -> bool {
    true
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            policy: ConcurrencyPolicy::default(),
            batch_size: default_batch_size(),
            drain_on_shutdown: default_drain_on_shutdown(),
            fail_fast: false,
        }
    }
}

/// Flush buffer section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushSettings {
    /// Interval between scheduled flushes, in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_window_ms() -> u64 {
    2_000
}

impl FlushSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
        }
    }
}
