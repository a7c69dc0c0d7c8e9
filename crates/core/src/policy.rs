//! Concurrency policy shared by configuration and the worker pool.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How many handlers a worker pool may run at the same time.
///
/// `Unbounded` applies no back-pressure at all: every item taken from the
/// queue is spawned immediately, so in-flight work grows with the producer's
/// rate. It is kept as an explicit choice; `Bounded` is the policy that caps
/// both memory and downstream load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// One item at a time, each handler awaited before the next take.
    Sequential,
    /// Every item dispatched as soon as it is taken.
    Unbounded,
    /// At most `limit` handlers in flight, gated by a counting semaphore.
    Bounded { limit: usize },
}

impl ConcurrencyPolicy {
    /// Shorthand for `Bounded { limit }`.
    pub fn bounded(limit: usize) -> Self {
        Self::Bounded { limit }
    }

    /// Maximum number of in-flight handlers, `None` when unbounded.
    pub fn ceiling(&self) -> Option<usize> {
        match self {
            Self::Sequential => Some(1),
            Self::Unbounded => None,
            Self::Bounded { limit } => Some(*limit),
        }
    }

    /// Short label used in log fields (`concurrency = "bounded"`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sequential => "none",
            Self::Unbounded => "unbounded",
            Self::Bounded { .. } => "bounded",
        }
    }

    /// Parse the textual form used by env overrides and the CLI.
    ///
    /// Accepts `sequential`, `unbounded`, `bounded` (with `default_limit`)
    /// and `bounded:N`.
    pub fn parse(s: &str, default_limit: usize) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "sequential" | "none" => Some(Self::Sequential),
            "unbounded" => Some(Self::Unbounded),
            "bounded" => Some(Self::Bounded {
                limit: default_limit,
            }),
            other => other
                .strip_prefix("bounded:")
                .and_then(|n| n.parse().ok())
                .map(|limit| Self::Bounded { limit }),
        }
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self::Bounded { limit: 4 }
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::Bounded { limit } => write!(f, "bounded:{limit}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_per_policy() {
        assert_eq!(ConcurrencyPolicy::Sequential.ceiling(), Some(1));
        assert_eq!(ConcurrencyPolicy::Unbounded.ceiling(), None);
        assert_eq!(ConcurrencyPolicy::bounded(7).ceiling(), Some(7));
    }

    #[test]
    fn parse_textual_forms() {
        assert_eq!(
            ConcurrencyPolicy::parse("Sequential", 4),
            Some(ConcurrencyPolicy::Sequential)
        );
        assert_eq!(
            ConcurrencyPolicy::parse("bounded", 4),
            Some(ConcurrencyPolicy::bounded(4))
        );
        assert_eq!(
            ConcurrencyPolicy::parse("bounded:16", 4),
            Some(ConcurrencyPolicy::bounded(16))
        );
        assert_eq!(ConcurrencyPolicy::parse("bounded:x", 4), None);
        assert_eq!(ConcurrencyPolicy::parse("fastest", 4), None);
    }

    #[test]
    fn display_matches_parse() {
        for policy in [
            ConcurrencyPolicy::Sequential,
            ConcurrencyPolicy::Unbounded,
            ConcurrencyPolicy::bounded(3),
        ] {
            assert_eq!(ConcurrencyPolicy::parse(&policy.to_string(), 1), Some(policy));
        }
    }
}
