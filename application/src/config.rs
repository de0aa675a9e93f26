//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//! when buffered text is flushed, how long outbound messages may be, and how
//! long idle sessions are kept.

use std::time::Duration;

/// Delivery behavior of the event router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Buffered assistant text at or above this many characters is flushed
    /// without waiting for the completion signal.
    pub chunk_threshold: usize,
    /// Ceiling for one outbound message, in characters.
    pub max_message_length: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            chunk_threshold: 3000,
            max_message_length: 4000,
        }
    }
}

/// Retention policy of the cleanup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// How often the sweep runs.
    pub interval: Duration,
    /// Sessions idle for longer than this are forgotten.
    pub max_session_age: Duration,
}

impl CleanupPolicy {
    pub fn from_hours(interval_secs: u64, max_session_age_hours: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            max_session_age: Duration::from_secs(max_session_age_hours * 3600),
        }
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::from_hours(3600, 168)
    }
}
