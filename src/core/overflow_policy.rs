//! Overflow policies for request queue management
//!
//! When a request queue reaches its limit, these policies determine how
//! new events are admitted. Overflow is never reported as an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::log_event::LogEvent;

/// Policy for handling request queue overflow
///
/// # Example
///
/// ```
/// use rust_log_targets::OverflowPolicy;
///
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::Discard);
///
/// let policy: OverflowPolicy = "block".parse().unwrap();
/// assert_eq!(policy, OverflowPolicy::Block);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Drop the oldest queued event to make room for the new one
    ///
    /// The dropped event's continuation completes without error.
    #[default]
    Discard,

    /// Admit the event and double the queue limit
    Grow,

    /// Block the producer until the consumer makes room
    ///
    /// Warning: This couples producer latency to consumer throughput.
    Block,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Discard => write!(f, "Discard"),
            OverflowPolicy::Grow => write!(f, "Grow"),
            OverflowPolicy::Block => write!(f, "Block"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discard" => Ok(OverflowPolicy::Discard),
            "grow" => Ok(OverflowPolicy::Grow),
            "block" => Ok(OverflowPolicy::Block),
            _ => Err(format!("Invalid overflow policy: '{}'", s)),
        }
    }
}

/// Callback for events dropped by the `Discard` policy
pub type DroppedCallback = Arc<dyn Fn(&Arc<LogEvent>) + Send + Sync>;

/// Callback for limit increases under the `Grow` policy; receives the new limit
pub type GrewCallback = Arc<dyn Fn(usize) + Send + Sync>;
