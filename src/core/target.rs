//! Target trait shared by leaf sinks, wrappers and groups

use super::continuation::AsyncLogEvent;
use super::error::Result;
use super::log_event::LogEvent;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for flushes triggered by `close`
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Destination for log events.
///
/// Methods take `&self` so a target can be shared with the continuation
/// closures that resubmit events to it; implementations use interior
/// mutability. Delivery outcomes are reported through each event's
/// continuation, never through a return value of `write`.
///
/// # Example
///
/// ```
/// use rust_log_targets::core::{AsyncLogEvent, Result, Target};
/// use std::time::Duration;
///
/// struct Discarding;
///
/// impl Target for Discarding {
///     fn name(&self) -> &str {
///         "discarding"
///     }
///
///     fn write(&self, event: AsyncLogEvent) {
///         event.complete(None);
///     }
///
///     fn flush(&self, _timeout: Duration) -> Result<()> {
///         Ok(())
///     }
///
///     fn close(&self) {}
/// }
/// ```
pub trait Target: Send + Sync {
    fn name(&self) -> &str;

    /// Validate configuration and start any background machinery.
    ///
    /// Wrappers initialize their children first.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Deliver one event; its continuation is completed exactly once
    fn write(&self, event: AsyncLogEvent);

    /// Deliver a batch of events
    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        for event in events {
            self.write(event);
        }
    }

    /// Push pending events downstream, bounded by `timeout`
    fn flush(&self, timeout: Duration) -> Result<()>;

    /// Flush what remains, stop background work and close children
    fn close(&self);
}

/// Shared handle to a target
pub type TargetRef = Arc<dyn Target>;

/// Opaque routing predicate
pub type Condition = Arc<dyn Fn(&LogEvent) -> bool + Send + Sync>;

/// Initialize every child, stopping at the first failure
pub(crate) fn initialize_all(targets: &[TargetRef]) -> Result<()> {
    targets.iter().try_for_each(|target| target.initialize())
}

/// Flush every child within one shared deadline, returning the first error
pub(crate) fn flush_all(targets: &[TargetRef], timeout: Duration) -> Result<()> {
    let deadline = std::time::Instant::now() + timeout;
    let mut first_error = None;
    for target in targets {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if let Err(e) = target.flush(remaining) {
            tracing::warn!(target_name = target.name(), error = %e, "child flush failed");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

pub(crate) fn close_all(targets: &[TargetRef]) {
    for target in targets {
        target.close();
    }
}
