//! Forward only the events a predicate accepts

use crate::core::{AsyncLogEvent, Condition, LogEvent, Result, Target, TargetRef};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Routes events matching `condition` to the wrapped target and completes the
/// rest without error
///
/// # Example
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::wrappers::FilteringTargetWrapper;
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemoryTarget::new("memory"));
/// let errors_only = FilteringTargetWrapper::new("errors", memory.clone(), |e: &LogEvent| {
///     e.level >= LogLevel::Error
/// });
///
/// errors_only.write(AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Info, "app", "skip")));
/// errors_only.write(AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Error, "app", "keep")));
/// assert_eq!(memory.messages(), vec!["keep"]);
/// ```
pub struct FilteringTargetWrapper {
    name: String,
    wrapped: TargetRef,
    condition: Condition,
    filtered: AtomicU64,
}

impl FilteringTargetWrapper {
    pub fn new<F>(name: impl Into<String>, wrapped: TargetRef, condition: F) -> Self
    where
        F: Fn(&LogEvent) -> bool + Send + Sync + 'static,
    {
        Self::with_condition(name, wrapped, Arc::new(condition))
    }

    pub fn with_condition(name: impl Into<String>, wrapped: TargetRef, condition: Condition) -> Self {
        Self {
            name: name.into(),
            wrapped,
            condition,
            filtered: AtomicU64::new(0),
        }
    }

    /// Events rejected by the condition
    pub fn filtered_count(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    fn accepts(&self, event: &AsyncLogEvent) -> bool {
        if (self.condition)(&event.event) {
            true
        } else {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

impl Target for FilteringTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<()> {
        self.wrapped.initialize()
    }

    fn write(&self, event: AsyncLogEvent) {
        if self.accepts(&event) {
            self.wrapped.write(event);
        } else {
            event.complete(None);
        }
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        let (accepted, rejected): (Vec<_>, Vec<_>) =
            events.into_iter().partition(|event| self.accepts(event));
        for event in rejected {
            event.complete(None);
        }
        if !accepted.is_empty() {
            self.wrapped.write_batch(accepted);
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.wrapped.flush(timeout)
    }

    fn close(&self) {
        self.wrapped.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Continuation, LogLevel};
    use crate::targets::MemoryTarget;

    #[test]
    fn test_rejected_events_complete() {
        let memory = Arc::new(MemoryTarget::new("memory"));
        let filtering =
            FilteringTargetWrapper::new("filter", memory.clone(), |e: &LogEvent| e.logger_name == "db");

        let (continuation, outcome) = Continuation::channel();
        filtering.write(AsyncLogEvent::new(
            LogEvent::new(LogLevel::Info, "http", "request"),
            continuation,
        ));
        assert_eq!(outcome.try_recv().unwrap(), None);
        assert!(memory.is_empty());
        assert_eq!(filtering.filtered_count(), 1);
    }

    #[test]
    fn test_batch_partition() {
        let memory = Arc::new(MemoryTarget::new("memory"));
        let filtering = FilteringTargetWrapper::new("filter", memory.clone(), |e: &LogEvent| {
            e.level >= LogLevel::Warn
        });

        let batch = LogLevel::ALL
            .iter()
            .map(|level| AsyncLogEvent::fire_and_forget(LogEvent::new(*level, "app", level.to_str())))
            .collect();
        filtering.write_batch(batch);

        assert_eq!(memory.messages(), vec!["WARN", "ERROR", "FATAL"]);
        assert_eq!(filtering.filtered_count(), 3);
    }
}
