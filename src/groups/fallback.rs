//! Failover across an ordered list of targets

use crate::core::target::{close_all, flush_all, initialize_all};
use crate::core::{AsyncLogEvent, Continuation, LogEvent, Result, Target, TargetError, TargetRef};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Go back to the first target after any successful write
    pub return_to_first_on_success: bool,
    /// Send batches to the current target in one call
    pub enable_batch_write: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            return_to_first_on_success: false,
            enable_batch_write: true,
        }
    }
}

impl FallbackConfig {
    #[must_use]
    pub fn with_return_to_first_on_success(mut self, enabled: bool) -> Self {
        self.return_to_first_on_success = enabled;
        self
    }

    #[must_use]
    pub fn with_batch_write(mut self, enabled: bool) -> Self {
        self.enable_batch_write = enabled;
        self
    }
}

struct FallbackShared {
    name: String,
    targets: Vec<TargetRef>,
    config: FallbackConfig,
    current: AtomicUsize,
}

impl FallbackShared {
    /// Wrap `event` so a failure at `index` moves on to the next target.
    /// `tried` counts the targets this event has already failed on.
    fn wrap(self: &Arc<Self>, event: AsyncLogEvent, index: usize, tried: usize) -> AsyncLogEvent {
        let shared = Arc::clone(self);
        event.map_continuation(move |log_event, original| {
            Continuation::new(move |error| match error {
                None => {
                    if shared.config.return_to_first_on_success && index != 0 {
                        let _ = shared.current.compare_exchange(
                            index,
                            0,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                    }
                    original.complete(None);
                }
                Some(error) => shared.on_failure(log_event, original, error, index, tried + 1),
            })
        })
    }

    fn on_failure(
        self: &Arc<Self>,
        event: Arc<LogEvent>,
        original: Continuation,
        error: TargetError,
        index: usize,
        tried: usize,
    ) {
        let next = (index + 1) % self.targets.len();
        if self
            .current
            .compare_exchange(index, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::warn!(
                target_name = %self.name,
                failed = %self.targets[index].name(),
                next = %self.targets[next].name(),
                error = %error,
                "target failed, switching to fallback"
            );
        }

        if tried >= self.targets.len() {
            tracing::error!(target_name = %self.name, error = %error, "all fallback targets failed");
            original.complete(Some(error));
            return;
        }
        self.submit(AsyncLogEvent::new(event, original), tried);
    }

    fn submit(self: &Arc<Self>, event: AsyncLogEvent, tried: usize) {
        let index = self.current.load(Ordering::Acquire);
        let target = &self.targets[index];
        target.write(self.wrap(event, index, tried));
    }
}

/// Writes to the current target and moves to the next one when it fails
///
/// Each event is tried at most once per target. When every target has
/// failed, the last error reaches the event's continuation.
///
/// # Example
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::groups::{FallbackConfig, FallbackGroup};
/// use std::sync::Arc;
///
/// let primary = Arc::new(MemoryTarget::new("primary"));
/// let group = FallbackGroup::new(
///     "failover",
///     vec![primary.clone(), Arc::new(MemoryTarget::new("secondary"))],
///     FallbackConfig::default(),
/// );
/// group.write(AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Info, "app", "hello")));
/// assert_eq!(primary.len(), 1);
/// assert_eq!(group.current_target_index(), 0);
/// ```
pub struct FallbackGroup {
    shared: Arc<FallbackShared>,
}

impl FallbackGroup {
    pub fn new(name: impl Into<String>, targets: Vec<TargetRef>, config: FallbackConfig) -> Self {
        Self {
            shared: Arc::new(FallbackShared {
                name: name.into(),
                targets,
                config,
                current: AtomicUsize::new(0),
            }),
        }
    }

    pub fn current_target_index(&self) -> usize {
        self.shared.current.load(Ordering::Acquire)
    }

    pub fn targets(&self) -> &[TargetRef] {
        &self.shared.targets
    }
}

impl Target for FallbackGroup {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn initialize(&self) -> Result<()> {
        initialize_all(&self.shared.targets)
    }

    fn write(&self, event: AsyncLogEvent) {
        if self.shared.targets.is_empty() {
            event.complete(None);
            return;
        }
        self.shared.submit(event, 0);
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        if self.shared.targets.is_empty() {
            for event in events {
                event.complete(None);
            }
            return;
        }
        if !self.shared.config.enable_batch_write {
            for event in events {
                self.write(event);
            }
            return;
        }

        let index = self.shared.current.load(Ordering::Acquire);
        let events = events
            .into_iter()
            .map(|event| self.shared.wrap(event, index, 0))
            .collect();
        self.shared.targets[index].write_batch(events);
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        flush_all(&self.shared.targets, timeout)
    }

    fn close(&self) {
        close_all(&self.shared.targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use crate::testing::FlakyTarget;

    fn event(message: &str) -> (AsyncLogEvent, crossbeam_channel::Receiver<Option<TargetError>>) {
        let (continuation, outcome) = Continuation::channel();
        (
            AsyncLogEvent::new(LogEvent::new(LogLevel::Info, "fallback", message), continuation),
            outcome,
        )
    }

    #[test]
    fn test_rotation_to_working_target() {
        let first = Arc::new(FlakyTarget::always_failing("first"));
        let second = Arc::new(FlakyTarget::always_failing("second"));
        let third = Arc::new(FlakyTarget::reliable("third"));
        let group = FallbackGroup::new(
            "fallback",
            vec![first.clone(), second.clone(), third.clone()],
            FallbackConfig::default(),
        );

        let (event, outcome) = event("payload");
        group.write(event);

        assert_eq!(outcome.try_recv().unwrap(), None);
        assert_eq!(first.attempts() + second.attempts() + third.attempts(), 3);
        assert_eq!(third.delivered(), vec!["payload"]);
        assert_eq!(group.current_target_index(), 2);
    }

    #[test]
    fn test_all_targets_fail() {
        let targets: Vec<Arc<FlakyTarget>> = (0..3)
            .map(|i| Arc::new(FlakyTarget::always_failing(&format!("t{}", i))))
            .collect();
        let group = FallbackGroup::new(
            "fallback",
            targets.iter().map(|t| Arc::clone(t) as TargetRef).collect(),
            FallbackConfig::default(),
        );

        let (event, outcome) = event("lost");
        group.write(event);

        assert_eq!(
            outcome.try_recv().unwrap(),
            Some(TargetError::write_failed("t2", "attempt 1 failed"))
        );
        assert!(targets.iter().all(|t| t.attempts() == 1));
    }

    #[test]
    fn test_sticky_vs_return_to_first() {
        let primary = Arc::new(FlakyTarget::new("primary", 1));
        let secondary = Arc::new(FlakyTarget::reliable("secondary"));
        let sticky = FallbackGroup::new(
            "sticky",
            vec![primary.clone(), secondary.clone()],
            FallbackConfig::default(),
        );
        sticky.write(event("one").0);
        sticky.write(event("two").0);
        assert_eq!(secondary.delivered(), vec!["one", "two"]);
        assert_eq!(sticky.current_target_index(), 1);

        let primary = Arc::new(FlakyTarget::new("primary", 1));
        let secondary = Arc::new(FlakyTarget::reliable("secondary"));
        let returning = FallbackGroup::new(
            "returning",
            vec![primary.clone(), secondary.clone()],
            FallbackConfig::default().with_return_to_first_on_success(true),
        );
        returning.write(event("one").0);
        assert_eq!(returning.current_target_index(), 0);
        returning.write(event("two").0);
        assert_eq!(secondary.delivered(), vec!["one"]);
        assert_eq!(primary.delivered(), vec!["two"]);
    }

    #[test]
    fn test_batch_goes_to_current_target() {
        let primary = Arc::new(FlakyTarget::new("primary", 1));
        let secondary = Arc::new(FlakyTarget::reliable("secondary"));
        let group = FallbackGroup::new(
            "fallback",
            vec![primary.clone(), secondary.clone()],
            FallbackConfig::default(),
        );

        let (events, outcomes): (Vec<_>, Vec<_>) =
            ["a", "b", "c"].iter().map(|m| event(m)).unzip();
        group.write_batch(events);

        assert_eq!(primary.attempts(), 3);
        assert_eq!(primary.delivered(), vec!["b", "c"]);
        assert_eq!(secondary.delivered(), vec!["a"]);
        for outcome in outcomes {
            assert_eq!(outcome.try_recv().unwrap(), None);
        }
    }

    #[test]
    fn test_empty_group_completes() {
        let group = FallbackGroup::new("empty", Vec::new(), FallbackConfig::default());
        let (event, outcome) = event("nowhere");
        group.write(event);
        assert_eq!(outcome.try_recv().unwrap(), None);
    }
}
