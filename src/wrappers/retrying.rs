//! Resubmit failed events after a delay
//!
//! Each event gets a continuation that, on failure, sleeps for
//! `retry_delay_ms` and writes the event again with a fresh continuation.
//! The chain ends after `retry_count` attempts in total; the last error is
//! then handed to the original continuation unchanged.

use crate::core::{AsyncLogEvent, Continuation, LogEvent, Result, Target, TargetError, TargetRef};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep while backing off
const BACKOFF_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryingConfig {
    /// Total write attempts per event, the first one included
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    /// Forward batches as batches and back off once per failed round
    pub enable_batch_write: bool,
}

impl Default for RetryingConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 100,
            enable_batch_write: true,
        }
    }
}

impl RetryingConfig {
    #[must_use]
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_batch_write(mut self, enabled: bool) -> Self {
        self.enable_batch_write = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_count == 0 {
            return Err(TargetError::config(
                "RetryingTargetWrapper",
                "retry_count must be at least 1",
            ));
        }
        Ok(())
    }
}

/// One backoff per failure round of a batch
#[derive(Default)]
struct SharedBackoff {
    /// Highest attempt number already slept for, and whether that sleep completed
    slept: Mutex<(u32, bool)>,
}

struct RetryShared {
    name: String,
    wrapped: TargetRef,
    config: RetryingConfig,
    closing: AtomicBool,
    /// Resubmissions hold it shared; `close` takes it exclusively
    write_gate: RwLock<()>,
}

impl RetryShared {
    /// Sleep for the retry delay; false when interrupted by `close`
    fn back_off(&self) -> bool {
        let deadline = Instant::now() + Duration::from_millis(self.config.retry_delay_ms);
        loop {
            if self.closing.load(Ordering::Acquire) {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(BACKOFF_SLICE));
        }
    }

    fn back_off_shared(&self, backoff: &SharedBackoff, attempts_made: u32) -> bool {
        let mut slept = backoff.slept.lock();
        if slept.0 < attempts_made {
            let completed = self.back_off();
            *slept = (attempts_made, completed);
        }
        slept.1
    }

    fn wrap(
        self: &Arc<Self>,
        event: AsyncLogEvent,
        attempts_made: u32,
        backoff: Option<Arc<SharedBackoff>>,
    ) -> AsyncLogEvent {
        let shared = Arc::clone(self);
        event.map_continuation(move |log_event, original| {
            Continuation::new(move |error| match error {
                None => original.complete(None),
                Some(error) => {
                    shared.on_failure(log_event, original, error, attempts_made + 1, backoff)
                }
            })
        })
    }

    fn on_failure(
        self: &Arc<Self>,
        event: Arc<LogEvent>,
        original: Continuation,
        error: TargetError,
        attempts_made: u32,
        backoff: Option<Arc<SharedBackoff>>,
    ) {
        if attempts_made >= self.config.retry_count {
            tracing::warn!(
                target_name = %self.name,
                attempts = attempts_made,
                error = %error,
                "write failed, retries exhausted"
            );
            original.complete(Some(error));
            return;
        }

        tracing::debug!(
            target_name = %self.name,
            attempt = attempts_made,
            error = %error,
            "write failed, retrying"
        );
        let resumed = match backoff.as_deref() {
            Some(shared_backoff) => self.back_off_shared(shared_backoff, attempts_made),
            None => self.back_off(),
        };
        if !resumed {
            original.complete(Some(error));
            return;
        }
        self.submit(AsyncLogEvent::new(event, original), attempts_made, backoff);
    }

    fn submit(
        self: &Arc<Self>,
        event: AsyncLogEvent,
        attempts_made: u32,
        backoff: Option<Arc<SharedBackoff>>,
    ) {
        let Some(_gate) = self.open_gate() else {
            event.complete(Some(TargetError::closed(self.name.as_str())));
            return;
        };
        self.wrapped.write(self.wrap(event, attempts_made, backoff));
    }

    fn open_gate(&self) -> Option<parking_lot::RwLockReadGuard<'_, ()>> {
        if self.closing.load(Ordering::Acquire) {
            return None;
        }
        self.write_gate.try_read_recursive()
    }
}

/// Retries failed writes against the wrapped target
///
/// # Example
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::wrappers::{RetryingConfig, RetryingTargetWrapper};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let retrying = RetryingTargetWrapper::new(
///     "retry",
///     Arc::new(MemoryTarget::new("memory")),
///     RetryingConfig::default().with_retry_delay(Duration::from_millis(10)),
/// );
/// retrying.initialize().unwrap();
///
/// let (continuation, outcome) = Continuation::channel();
/// retrying.write(AsyncLogEvent::new(LogEvent::new(LogLevel::Info, "app", "hi"), continuation));
/// assert_eq!(outcome.recv().unwrap(), None);
/// ```
pub struct RetryingTargetWrapper {
    shared: Arc<RetryShared>,
}

impl RetryingTargetWrapper {
    pub fn new(name: impl Into<String>, wrapped: TargetRef, config: RetryingConfig) -> Self {
        Self {
            shared: Arc::new(RetryShared {
                name: name.into(),
                wrapped,
                config,
                closing: AtomicBool::new(false),
                write_gate: RwLock::new(()),
            }),
        }
    }

    pub fn config(&self) -> &RetryingConfig {
        &self.shared.config
    }
}

impl Target for RetryingTargetWrapper {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn initialize(&self) -> Result<()> {
        self.shared.config.validate()?;
        self.shared.closing.store(false, Ordering::Release);
        self.shared.wrapped.initialize()
    }

    fn write(&self, event: AsyncLogEvent) {
        self.shared.submit(event, 0, None);
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        if !self.shared.config.enable_batch_write {
            for event in events {
                self.write(event);
            }
            return;
        }

        let Some(_gate) = self.shared.open_gate() else {
            for event in events {
                event.complete(Some(TargetError::closed(self.shared.name.as_str())));
            }
            return;
        };
        let backoff = Arc::new(SharedBackoff::default());
        let events = events
            .into_iter()
            .map(|event| self.shared.wrap(event, 0, Some(Arc::clone(&backoff))))
            .collect();
        self.shared.wrapped.write_batch(events);
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.shared.wrapped.flush(timeout)
    }

    fn close(&self) {
        self.shared.closing.store(true, Ordering::Release);
        let _gate = self.shared.write_gate.write();
        self.shared.wrapped.close();
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
            AsyncLogEvent::new(LogEvent::new(LogLevel::Info, "retry", message), continuation),
            outcome,
        )
    }

    fn fast_config() -> RetryingConfig {
        RetryingConfig::default().with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_retry_bound() {
        let failing = Arc::new(FlakyTarget::always_failing("failing"));
        let retrying = RetryingTargetWrapper::new("retry", failing.clone(), fast_config());
        retrying.initialize().unwrap();

        let (event, outcome) = event("doomed");
        retrying.write(event);

        assert_eq!(failing.attempts(), 3);
        assert_eq!(
            outcome.try_recv().unwrap(),
            Some(TargetError::write_failed("failing", "attempt 3 failed"))
        );
        assert!(outcome.try_recv().is_err());
    }

    #[test]
    fn test_success_after_failure() {
        let flaky = Arc::new(FlakyTarget::new("flaky", 1));
        let retrying = RetryingTargetWrapper::new("retry", flaky.clone(), fast_config());

        let (event, outcome) = event("eventually");
        retrying.write(event);

        assert_eq!(outcome.try_recv().unwrap(), None);
        assert_eq!(flaky.attempts(), 2);
        assert_eq!(flaky.delivered(), vec!["eventually"]);
    }

    #[test]
    fn test_single_attempt() {
        let failing = Arc::new(FlakyTarget::always_failing("failing"));
        let retrying = RetryingTargetWrapper::new(
            "retry",
            failing.clone(),
            fast_config().with_retry_count(1),
        );

        let (event, outcome) = event("once");
        retrying.write(event);
        assert!(outcome.try_recv().unwrap().is_some());
        assert_eq!(failing.attempts(), 1);
    }

    #[test]
    fn test_batch_shares_backoff() {
        let failing = Arc::new(FlakyTarget::always_failing("failing"));
        let retrying = RetryingTargetWrapper::new(
            "retry",
            failing.clone(),
            RetryingConfig::default()
                .with_retry_count(2)
                .with_retry_delay(Duration::from_millis(200)),
        );

        let (events, outcomes): (Vec<_>, Vec<_>) = (0..4).map(|i| event(&i.to_string())).unzip();
        let start = Instant::now();
        retrying.write_batch(events);

        assert!(start.elapsed() < Duration::from_millis(600));
        assert_eq!(failing.attempts(), 8);
        for outcome in outcomes {
            assert!(outcome.try_recv().unwrap().is_some());
        }
    }

    #[test]
    fn test_close_interrupts_backoff() {
        let failing = Arc::new(FlakyTarget::always_failing("failing"));
        let retrying = Arc::new(RetryingTargetWrapper::new(
            "retry",
            failing.clone(),
            RetryingConfig::default().with_retry_delay(Duration::from_secs(10)),
        ));

        let (event, outcome) = event("stuck");
        let writer = {
            let retrying = Arc::clone(&retrying);
            thread::spawn(move || retrying.write(event))
        };
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        retrying.close();
        writer.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(outcome.try_recv().unwrap().is_some());
        assert_eq!(failing.attempts(), 1);
        assert!(failing.is_closed());

        let (late, outcome) = self::event("late");
        retrying.write(late);
        assert!(matches!(outcome.try_recv().unwrap(), Some(TargetError::Closed(_))));
    }

    #[test]
    fn test_zero_retry_count_rejected() {
        let retrying = RetryingTargetWrapper::new(
            "retry",
            Arc::new(FlakyTarget::reliable("reliable")),
            RetryingConfig::default().with_retry_count(0),
        );
        assert!(matches!(
            retrying.initialize(),
            Err(TargetError::InvalidConfiguration { .. })
        ));
    }
}
