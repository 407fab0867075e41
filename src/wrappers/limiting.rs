//! Cap how many events reach the wrapped target per time interval

use crate::core::{
    AsyncLogEvent, LayoutValue, LogEvent, Result, Target, TargetError, TargetRef,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LimitingConfig {
    /// Events forwarded per interval
    pub message_limit: i64,
    pub interval_ms: i64,
}

impl Default for LimitingConfig {
    fn default() -> Self {
        Self {
            message_limit: 1000,
            interval_ms: 60 * 60 * 1000,
        }
    }
}

impl LimitingConfig {
    pub fn new(message_limit: i64, interval: Duration) -> Self {
        Self {
            message_limit,
            interval_ms: interval.as_millis() as i64,
        }
    }
}

#[derive(Debug, Default)]
struct IntervalState {
    first_write: Option<DateTime<Utc>>,
    written: i64,
}

/// Forwards at most `message_limit` events per `interval`; the rest are
/// completed without error.
///
/// Intervals are measured on event timestamps: an event more than `interval`
/// after the first event of the current interval starts a new one. Both
/// settings may be computed per event; a computed limit of zero or less
/// means unlimited.
pub struct LimitingTargetWrapper {
    name: String,
    wrapped: TargetRef,
    message_limit: LayoutValue<i64>,
    interval: LayoutValue<Duration>,
    state: Mutex<IntervalState>,
    discarded: AtomicU64,
}

impl LimitingTargetWrapper {
    pub fn new(name: impl Into<String>, wrapped: TargetRef, config: LimitingConfig) -> Self {
        let interval = if config.interval_ms > 0 {
            LayoutValue::Fixed(Duration::from_millis(config.interval_ms as u64))
        } else {
            LayoutValue::Fixed(Duration::ZERO)
        };
        Self::with_settings(name, wrapped, LayoutValue::Fixed(config.message_limit), interval)
    }

    /// Build from settings that may be computed per event
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_targets::prelude::*;
    /// use rust_log_targets::wrappers::LimitingTargetWrapper;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// // Errors get a larger budget than everything else
    /// let limiting = LimitingTargetWrapper::with_settings(
    ///     "limit",
    ///     Arc::new(MemoryTarget::new("memory")),
    ///     LayoutValue::per_event(|e: &LogEvent| if e.level >= LogLevel::Error { 100 } else { 10 }),
    ///     LayoutValue::Fixed(Duration::from_secs(60)),
    /// );
    /// assert!(limiting.initialize().is_ok());
    /// ```
    pub fn with_settings(
        name: impl Into<String>,
        wrapped: TargetRef,
        message_limit: LayoutValue<i64>,
        interval: LayoutValue<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            wrapped,
            message_limit,
            interval,
            state: Mutex::new(IntervalState::default()),
            discarded: AtomicU64::new(0),
        }
    }

    /// Events completed without being forwarded
    pub fn discarded_count(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Events forwarded in the current interval
    pub fn written_in_interval(&self) -> i64 {
        self.state.lock().written
    }

    fn admit(&self, event: &LogEvent) -> bool {
        let limit = self.message_limit.evaluate(event);
        let interval = self.interval.evaluate(event);

        let mut state = self.state.lock();
        let expired = match state.first_write {
            None => true,
            Some(first) => (event.timestamp - first)
                .to_std()
                .map(|elapsed| elapsed > interval)
                .unwrap_or(false),
        };
        if expired {
            state.first_write = Some(event.timestamp);
            state.written = 0;
        }

        if limit <= 0 || state.written < limit {
            state.written += 1;
            true
        } else {
            false
        }
    }
}

impl Target for LimitingTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<()> {
        if let Some(limit) = self.message_limit.fixed() {
            if *limit <= 0 {
                return Err(TargetError::config(
                    "LimitingTargetWrapper",
                    format!("message_limit must be positive, got {}", limit),
                ));
            }
        }
        if let Some(interval) = self.interval.fixed() {
            if interval.is_zero() {
                return Err(TargetError::config(
                    "LimitingTargetWrapper",
                    "interval must be positive",
                ));
            }
        }
        *self.state.lock() = IntervalState::default();
        self.wrapped.initialize()
    }

    fn write(&self, event: AsyncLogEvent) {
        if self.admit(&event.event) {
            self.wrapped.write(event);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                target_name = %self.name,
                sequence_id = event.event.sequence_id,
                "message limit reached, discarding event"
            );
            event.complete(None);
        }
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        let mut admitted = Vec::with_capacity(events.len());
        for event in events {
            if self.admit(&event.event) {
                admitted.push(event);
            } else {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                event.complete(None);
            }
        }
        if !admitted.is_empty() {
            self.wrapped.write_batch(admitted);
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
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(seconds: i64, millis: u32, message: &str) -> (AsyncLogEvent, crossbeam_channel::Receiver<Option<TargetError>>) {
        let timestamp = Utc.timestamp_opt(1_700_000_000 + seconds, millis * 1_000_000).unwrap();
        let (continuation, outcome) = Continuation::channel();
        (
            AsyncLogEvent::new(
                LogEvent::new(LogLevel::Info, "limit", message).with_timestamp(timestamp),
                continuation,
            ),
            outcome,
        )
    }

    #[test]
    fn test_limit_and_reset() {
        let memory = Arc::new(MemoryTarget::new("memory"));
        let limiting = LimitingTargetWrapper::new(
            "limit",
            memory.clone(),
            LimitingConfig::new(2, Duration::from_secs(1)),
        );
        limiting.initialize().unwrap();

        let mut outcomes = Vec::new();
        for i in 0..5 {
            let (event, outcome) = at(0, i * 100, &format!("burst {}", i));
            limiting.write(event);
            outcomes.push(outcome);
        }
        assert_eq!(memory.messages(), vec!["burst 0", "burst 1"]);
        assert_eq!(limiting.discarded_count(), 3);
        for outcome in outcomes {
            assert_eq!(outcome.try_recv().unwrap(), None);
        }

        let (event, _) = at(2, 0, "after interval");
        limiting.write(event);
        let (event, _) = at(2, 100, "still allowed");
        limiting.write(event);
        let (event, _) = at(2, 200, "over again");
        limiting.write(event);

        assert_eq!(memory.len(), 4);
        assert_eq!(limiting.written_in_interval(), 2);
        assert_eq!(limiting.discarded_count(), 4);
    }

    #[test]
    fn test_per_event_limit() {
        let memory = Arc::new(MemoryTarget::new("memory"));
        let limiting = LimitingTargetWrapper::with_settings(
            "limit",
            memory.clone(),
            LayoutValue::per_event(|e: &LogEvent| if e.message.starts_with("open") { 0 } else { 1 }),
            LayoutValue::Fixed(Duration::from_secs(60)),
        );
        limiting.initialize().unwrap();

        for i in 0..3 {
            let (event, _) = at(0, i, &format!("open {}", i));
            limiting.write(event);
        }
        assert_eq!(memory.len(), 3);

        let (event, _) = at(0, 10, "capped");
        limiting.write(event);
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn test_invalid_configuration() {
        let memory = Arc::new(MemoryTarget::new("memory"));
        let limiting = LimitingTargetWrapper::new(
            "limit",
            memory.clone(),
            LimitingConfig::new(0, Duration::from_secs(1)),
        );
        assert!(matches!(
            limiting.initialize(),
            Err(TargetError::InvalidConfiguration { .. })
        ));

        let limiting =
            LimitingTargetWrapper::new("limit", memory, LimitingConfig::new(5, Duration::ZERO));
        assert!(limiting.initialize().is_err());
    }

    #[test]
    fn test_batch_filtering() {
        let memory = Arc::new(MemoryTarget::new("memory"));
        let limiting = LimitingTargetWrapper::new(
            "limit",
            memory.clone(),
            LimitingConfig::new(3, Duration::from_secs(10)),
        );
        limiting.initialize().unwrap();

        let batch: Vec<_> = (0..5).map(|i| at(0, i, &i.to_string()).0).collect();
        limiting.write_batch(batch);
        assert_eq!(memory.messages(), vec!["0", "1", "2"]);
    }
}
