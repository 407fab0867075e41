//! Collapse repeated events into one representative with a repeat count
//!
//! The first occurrence of a message is forwarded immediately. Repeats
//! arriving before the flush timer fires are held back; when it fires, the
//! last repeat is forwarded once with ` - N times` appended to its message.

use crate::core::{
    AsyncLogEvent, LogEvent, LogLevel, RearmableTimer, Result, Target, TargetError, TargetRef,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Which text identifies repeated messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DedupKeyMode {
    /// The raw template, so `user {0}` matches regardless of parameters
    #[default]
    Template,
    /// The message after parameter substitution
    FormattedMessage,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThrottlingConfig {
    /// Window after the first occurrence in which repeats are collapsed
    pub flush_interval_ms: u64,
    pub key_mode: DedupKeyMode,
    /// Treat events with different attached errors as different messages
    pub include_exception: bool,
    /// Keep the formatted text of each repeat and append it to the representative
    pub accumulate_messages: bool,
    /// Upper bound on accumulated texts per key
    pub max_accumulated: usize,
    /// Never accumulate templates that are a lone `{0}`
    pub exempt_placeholder_only: bool,
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 1000,
            key_mode: DedupKeyMode::Template,
            include_exception: true,
            accumulate_messages: false,
            max_accumulated: 10,
            exempt_placeholder_only: true,
        }
    }
}

impl ThrottlingConfig {
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_key_mode(mut self, mode: DedupKeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    #[must_use]
    pub fn with_accumulation(mut self, max_accumulated: usize) -> Self {
        self.accumulate_messages = true;
        self.max_accumulated = max_accumulated;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_ms == 0 {
            return Err(TargetError::config(
                "ThrottlingTargetWrapper",
                "flush_interval_ms must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    logger: String,
    level: LogLevel,
    message: String,
    exception: Option<(String, String)>,
}

#[derive(Default)]
struct Occurrences {
    count: u64,
    accumulated: Vec<String>,
    last: Option<AsyncLogEvent>,
}

#[derive(Default)]
struct ThrottleState {
    entries: HashMap<DedupKey, Occurrences>,
    timer_armed: bool,
    /// Set under this lock so no repeat is retained after the closing flush
    closed: bool,
}

struct ThrottleShared {
    name: String,
    wrapped: TargetRef,
    config: ThrottlingConfig,
    state: Mutex<ThrottleState>,
}

impl ThrottleShared {
    fn key_for(&self, event: &LogEvent) -> DedupKey {
        let message = match self.config.key_mode {
            DedupKeyMode::Template => event.message.clone(),
            DedupKeyMode::FormattedMessage => event.formatted_message().to_string(),
        };
        let exception = if self.config.include_exception {
            event
                .exception
                .as_ref()
                .map(|e| (e.kind.clone(), e.message.clone()))
        } else {
            None
        };
        DedupKey {
            logger: event.logger_name.clone(),
            level: event.level,
            message,
            exception,
        }
    }

    /// Forward one representative per repeated key and forget every key
    fn flush_collapsed(&self) {
        let entries = {
            let mut state = self.state.lock();
            state.timer_armed = false;
            std::mem::take(&mut state.entries)
        };

        let representatives: Vec<_> = entries
            .into_values()
            .filter(|occurrences| occurrences.count > 0)
            .filter_map(|occurrences| {
                let count = occurrences.count;
                let accumulated = occurrences.accumulated;
                occurrences.last.map(|mut last| {
                    let event = Arc::make_mut(&mut last.event);
                    let summary = if accumulated.is_empty() {
                        format!("{} - {} times", event.formatted_message(), count)
                    } else {
                        format!(
                            "{} [{}] - {} times",
                            event.formatted_message(),
                            accumulated.join("; "),
                            count
                        )
                    };
                    event.set_formatted_message(summary);
                    last
                })
            })
            .collect();

        if !representatives.is_empty() {
            tracing::trace!(
                target_name = %self.name,
                count = representatives.len(),
                "forwarding collapsed events"
            );
            self.wrapped.write_batch(representatives);
        }
    }
}

/// Forwards the first of a burst of identical events at once and the rest as one summary
///
/// # Example
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::wrappers::{ThrottlingConfig, ThrottlingTargetWrapper};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let memory = Arc::new(MemoryTarget::new("memory"));
/// let throttling = ThrottlingTargetWrapper::new("throttle", memory.clone(), ThrottlingConfig::default());
///
/// for _ in 0..3 {
///     throttling.write(AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Warn, "app", "retrying")));
/// }
/// throttling.flush(Duration::from_secs(1)).unwrap();
/// assert_eq!(memory.messages(), vec!["retrying", "retrying - 2 times"]);
/// ```
pub struct ThrottlingTargetWrapper {
    shared: Arc<ThrottleShared>,
    timer: Mutex<Option<RearmableTimer>>,
}

impl ThrottlingTargetWrapper {
    pub fn new(name: impl Into<String>, wrapped: TargetRef, config: ThrottlingConfig) -> Self {
        Self {
            shared: Arc::new(ThrottleShared {
                name: name.into(),
                wrapped,
                config,
                state: Mutex::new(ThrottleState::default()),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ThrottlingConfig {
        &self.shared.config
    }

    /// Distinct messages seen in the current window
    pub fn tracked_keys(&self) -> usize {
        self.shared.state.lock().entries.len()
    }
}

impl Target for ThrottlingTargetWrapper {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn initialize(&self) -> Result<()> {
        self.shared.config.validate()?;
        self.shared.wrapped.initialize()?;
        {
            let mut state = self.shared.state.lock();
            state.closed = false;
            state.timer_armed = false;
        }

        let mut timer = self.timer.lock();
        if timer.is_none() {
            let shared = Arc::clone(&self.shared);
            *timer = Some(
                RearmableTimer::spawn(&self.shared.name, move || shared.flush_collapsed())
                    .map_err(|e| TargetError::io("spawning throttle timer", &e))?,
            );
        }
        Ok(())
    }

    fn write(&self, event: AsyncLogEvent) {
        let config = &self.shared.config;
        let key = self.shared.key_for(&event.event);

        let mut state = self.shared.state.lock();
        if state.closed {
            drop(state);
            event.complete(Some(TargetError::closed(self.shared.name.as_str())));
            return;
        }
        if let Some(occurrences) = state.entries.get_mut(&key) {
            occurrences.count += 1;
            let exempt = config.exempt_placeholder_only && event.event.is_placeholder_only();
            if config.accumulate_messages
                && !exempt
                && occurrences.accumulated.len() < config.max_accumulated
            {
                occurrences
                    .accumulated
                    .push(event.event.formatted_message().to_string());
            }
            let superseded = occurrences.last.replace(event);
            drop(state);

            if let Some(superseded) = superseded {
                superseded.complete(None);
            }
            return;
        }

        state.entries.insert(key, Occurrences::default());
        let arm = !std::mem::replace(&mut state.timer_armed, true);
        drop(state);

        // The timer callback takes the state lock, so arm only after releasing it
        if arm {
            if let Some(timer) = self.timer.lock().as_ref() {
                timer.arm(Duration::from_millis(config.flush_interval_ms));
            }
        }

        self.shared.wrapped.write(event);
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.shared.flush_collapsed();
        self.shared.wrapped.flush(timeout)
    }

    fn close(&self) {
        self.shared.state.lock().closed = true;

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.stop();
        }
        self.shared.flush_collapsed();
        self.shared.wrapped.close();
    }
}
