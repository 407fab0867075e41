//! Size- and time-triggered buffering in front of a target

use crate::core::{
    AsyncLogEvent, RearmableTimer, Result, Target, TargetError, TargetRef,
};
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// What a full buffer does with the next event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferOverflowAction {
    /// Forward the whole buffer as one batch
    #[default]
    Flush,
    /// Drop the oldest buffered event, completing it without error
    Discard,
}

impl fmt::Display for BufferOverflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferOverflowAction::Flush => write!(f, "Flush"),
            BufferOverflowAction::Discard => write!(f, "Discard"),
        }
    }
}

impl FromStr for BufferOverflowAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flush" => Ok(BufferOverflowAction::Flush),
            "discard" => Ok(BufferOverflowAction::Discard),
            _ => Err(format!("Invalid buffer overflow action: '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BufferingConfig {
    /// Events held before a size-triggered flush
    pub buffer_size: usize,
    /// Flush this long after a write; `None` disables the timer
    pub flush_timeout_ms: Option<u64>,
    /// Re-arm the timer on every write instead of only on the first
    pub sliding_timeout: bool,
    pub overflow_action: BufferOverflowAction,
}

impl Default for BufferingConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            flush_timeout_ms: None,
            sliding_timeout: true,
            overflow_action: BufferOverflowAction::Flush,
        }
    }
}

impl BufferingConfig {
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    #[must_use]
    pub fn with_sliding_timeout(mut self, sliding: bool) -> Self {
        self.sliding_timeout = sliding;
        self
    }

    #[must_use]
    pub fn with_overflow_action(mut self, action: BufferOverflowAction) -> Self {
        self.overflow_action = action;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(TargetError::config(
                "BufferingTargetWrapper",
                "buffer_size must be at least 1",
            ));
        }
        Ok(())
    }

    fn flush_timeout(&self) -> Option<Duration> {
        self.flush_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

struct BufferState {
    events: VecDeque<AsyncLogEvent>,
    timer_pending: bool,
    /// Set under this lock so no write lands after the closing flush
    closed: bool,
}

struct BufferShared {
    name: String,
    wrapped: TargetRef,
    config: BufferingConfig,
    state: Mutex<BufferState>,
    /// Held while a batch is taken and forwarded so batches leave in order.
    /// Re-entrant so a synchronous downstream completion may write back here.
    flush_order: ReentrantMutex<()>,
}

impl BufferShared {
    fn flush_buffer(&self, reason: &'static str) {
        let _order = self.flush_order.lock();
        let batch: Vec<_> = {
            let mut state = self.state.lock();
            state.timer_pending = false;
            state.events.drain(..).collect()
        };
        if batch.is_empty() {
            return;
        }
        tracing::trace!(target_name = %self.name, count = batch.len(), reason, "flushing buffer");
        self.wrapped.write_batch(batch);
    }
}

/// Accumulates events and forwards them in batches
///
/// # Example
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::wrappers::{BufferingConfig, BufferingTargetWrapper};
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemoryTarget::new("memory"));
/// let buffering = BufferingTargetWrapper::new(
///     "buffer",
///     memory.clone(),
///     BufferingConfig::default().with_buffer_size(2),
/// );
///
/// buffering.write(AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Info, "app", "one")));
/// assert!(memory.is_empty());
/// buffering.write(AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Info, "app", "two")));
/// assert_eq!(memory.len(), 2);
/// ```
pub struct BufferingTargetWrapper {
    shared: Arc<BufferShared>,
    timer: Mutex<Option<RearmableTimer>>,
}

impl BufferingTargetWrapper {
    pub fn new(name: impl Into<String>, wrapped: TargetRef, config: BufferingConfig) -> Self {
        let capacity = config.buffer_size;
        Self {
            shared: Arc::new(BufferShared {
                name: name.into(),
                wrapped,
                config,
                state: Mutex::new(BufferState {
                    events: VecDeque::with_capacity(capacity),
                    timer_pending: false,
                    closed: false,
                }),
                flush_order: ReentrantMutex::new(()),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BufferingConfig {
        &self.shared.config
    }

    /// Events currently held
    pub fn buffered_count(&self) -> usize {
        self.shared.state.lock().events.len()
    }
}

impl Target for BufferingTargetWrapper {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn initialize(&self) -> Result<()> {
        self.shared.config.validate()?;
        self.shared.wrapped.initialize()?;
        {
            let mut state = self.shared.state.lock();
            state.closed = false;
            state.timer_pending = false;
        }

        if self.shared.config.flush_timeout().is_some() {
            let mut timer = self.timer.lock();
            if timer.is_none() {
                let shared = Arc::clone(&self.shared);
                *timer = Some(
                    RearmableTimer::spawn(&self.shared.name, move || {
                        shared.flush_buffer("timeout")
                    })
                    .map_err(|e| TargetError::io("spawning buffer timer", &e))?,
                );
            }
        }
        Ok(())
    }

    fn write(&self, event: AsyncLogEvent) {
        let config = &self.shared.config;
        let mut evicted = None;
        let mut arm_after = None;
        let size_reached = {
            let mut state = self.shared.state.lock();
            if state.closed {
                drop(state);
                event.complete(Some(TargetError::closed(self.shared.name.as_str())));
                return;
            }
            if state.events.len() >= config.buffer_size
                && config.overflow_action == BufferOverflowAction::Discard
            {
                evicted = state.events.pop_front();
            }
            state.events.push_back(event);

            let size_reached = state.events.len() >= config.buffer_size
                && config.overflow_action == BufferOverflowAction::Flush;

            if !size_reached {
                if let Some(timeout) = config.flush_timeout() {
                    if config.sliding_timeout || !state.timer_pending {
                        state.timer_pending = true;
                        arm_after = Some(timeout);
                    }
                }
            }
            size_reached
        };

        // The timer callback takes the state lock, so arm only after releasing it
        if let Some(timeout) = arm_after {
            if let Some(timer) = self.timer.lock().as_ref() {
                timer.arm(timeout);
            }
        }
        if let Some(evicted) = evicted {
            tracing::debug!(target_name = %self.shared.name, "buffer full, discarding oldest event");
            evicted.complete(None);
        }
        if size_reached {
            self.shared.flush_buffer("size");
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.shared.flush_buffer("flush");
        self.shared.wrapped.flush(timeout)
    }

    fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.flush_buffer("close");

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.stop();
        }
        self.shared.wrapped.close();
    }
}
