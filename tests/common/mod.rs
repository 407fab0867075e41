//! Shared helpers for integration tests

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rust_log_targets::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Fails its first `failures` writes, then records messages
pub struct ScriptedTarget {
    name: String,
    failures: usize,
    delay: Duration,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<String>>,
}

impl ScriptedTarget {
    pub fn new(name: &str, failures: usize) -> Self {
        Self {
            name: name.to_string(),
            failures,
            delay: Duration::ZERO,
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, usize::MAX)
    }

    pub fn reliable(name: &str) -> Self {
        Self::new(name, 0)
    }

    /// Sleep this long inside every write
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }
}

impl Target for ScriptedTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: AsyncLogEvent) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            event.complete(Some(TargetError::write_failed(
                self.name.as_str(),
                format!("attempt {} failed", attempt + 1),
            )));
        } else {
            self.delivered
                .lock()
                .push(event.event.formatted_message().to_string());
            event.complete(None);
        }
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}
}

/// Event with a continuation that reports its outcome on the returned receiver
pub fn tracked(message: &str) -> (AsyncLogEvent, Receiver<Option<TargetError>>) {
    let (continuation, outcome) = Continuation::channel();
    (
        AsyncLogEvent::new(LogEvent::new(LogLevel::Info, "test", message), continuation),
        outcome,
    )
}

/// Continuation that bumps `counter` each time it is completed
pub fn counting(counter: &std::sync::Arc<AtomicUsize>) -> Continuation {
    let counter = std::sync::Arc::clone(counter);
    Continuation::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}
