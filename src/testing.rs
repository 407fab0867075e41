//! Targets with scripted failures for unit tests

use crate::core::{AsyncLogEvent, Result, Target, TargetError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Fails its first `failures` writes, then succeeds
pub(crate) struct FlakyTarget {
    name: String,
    failures: usize,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FlakyTarget {
    pub(crate) fn new(name: &str, failures: usize) -> Self {
        Self {
            name: name.to_string(),
            failures,
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn always_failing(name: &str) -> Self {
        Self::new(name, usize::MAX)
    }

    pub(crate) fn reliable(name: &str) -> Self {
        Self::new(name, 0)
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn delivered(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Target for FlakyTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: AsyncLogEvent) {
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

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
