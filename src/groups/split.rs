//! Fan-out: every event goes to every target

use crate::core::target::{close_all, flush_all, initialize_all};
use crate::core::{AsyncLogEvent, Continuation, LogEvent, Result, Target, TargetError, TargetRef};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Completes the original continuation once every branch has reported
struct CompletionBarrier {
    remaining: AtomicUsize,
    errors: Mutex<Vec<TargetError>>,
    original: Mutex<Option<Continuation>>,
}

impl CompletionBarrier {
    fn new(branches: usize, original: Continuation) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(branches),
            errors: Mutex::new(Vec::new()),
            original: Mutex::new(Some(original)),
        })
    }

    fn branch(self: &Arc<Self>) -> Continuation {
        let barrier = Arc::clone(self);
        Continuation::new(move |error| barrier.arrive(error))
    }

    fn arrive(&self, error: Option<TargetError>) {
        if let Some(error) = error {
            self.errors.lock().push(error);
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let errors = std::mem::take(&mut *self.errors.lock());
            if let Some(original) = self.original.lock().take() {
                original.complete(TargetError::combine(errors));
            }
        }
    }
}

/// Writes each event to all targets and reports one combined outcome
///
/// The event succeeds only if every target succeeds. Several failures are
/// reported as [`TargetError::Aggregate`].
///
/// # Example
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::groups::SplitGroup;
/// use std::sync::Arc;
///
/// let audit = Arc::new(MemoryTarget::new("audit"));
/// let debug = Arc::new(MemoryTarget::new("debug"));
/// let split = SplitGroup::new("split", vec![audit.clone(), debug.clone()]);
///
/// let (continuation, outcome) = Continuation::channel();
/// split.write(AsyncLogEvent::new(LogEvent::new(LogLevel::Info, "app", "both"), continuation));
/// assert_eq!(outcome.recv().unwrap(), None);
/// assert_eq!(audit.len() + debug.len(), 2);
/// ```
pub struct SplitGroup {
    name: String,
    targets: Vec<TargetRef>,
}

impl SplitGroup {
    pub fn new(name: impl Into<String>, targets: Vec<TargetRef>) -> Self {
        Self {
            name: name.into(),
            targets,
        }
    }

    pub fn targets(&self) -> &[TargetRef] {
        &self.targets
    }
}

impl Target for SplitGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<()> {
        initialize_all(&self.targets)
    }

    fn write(&self, event: AsyncLogEvent) {
        match self.targets.as_slice() {
            [] => event.complete(None),
            [only] => only.write(event),
            targets => {
                let AsyncLogEvent { event, continuation } = event;
                let barrier = CompletionBarrier::new(targets.len(), continuation);
                for target in targets {
                    target.write(AsyncLogEvent::new(Arc::clone(&event), barrier.branch()));
                }
            }
        }
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        match self.targets.as_slice() {
            [] => events.into_iter().for_each(|event| event.complete(None)),
            [only] => only.write_batch(events),
            targets => {
                let pending: Vec<(Arc<LogEvent>, Arc<CompletionBarrier>)> = events
                    .into_iter()
                    .map(|AsyncLogEvent { event, continuation }| {
                        (event, CompletionBarrier::new(targets.len(), continuation))
                    })
                    .collect();

                // Each target gets its own batch; targets may consume or reorder what they receive
                for target in targets {
                    let batch = pending
                        .iter()
                        .map(|(event, barrier)| AsyncLogEvent::new(Arc::clone(event), barrier.branch()))
                        .collect();
                    target.write_batch(batch);
                }
            }
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        flush_all(&self.targets, timeout)
    }

    fn close(&self) {
        close_all(&self.targets);
    }
}
