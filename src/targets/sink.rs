//! Adapter turning a synchronous sink into a [`Target`]

use crate::core::{
    error::panic_message, AsyncLogEvent, LogEvent, Result, Target, TargetError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Synchronous output destination: a file, a terminal, a socket
pub trait Sink: Send {
    fn write_event(&mut self, event: &LogEvent) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources; defaults to a final flush
    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// [`Target`] over a [`Sink`], completing each continuation with the sink's result.
///
/// **Panic isolation**: every sink call runs under `catch_unwind`; a panic is
/// reported to the event's continuation as [`TargetError::Panicked`] instead
/// of unwinding into the caller.
pub struct SinkTarget<S: Sink> {
    name: String,
    sink: Mutex<S>,
    closed: AtomicBool,
}

impl<S: Sink> SinkTarget<S> {
    pub fn new(name: impl Into<String>, sink: S) -> Self {
        Self {
            name: name.into(),
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    /// Run `f` with exclusive access to the sink
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.sink.lock())
    }

    fn write_locked(&self, sink: &mut S, event: &LogEvent) -> Option<TargetError> {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sink.write_event(event)
        }));
        match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::debug!(target_name = %self.name, error = %e, "sink write failed");
                Some(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(target_name = %self.name, panic = %message, "sink panicked");
                Some(TargetError::panicked(self.name.as_str(), message))
            }
        }
    }
}

impl<S: Sink> Target for SinkTarget<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<()> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn write(&self, event: AsyncLogEvent) {
        if self.closed.load(Ordering::Acquire) {
            event.complete(Some(TargetError::closed(self.name.as_str())));
            return;
        }
        let error = {
            let mut sink = self.sink.lock();
            self.write_locked(&mut sink, &event.event)
        };
        event.complete(error);
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        if self.closed.load(Ordering::Acquire) {
            for event in events {
                event.complete(Some(TargetError::closed(self.name.as_str())));
            }
            return;
        }
        let outcomes: Vec<_> = {
            let mut sink = self.sink.lock();
            events
                .into_iter()
                .map(|event| {
                    let error = self.write_locked(&mut sink, &event.event);
                    (event, error)
                })
                .collect()
        };
        for (event, error) in outcomes {
            event.complete(error);
        }
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        let mut sink = self.sink.lock();
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.flush()))
            .unwrap_or_else(|payload| {
                Err(TargetError::panicked(
                    self.name.as_str(),
                    panic_message(payload.as_ref()),
                ))
            })
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.sink.lock().close() {
            tracing::warn!(target_name = %self.name, error = %e, "sink close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Continuation, LogLevel};

    struct Scripted {
        written: Vec<String>,
        fail_on: &'static str,
    }

    impl Sink for Scripted {
        fn write_event(&mut self, event: &LogEvent) -> Result<()> {
            if event.message == self.fail_on {
                return Err(TargetError::write_failed("scripted", "refused"));
            }
            if event.message == "panic" {
                panic!("scripted panic");
            }
            self.written.push(event.message.clone());
            Ok(())
        }
    }

    fn tracked(message: &str) -> (AsyncLogEvent, crossbeam_channel::Receiver<Option<TargetError>>) {
        let (continuation, outcome) = Continuation::channel();
        (
            AsyncLogEvent::new(LogEvent::new(LogLevel::Info, "sink", message), continuation),
            outcome,
        )
    }

    #[test]
    fn test_results_reach_continuations() {
        let target = SinkTarget::new(
            "scripted",
            Scripted {
                written: Vec::new(),
                fail_on: "bad",
            },
        );

        let (good, good_outcome) = tracked("good");
        let (bad, bad_outcome) = tracked("bad");
        let (boom, boom_outcome) = tracked("panic");
        target.write_batch(vec![good, bad, boom]);

        assert_eq!(good_outcome.recv().unwrap(), None);
        assert!(matches!(
            bad_outcome.recv().unwrap(),
            Some(TargetError::WriteFailed { .. })
        ));
        assert!(matches!(
            boom_outcome.recv().unwrap(),
            Some(TargetError::Panicked { .. })
        ));
        assert_eq!(target.with_sink(|s| s.written.clone()), vec!["good".to_string()]);
    }

    #[test]
    fn test_closed_rejects_writes() {
        let target = SinkTarget::new(
            "scripted",
            Scripted {
                written: Vec::new(),
                fail_on: "",
            },
        );
        target.close();

        let (event, outcome) = tracked("late");
        target.write(event);
        assert!(matches!(outcome.recv().unwrap(), Some(TargetError::Closed(_))));
    }
}
