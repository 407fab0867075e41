//! Single-invocation completion callbacks
//!
//! Every event travelling through the pipeline carries a [`Continuation`].
//! Completing it consumes the value, so a second invocation does not compile.
//! A continuation that is dropped before completion reports
//! [`TargetError::ContinuationDropped`], so a producer waiting on it is never
//! left hanging.

use super::error::TargetError;
use super::log_event::LogEvent;
use crossbeam_channel::{bounded, Receiver};
use std::fmt;
use std::sync::Arc;

type Callback = Box<dyn FnOnce(Option<TargetError>) + Send + 'static>;

pub struct Continuation {
    callback: Option<Callback>,
}

impl Continuation {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Option<TargetError>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// A continuation nobody waits on
    pub fn noop() -> Self {
        Self { callback: None }
    }

    /// A continuation paired with a receiver that yields its outcome
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_targets::Continuation;
    ///
    /// let (continuation, outcome) = Continuation::channel();
    /// continuation.complete(None);
    /// assert_eq!(outcome.recv().unwrap(), None);
    /// ```
    pub fn channel() -> (Self, Receiver<Option<TargetError>>) {
        let (tx, rx) = bounded(1);
        let continuation = Self::new(move |err| {
            let _ = tx.send(err);
        });
        (continuation, rx)
    }

    /// Invoke the callback with the outcome
    pub fn complete(mut self, error: Option<TargetError>) {
        if let Some(callback) = self.callback.take() {
            callback(error);
        }
    }

    /// Complete successfully
    #[inline]
    pub fn succeed(self) {
        self.complete(None);
    }

    /// Complete with an error
    #[inline]
    pub fn fail(self, error: TargetError) {
        self.complete(Some(error));
    }

    /// Whether completing this continuation does anything
    pub fn is_noop(&self) -> bool {
        self.callback.is_none()
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            tracing::warn!("continuation dropped without completion");
            callback(Some(TargetError::ContinuationDropped));
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// An event together with the continuation to complete once it is delivered
#[derive(Debug)]
pub struct AsyncLogEvent {
    pub event: Arc<LogEvent>,
    pub continuation: Continuation,
}

impl AsyncLogEvent {
    pub fn new(event: impl Into<Arc<LogEvent>>, continuation: Continuation) -> Self {
        Self {
            event: event.into(),
            continuation,
        }
    }

    /// Wrap an event whose outcome nobody observes
    pub fn fire_and_forget(event: impl Into<Arc<LogEvent>>) -> Self {
        Self::new(event, Continuation::noop())
    }

    /// Complete the continuation, discarding the event
    #[inline]
    pub fn complete(self, error: Option<TargetError>) {
        self.continuation.complete(error);
    }

    /// Replace the continuation with one built around the current one
    pub fn map_continuation<F>(self, wrap: F) -> Self
    where
        F: FnOnce(Arc<LogEvent>, Continuation) -> Continuation,
    {
        let continuation = wrap(Arc::clone(&self.event), self.continuation);
        Self {
            event: self.event,
            continuation,
        }
    }
}
