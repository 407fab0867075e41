//! Error types for the target pipeline

use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, TargetError>;

/// Errors carried through continuations or returned from target lifecycle calls.
///
/// The type is `Clone` because one downstream failure may be reported to a
/// continuation while also being recorded in an aggregate error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    Io { operation: String, message: String },

    /// A target failed to deliver an event
    #[error("Write failed for target '{target}': {message}")]
    WriteFailed { target: String, message: String },

    /// Several sub-targets failed for the same event
    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<TargetError>),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Target already closed
    #[error("Target '{0}' is closed")]
    Closed(String),

    /// Flush deadline passed before the queue drained
    #[error("Flush timed out after {0:?}")]
    FlushTimeout(Duration),

    /// A wrapped target panicked while handling events
    #[error("Target '{target}' panicked: {message}")]
    Panicked { target: String, message: String },

    /// A continuation was dropped without being completed
    #[error("Continuation dropped without completion")]
    ContinuationDropped,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

struct AggregateDisplay<'a>(&'a [TargetError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} targets failed: ", self.0.len())?;
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl TargetError {
    /// Create an IO error with context
    pub fn io(operation: impl Into<String>, source: &std::io::Error) -> Self {
        TargetError::Io {
            operation: operation.into(),
            message: source.to_string(),
        }
    }

    /// Create a write failure for the named target
    pub fn write_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        TargetError::WriteFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        TargetError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a closed-target error
    pub fn closed(target: impl Into<String>) -> Self {
        TargetError::Closed(target.into())
    }

    /// Create a panic report for the named target
    pub fn panicked(target: impl Into<String>, message: impl Into<String>) -> Self {
        TargetError::Panicked {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TargetError::Other(msg.into())
    }

    /// Fold collected errors into the single value handed to a continuation.
    ///
    /// An empty list means success; a single error is passed through as is.
    pub fn combine(mut errors: Vec<TargetError>) -> Option<TargetError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(TargetError::Aggregate(errors)),
        }
    }

    /// Errors contained in this one: the members of an aggregate, or itself
    pub fn flatten(&self) -> Vec<&TargetError> {
        match self {
            TargetError::Aggregate(inner) => inner.iter().flat_map(|e| e.flatten()).collect(),
            other => vec![other],
        }
    }
}

/// Render a `catch_unwind` payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
