//! # Rust Log Targets
//!
//! Composable delivery targets for a logging pipeline. Every component
//! implements the same [`Target`] contract, so wrappers and groups nest into
//! arbitrary trees in front of the sinks that actually write.
//!
//! ## Features
//!
//! - **Asynchronous dispatch**: bounded request queue with Discard, Grow or
//!   Block overflow policies, drained in batches by a background thread
//! - **Wrappers**: buffering, rate limiting, repeat throttling, retry with
//!   backoff and predicate filtering
//! - **Groups**: failover, fan-out with aggregated errors, round-robin and
//!   random distribution
//! - **Completion tracking**: every event carries a one-shot continuation
//!   that is completed exactly once with the delivery outcome
//!
//! ## Example
//!
//! ```
//! use rust_log_targets::prelude::*;
//! use rust_log_targets::groups::SplitGroup;
//! use rust_log_targets::wrappers::{AsyncTargetConfig, AsyncTargetWrapper};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let audit = Arc::new(MemoryTarget::new("audit"));
//! let debug = Arc::new(MemoryTarget::new("debug"));
//! let pipeline = AsyncTargetWrapper::new(
//!     "async",
//!     Arc::new(SplitGroup::new("split", vec![audit.clone(), debug.clone()])),
//!     AsyncTargetConfig::default(),
//! );
//! pipeline.initialize().unwrap();
//!
//! let (continuation, outcome) = Continuation::channel();
//! pipeline.write(AsyncLogEvent::new(
//!     LogEvent::new(LogLevel::Info, "app", "started"),
//!     continuation,
//! ));
//! pipeline.flush(Duration::from_secs(1)).unwrap();
//!
//! assert_eq!(outcome.recv().unwrap(), None);
//! assert_eq!(audit.messages(), vec!["started"]);
//! pipeline.close();
//! ```

pub mod core;
pub mod groups;
pub mod macros;
pub mod targets;
pub mod wrappers;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude {
    pub use crate::core::{
        AsyncLogEvent, Condition, Continuation, ExceptionInfo, JsonLayout, Layout, LayoutValue,
        LogEvent, LogLevel, OverflowPolicy, QueueMetrics, Result, Target, TargetError, TargetRef,
        TextLayout, TimestampFormat,
    };
    pub use crate::targets::{MemoryTarget, Sink, SinkTarget};
}

pub use crate::core::{
    AsyncLogEvent, Condition, Continuation, ExceptionInfo, JsonLayout, Layout, LayoutValue,
    LogEvent, LogLevel, OverflowPolicy, QueueMetrics, RequestQueue, Result, Target, TargetError,
    TargetRef, TextLayout, TimestampFormat, DEFAULT_FLUSH_TIMEOUT,
};
pub use crate::targets::{MemoryTarget, Sink, SinkTarget};
