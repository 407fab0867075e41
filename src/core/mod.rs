//! Core pipeline types, traits and primitives

pub mod continuation;
pub mod error;
pub mod layout;
pub mod log_event;
pub mod log_level;
pub mod metrics;
pub mod overflow_policy;
pub mod request_queue;
pub mod target;
pub mod timer;

pub use continuation::{AsyncLogEvent, Continuation};
pub use error::{Result, TargetError};
pub use layout::{JsonLayout, Layout, LayoutValue, TextLayout, TimestampFormat};
pub use log_event::{format_template, ExceptionInfo, LogEvent};
pub use log_level::LogLevel;
pub use metrics::QueueMetrics;
pub use overflow_policy::{DroppedCallback, GrewCallback, OverflowPolicy};
pub use request_queue::RequestQueue;
pub use target::{Condition, Target, TargetRef, DEFAULT_FLUSH_TIMEOUT};
pub use timer::RearmableTimer;
