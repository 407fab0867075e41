//! Rendering events to text, and values computed per event
//!
//! The pipeline itself never parses templates: sinks call
//! [`Layout::render`] and treat the output as opaque text.

use super::log_event::LogEvent;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Pure function from an event to its rendered text
pub trait Layout: Send + Sync {
    fn render(&self, event: &LogEvent) -> String;
}

impl<F> Layout for F
where
    F: Fn(&LogEvent) -> String + Send + Sync,
{
    fn render(&self, event: &LogEvent) -> String {
        self(event)
    }
}

/// Timestamp rendering options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// Unix timestamp in milliseconds
    UnixMillis,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    pub fn format(&self, timestamp: &chrono::DateTime<chrono::Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            TimestampFormat::Iso8601Micros => {
                timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
            }
            TimestampFormat::UnixMillis => timestamp.timestamp_millis().to_string(),
            TimestampFormat::Custom(pattern) => {
                let mut rendered = String::new();
                match write!(rendered, "{}", timestamp.format(pattern)) {
                    Ok(()) => rendered,
                    Err(_) => {
                        tracing::warn!(pattern = %pattern, "invalid timestamp pattern, using RFC 3339");
                        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
                    }
                }
            }
        }
    }
}

/// `[timestamp] [LEVEL] logger - message | kind: exception`
#[derive(Debug, Clone)]
pub struct TextLayout {
    timestamp_format: TimestampFormat,
    include_timestamp: bool,
}

impl TextLayout {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            include_timestamp: true,
        }
    }

    /// Level, logger and message only; handy for assertions in tests
    pub fn without_timestamp() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            include_timestamp: false,
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self.include_timestamp = true;
        self
    }
}

impl Default for TextLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout for TextLayout {
    fn render(&self, event: &LogEvent) -> String {
        let mut output = String::with_capacity(64 + event.message.len());
        if self.include_timestamp {
            output.push('[');
            output.push_str(&self.timestamp_format.format(&event.timestamp));
            output.push_str("] ");
        }
        output.push_str(&format!(
            "[{:5}] {} - {}",
            event.level.to_str(),
            event.logger_name,
            event.formatted_message()
        ));
        if let Some(ref exception) = event.exception {
            output.push_str(&format!(" | {}: {}", exception.kind, exception.message));
        }
        output
    }
}

/// One JSON object per event
#[derive(Debug, Clone, Default)]
pub struct JsonLayout {
    timestamp_format: TimestampFormat,
}

impl JsonLayout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

impl Layout for JsonLayout {
    fn render(&self, event: &LogEvent) -> String {
        let mut value = serde_json::json!({
            "timestamp": self.timestamp_format.format(&event.timestamp),
            "level": event.level.to_str(),
            "logger": event.logger_name,
            "message": event.formatted_message(),
            "sequence_id": event.sequence_id,
            "thread": event.thread_name.as_ref().unwrap_or(&event.thread_id),
        });
        if let Some(ref exception) = event.exception {
            value["exception"] = serde_json::json!({
                "kind": exception.kind,
                "message": exception.message,
            });
        }
        value.to_string()
    }
}

/// A setting that is either fixed or computed from each event
pub enum LayoutValue<T> {
    Fixed(T),
    PerEvent(Arc<dyn Fn(&LogEvent) -> T + Send + Sync>),
}

impl<T: Clone> LayoutValue<T> {
    pub fn per_event<F>(f: F) -> Self
    where
        F: Fn(&LogEvent) -> T + Send + Sync + 'static,
    {
        LayoutValue::PerEvent(Arc::new(f))
    }

    pub fn evaluate(&self, event: &LogEvent) -> T {
        match self {
            LayoutValue::Fixed(value) => value.clone(),
            LayoutValue::PerEvent(f) => f(event),
        }
    }

    /// The fixed value, if this setting does not depend on the event
    pub fn fixed(&self) -> Option<&T> {
        match self {
            LayoutValue::Fixed(value) => Some(value),
            LayoutValue::PerEvent(_) => None,
        }
    }
}

impl<T: Clone> Clone for LayoutValue<T> {
    fn clone(&self) -> Self {
        match self {
            LayoutValue::Fixed(value) => LayoutValue::Fixed(value.clone()),
            LayoutValue::PerEvent(f) => LayoutValue::PerEvent(Arc::clone(f)),
        }
    }
}

impl<T> From<T> for LayoutValue<T> {
    fn from(value: T) -> Self {
        LayoutValue::Fixed(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for LayoutValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutValue::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            LayoutValue::PerEvent(_) => f.write_str("PerEvent(..)"),
        }
    }
}
