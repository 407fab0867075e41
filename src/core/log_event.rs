//! Log event record flowing through the target pipeline

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

static NEXT_SEQUENCE_ID: AtomicU64 = AtomicU64::new(1);

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Error attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Type or category of the error, used as its identity
    pub kind: String,
    pub message: String,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Capture any error value, using its type name as identity
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        Self {
            kind: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
        }
    }
}

/// Immutable log event.
///
/// Events travel as `Arc<LogEvent>`. A component that needs to rewrite an
/// event (the throttling wrapper) does so through `Arc::make_mut` while it is
/// the only holder, so no other thread observes the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub sequence_id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub logger_name: String,
    /// Message template with positional `{0}` placeholders
    pub message: String,
    pub parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    pub thread_id: String,
    pub thread_name: Option<String>,
    #[serde(skip)]
    formatted: OnceLock<String>,
}

impl LogEvent {
    /// Sanitize log message to prevent log injection attacks
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, logger_name: impl Into<String>, message: impl AsRef<str>) -> Self {
        Self {
            sequence_id: NEXT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            message: Self::sanitize_message(message.as_ref()),
            parameters: Vec::new(),
            exception: None,
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
            formatted: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters
            .into_iter()
            .map(|p| Self::sanitize_message(&p.into()))
            .collect();
        self.formatted = OnceLock::new();
        self
    }

    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger_name: impl Into<String>) -> Self {
        self.logger_name = logger_name.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Message with every `{N}` placeholder substituted, computed once
    pub fn formatted_message(&self) -> &str {
        self.formatted
            .get_or_init(|| format_template(&self.message, &self.parameters))
    }

    /// Replace the message with already formatted text
    pub fn set_formatted_message(&mut self, message: String) {
        self.message = message;
        self.parameters.clear();
        self.formatted = OnceLock::new();
    }

    /// Whether the template consists of a single `{0}` placeholder only
    pub fn is_placeholder_only(&self) -> bool {
        self.message.trim() == "{0}"
    }
}

/// Substitute positional placeholders. `{{` and `}}` escape braces; an index
/// with no matching parameter is left as written.
pub fn format_template(template: &str, parameters: &[String]) -> String {
    if parameters.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len() + parameters.len() * 8);
    let mut chars = template.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let rest = &template[start + 1..];
                match rest.find('}') {
                    Some(end) => {
                        let token = &rest[..end];
                        match token.parse::<usize>().ok().and_then(|i| parameters.get(i)) {
                            Some(value) => out.push_str(value),
                            None => {
                                let _ = write!(out, "{{{}}}", token);
                            }
                        }
                        let close = start + 1 + end;
                        while let Some(&(idx, _)) = chars.peek() {
                            if idx > close {
                                break;
                            }
                            chars.next();
                        }
                    }
                    None => out.push('{'),
                }
            }
            other => out.push(other),
        }
    }
    out
}
