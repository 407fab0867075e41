//! Macros for building and emitting events with positional parameters.
//!
//! Parameters are converted with `ToString` and substituted into `{0}`,
//! `{1}`, ... placeholders when the message is first formatted.
//!
//! # Examples
//!
//! ```
//! use rust_log_targets::prelude::*;
//! use rust_log_targets::{log_event, write_event};
//!
//! let memory = MemoryTarget::new("memory");
//!
//! let event = log_event!(LogLevel::Info, "server", "Listening on port {0}", 8080);
//! assert_eq!(event.message, "Listening on port {0}");
//!
//! write_event!(memory, LogLevel::Warn, "server", "Slow request: {0} took {1} ms", "/users", 950);
//! assert_eq!(memory.messages(), vec!["Slow request: /users took 950 ms"]);
//! ```

/// Build a [`LogEvent`](crate::core::LogEvent) with positional parameters.
///
/// # Examples
///
/// ```
/// use rust_log_targets::{log_event, LogLevel};
///
/// let event = log_event!(LogLevel::Warn, "db.pool", "Pool {0} exhausted after {1} ms", "main", 250);
/// assert_eq!(event.formatted_message(), "Pool main exhausted after 250 ms");
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:expr, $logger:expr, $template:expr) => {
        $crate::core::LogEvent::new($level, $logger, $template)
    };
    ($level:expr, $logger:expr, $template:expr, $($param:expr),+ $(,)?) => {
        $crate::core::LogEvent::new($level, $logger, $template)
            .with_parameters([$(::std::string::ToString::to_string(&$param)),+])
    };
}

/// Build an event and write it to a target without waiting for the outcome.
///
/// # Examples
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::write_event;
///
/// let memory = MemoryTarget::new("memory");
/// write_event!(memory, LogLevel::Error, "auth", "Login failed for {0}", "bob");
/// assert_eq!(memory.len(), 1);
/// ```
#[macro_export]
macro_rules! write_event {
    ($target:expr, $level:expr, $logger:expr, $($arg:tt)+) => {
        $crate::core::Target::write(
            &$target,
            $crate::core::AsyncLogEvent::fire_and_forget($crate::log_event!($level, $logger, $($arg)+)),
        )
    };
}
