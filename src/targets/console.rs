//! Console sink

use super::sink::Sink;
use crate::core::{Layout, LogEvent, LogLevel, Result, TextLayout};
use colored::{Color, Colorize};
use std::io::Write;

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Trace => Color::BrightBlack,
        LogLevel::Debug => Color::Blue,
        LogLevel::Info => Color::Green,
        LogLevel::Warn => Color::Yellow,
        LogLevel::Error => Color::Red,
        LogLevel::Fatal => Color::BrightRed,
    }
}

/// Writes rendered events to stdout, or stderr for Error and Fatal
pub struct ConsoleSink {
    use_colors: bool,
    layout: Box<dyn Layout>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            layout: Box::new(TextLayout::new()),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Set the layout for this sink
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_targets::core::JsonLayout;
    /// use rust_log_targets::targets::ConsoleSink;
    ///
    /// let sink = ConsoleSink::new().with_layout(JsonLayout::new());
    /// ```
    #[must_use]
    pub fn with_layout<L: Layout + 'static>(mut self, layout: L) -> Self {
        self.layout = Box::new(layout);
        self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn write_event(&mut self, event: &LogEvent) -> Result<()> {
        let rendered = self.layout.render(event);
        let output = if self.use_colors {
            rendered.color(level_color(event.level)).to_string()
        } else {
            rendered
        };

        // Route Error and Fatal levels to stderr, others to stdout
        match event.level {
            LogLevel::Error | LogLevel::Fatal => {
                writeln!(std::io::stderr(), "{}", output)
                    .map_err(|e| crate::core::TargetError::io("writing to stderr", &e))?;
            }
            _ => {
                writeln!(std::io::stdout(), "{}", output)
                    .map_err(|e| crate::core::TargetError::io("writing to stdout", &e))?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout()
            .flush()
            .map_err(|e| crate::core::TargetError::io("flushing stdout", &e))?;
        std::io::stderr()
            .flush()
            .map_err(|e| crate::core::TargetError::io("flushing stderr", &e))?;
        Ok(())
    }
}
