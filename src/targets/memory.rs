//! In-memory target that keeps every delivered event

use crate::core::{AsyncLogEvent, Layout, LogEvent, Result, Target, TextLayout};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Records events and their rendered text; useful for diagnostics and tests
pub struct MemoryTarget {
    name: String,
    layout: Box<dyn Layout>,
    events: Mutex<Vec<Arc<LogEvent>>>,
    lines: Mutex<Vec<String>>,
    /// Optional cap on retained entries; oldest are evicted first
    max_entries: Option<usize>,
    closed: AtomicBool,
}

impl MemoryTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: Box::new(TextLayout::new()),
            events: Mutex::new(Vec::new()),
            lines: Mutex::new(Vec::new()),
            max_entries: None,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_layout<L: Layout + 'static>(mut self, layout: L) -> Self {
        self.layout = Box::new(layout);
        self
    }

    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Delivered events in arrival order
    pub fn events(&self) -> Vec<Arc<LogEvent>> {
        self.events.lock().clone()
    }

    /// Formatted messages of delivered events
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.formatted_message().to_string())
            .collect()
    }

    /// Rendered lines, produced by the layout
    pub fn logs(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.lines.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn record(&self, event: &Arc<LogEvent>) {
        let line = self.layout.render(event);
        let mut events = self.events.lock();
        let mut lines = self.lines.lock();
        events.push(Arc::clone(event));
        lines.push(line);
        if let Some(max) = self.max_entries {
            if events.len() > max {
                let excess = events.len() - max;
                events.drain(..excess);
                lines.drain(..excess);
            }
        }
    }
}

impl Target for MemoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<()> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn write(&self, event: AsyncLogEvent) {
        self.record(&event.event);
        event.complete(None);
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
