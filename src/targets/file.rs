//! File sink: buffered append, one rendered event per line

use super::sink::Sink;
use crate::core::{Layout, LogEvent, Result, TargetError, TextLayout};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    layout: Box<dyn Layout>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let writer = Some(BufWriter::new(Self::open(&path)?));

        Ok(Self {
            path,
            writer,
            layout: Box::new(TextLayout::new()),
        })
    }

    fn open(path: &Path) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| TargetError::io(format!("opening '{}'", path.display()), &e))
    }

    /// Set the layout for this sink
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_log_targets::core::JsonLayout;
    /// use rust_log_targets::targets::FileSink;
    ///
    /// let sink = FileSink::new("/var/log/app.log")
    ///     .unwrap()
    ///     .with_layout(JsonLayout::new());
    /// ```
    #[must_use]
    pub fn with_layout<L: Layout + 'static>(mut self, layout: L) -> Self {
        self.layout = Box::new(layout);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write_event(&mut self, event: &LogEvent) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(BufWriter::new(Self::open(&self.path)?));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TargetError::write_failed(self.path.display().to_string(), "file not open"))?;

        let mut output = self.layout.render(event);
        output.push('\n');
        writer
            .write_all(output.as_bytes())
            .map_err(|e| TargetError::io(format!("writing '{}'", self.path.display()), &e))
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer
                .flush()
                .map_err(|e| TargetError::io(format!("flushing '{}'", self.path.display()), &e))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let result = self.flush();
        self.writer = None;
        result
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}
