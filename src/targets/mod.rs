//! Reference leaf targets

#[cfg(feature = "console")]
pub mod console;
#[cfg(feature = "file")]
pub mod file;
pub mod memory;
pub mod sink;

#[cfg(feature = "console")]
pub use console::ConsoleSink;
#[cfg(feature = "file")]
pub use file::FileSink;
pub use memory::MemoryTarget;
pub use sink::{Sink, SinkTarget};

/// Colored terminal output
#[cfg(feature = "console")]
pub type ConsoleTarget = SinkTarget<ConsoleSink>;

/// Buffered append to a single file
#[cfg(feature = "file")]
pub type FileTarget = SinkTarget<FileSink>;
