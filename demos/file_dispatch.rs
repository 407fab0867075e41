//! File dispatch example
//!
//! Demonstrates buffered, asynchronous writes to a text file and a JSON file
//! at the same time, with queue metrics and drop notifications.
//!
//! Run with: cargo run --example file_dispatch

use rust_log_targets::groups::SplitGroup;
use rust_log_targets::prelude::*;
use rust_log_targets::targets::{FileSink, FileTarget};
use rust_log_targets::wrappers::{
    AsyncTargetConfig, AsyncTargetWrapper, BufferingConfig, BufferingTargetWrapper,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Log Targets - File Dispatch Example ===\n");

    let text = Arc::new(FileTarget::new(
        "text",
        FileSink::new("application.log")?
            .with_layout(TextLayout::new().with_timestamp_format(TimestampFormat::Iso8601Micros)),
    ));
    let json = Arc::new(FileTarget::new(
        "json",
        FileSink::new("application.jsonl")?.with_layout(JsonLayout::new()),
    ));

    let pipeline = AsyncTargetWrapper::new(
        "async",
        Arc::new(BufferingTargetWrapper::new(
            "buffer",
            Arc::new(SplitGroup::new("files", vec![text, json])),
            BufferingConfig::default()
                .with_buffer_size(50)
                .with_flush_timeout(Duration::from_millis(250)),
        )),
        AsyncTargetConfig::default()
            .with_queue_limit(1000)
            .with_overflow_policy(OverflowPolicy::Discard),
    );

    let dropped = Arc::new(AtomicUsize::new(0));
    {
        let dropped = Arc::clone(&dropped);
        pipeline.on_item_dropped(Arc::new(move |_| {
            dropped.fetch_add(1, Ordering::Relaxed);
        }));
    }
    pipeline.initialize()?;

    println!("1. Writing 5000 events:");
    for i in 1..=5000 {
        let level = if i % 1000 == 0 { LogLevel::Warn } else { LogLevel::Info };
        pipeline.write(AsyncLogEvent::fire_and_forget(
            LogEvent::new(level, "worker", "Processed item {0}/5000").with_parameters([i.to_string()]),
        ));
    }

    println!("\n2. Flushing:");
    pipeline.flush(Duration::from_secs(5))?;

    let metrics = pipeline.metrics();
    println!("   enqueued: {}", metrics.enqueued_count());
    println!("   dequeued: {}", metrics.dequeued_count());
    println!("   dropped:  {} ({:.1}%)", dropped.load(Ordering::Relaxed), metrics.drop_rate());

    pipeline.close();
    println!("\n=== Example completed successfully! ===");
    println!("Check 'application.log' and 'application.jsonl' for the output");
    Ok(())
}
