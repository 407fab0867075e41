//! Composed target tree example
//!
//! Builds an async pipeline that fans out to a colored console and a
//! failover pair, with throttling and rate limiting in front of the console.
//!
//! Run with: cargo run --example composed_targets

use rust_log_targets::groups::{FallbackConfig, FallbackGroup, SplitGroup};
use rust_log_targets::prelude::*;
use rust_log_targets::targets::{ConsoleSink, ConsoleTarget};
use rust_log_targets::wrappers::{
    AsyncTargetConfig, AsyncTargetWrapper, LimitingConfig, LimitingTargetWrapper,
    RetryingConfig, RetryingTargetWrapper, ThrottlingConfig, ThrottlingTargetWrapper,
};
use rust_log_targets::{log_event, DEFAULT_FLUSH_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;

/// A target that is always down, to show failover
struct Unreachable;

impl Target for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }

    fn write(&self, event: AsyncLogEvent) {
        event.complete(Some(TargetError::write_failed("unreachable", "connection refused")));
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    println!("=== Rust Log Targets - Composed Targets Example ===\n");

    let console: TargetRef = Arc::new(ConsoleTarget::new(
        "console",
        ConsoleSink::new().with_layout(TextLayout::new()),
    ));
    let console = Arc::new(ThrottlingTargetWrapper::new(
        "throttle",
        Arc::new(LimitingTargetWrapper::new(
            "limit",
            console,
            LimitingConfig::new(20, Duration::from_secs(1)),
        )),
        ThrottlingConfig::default().with_flush_interval(Duration::from_millis(200)),
    ));

    let archive = Arc::new(MemoryTarget::new("archive"));
    let failover = Arc::new(FallbackGroup::new(
        "failover",
        vec![
            Arc::new(RetryingTargetWrapper::new(
                "retry",
                Arc::new(Unreachable),
                RetryingConfig::default().with_retry_delay(Duration::from_millis(10)),
            )),
            archive.clone(),
        ],
        FallbackConfig::default(),
    ));

    let pipeline = AsyncTargetWrapper::new(
        "async",
        Arc::new(SplitGroup::new("split", vec![console, failover])),
        AsyncTargetConfig::default()
            .with_overflow_policy(OverflowPolicy::Block)
            .with_queue_limit(256),
    );
    pipeline.initialize()?;

    println!("1. Distinct events:");
    for level in LogLevel::ALL {
        pipeline.write(AsyncLogEvent::fire_and_forget(log_event!(
            level,
            "demo",
            "A {0} message",
            level.to_str().to_lowercase()
        )));
    }
    pipeline.flush(DEFAULT_FLUSH_TIMEOUT)?;

    println!("\n2. A burst of repeats collapses into one summary:");
    for _ in 0..10 {
        pipeline.write(AsyncLogEvent::fire_and_forget(log_event!(
            LogLevel::Warn,
            "demo.db",
            "Reconnecting to {0}",
            "primary"
        )));
    }
    pipeline.flush(DEFAULT_FLUSH_TIMEOUT)?;

    println!("\n3. Waiting for a delivery outcome:");
    let (continuation, outcome) = Continuation::channel();
    pipeline.write(AsyncLogEvent::new(
        log_event!(LogLevel::Error, "demo", "Payment {0} failed", 1042),
        continuation,
    ));
    pipeline.flush(DEFAULT_FLUSH_TIMEOUT)?;
    match outcome.recv_timeout(Duration::from_secs(1)) {
        Ok(None) => println!("   delivered"),
        Ok(Some(e)) => println!("   failed: {}", e),
        Err(_) => println!("   no outcome yet"),
    }

    pipeline.close();
    println!("\nArchive received {} events after failover", archive.len());
    println!("\n=== Example completed successfully! ===");
    Ok(())
}
