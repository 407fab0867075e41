//! Asynchronous dispatch: queue events and write them from a background thread
//!
//! Producers only pay for an enqueue. A dedicated worker wakes every
//! `time_to_sleep_between_batches_ms`, drains the queue in batches of
//! `batch_size` and hands each batch to the wrapped target.

use crate::core::{
    error::panic_message, AsyncLogEvent, DroppedCallback, GrewCallback, OverflowPolicy,
    QueueMetrics, RequestQueue, Result, Target, TargetError, TargetRef, DEFAULT_FLUSH_TIMEOUT,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for [`AsyncTargetWrapper`]
///
/// # Example
///
/// ```
/// use rust_log_targets::wrappers::AsyncTargetConfig;
/// use rust_log_targets::OverflowPolicy;
///
/// let config = AsyncTargetConfig::default()
///     .with_queue_limit(500)
///     .with_overflow_policy(OverflowPolicy::Block)
///     .with_batch_size(50);
/// assert_eq!(config.time_to_sleep_between_batches_ms, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AsyncTargetConfig {
    /// Maximum queued events before the overflow policy applies
    pub queue_limit: usize,
    pub overflow_policy: OverflowPolicy,
    /// Events handed to the wrapped target per `write_batch` call
    pub batch_size: usize,
    /// Drain period; zero wakes the worker as soon as an empty queue gets an event
    pub time_to_sleep_between_batches_ms: u64,
    /// Full batches one tick may write before checking for shutdown
    pub full_batch_size_write_limit: usize,
    /// Deadline for the flush performed by `close`
    pub close_flush_timeout_ms: u64,
}

impl Default for AsyncTargetConfig {
    fn default() -> Self {
        Self {
            queue_limit: 10_000,
            overflow_policy: OverflowPolicy::Discard,
            batch_size: 100,
            time_to_sleep_between_batches_ms: 50,
            full_batch_size_write_limit: 5,
            close_flush_timeout_ms: DEFAULT_FLUSH_TIMEOUT.as_millis() as u64,
        }
    }
}

impl AsyncTargetConfig {
    #[must_use]
    pub fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_time_to_sleep_between_batches(mut self, period: Duration) -> Self {
        self.time_to_sleep_between_batches_ms = period.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_full_batch_size_write_limit(mut self, limit: usize) -> Self {
        self.full_batch_size_write_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_limit == 0 {
            return Err(TargetError::config(
                "AsyncTargetWrapper",
                "queue_limit must be at least 1",
            ));
        }
        if self.batch_size == 0 {
            return Err(TargetError::config(
                "AsyncTargetWrapper",
                "batch_size must be at least 1",
            ));
        }
        if self.full_batch_size_write_limit == 0 {
            return Err(TargetError::config(
                "AsyncTargetWrapper",
                "full_batch_size_write_limit must be at least 1",
            ));
        }
        Ok(())
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.time_to_sleep_between_batches_ms)
    }
}

enum WorkerCommand {
    Wake,
    Stop,
}

struct Worker {
    commands: Sender<WorkerCommand>,
    handle: JoinHandle<()>,
}

struct DispatchState {
    name: String,
    queue: RequestQueue,
    wrapped: TargetRef,
    config: AsyncTargetConfig,
    /// Serializes drain loops between the worker and `flush`
    drain_lock: Mutex<()>,
}

impl DispatchState {
    /// One scheduler tick; returns how many events were handed downstream
    fn process_pending(&self) -> usize {
        let _guard = self.drain_lock.lock();
        let mut written = 0;
        for _ in 0..self.config.full_batch_size_write_limit {
            let batch = self.queue.dequeue_batch(self.config.batch_size);
            if batch.is_empty() {
                break;
            }
            let count = batch.len();
            self.write_to_wrapped(batch);
            written += count;
            if count < self.config.batch_size {
                break;
            }
        }
        written
    }

    /// Failures surface through continuations; a panic is logged and swallowed here
    fn write_to_wrapped(&self, batch: Vec<AsyncLogEvent>) {
        let count = batch.len();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.wrapped.write_batch(batch)
        }));
        match result {
            Ok(()) => tracing::trace!(target_name = %self.name, count, "batch written"),
            Err(payload) => tracing::error!(
                target_name = %self.name,
                wrapped = self.wrapped.name(),
                count,
                panic = %panic_message(payload.as_ref()),
                "wrapped target panicked during batch write"
            ),
        }
    }

    /// Complete everything still queued with a timeout error
    fn abandon_queued(&self, timeout: Duration) -> TargetError {
        let abandoned = self.queue.take_all();
        if !abandoned.is_empty() {
            tracing::warn!(
                target_name = %self.name,
                abandoned = abandoned.len(),
                "flush timed out, abandoning queued events"
            );
        }
        for item in abandoned {
            item.complete(Some(TargetError::FlushTimeout(timeout)));
        }
        TargetError::FlushTimeout(timeout)
    }

    /// Complete whatever was enqueued after close with a `Closed` error
    fn reject_queued(&self) {
        for item in self.queue.take_all() {
            item.complete(Some(TargetError::closed(self.name.as_str())));
        }
    }

    fn run(self: Arc<Self>, commands: Receiver<WorkerCommand>) {
        let period = self.config.period();
        loop {
            let command = if period.is_zero() {
                commands.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                commands.recv_timeout(period)
            };
            match command {
                Ok(WorkerCommand::Wake) | Err(RecvTimeoutError::Timeout) => {}
                Ok(WorkerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            }

            loop {
                let written = self.process_pending();
                if written == 0 || self.queue.is_empty() {
                    break;
                }
                if let Ok(WorkerCommand::Stop) = commands.try_recv() {
                    return;
                }
            }
        }
    }
}

/// Target that decouples producers from the latency of the wrapped target
///
/// # Example
///
/// ```
/// use rust_log_targets::prelude::*;
/// use rust_log_targets::wrappers::{AsyncTargetConfig, AsyncTargetWrapper};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let memory = Arc::new(MemoryTarget::new("memory"));
/// let dispatcher = AsyncTargetWrapper::new("async", memory.clone(), AsyncTargetConfig::default());
/// dispatcher.initialize().unwrap();
///
/// dispatcher.write(AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Info, "app", "hello")));
/// dispatcher.flush(Duration::from_secs(1)).unwrap();
/// assert_eq!(memory.len(), 1);
/// dispatcher.close();
/// ```
pub struct AsyncTargetWrapper {
    state: Arc<DispatchState>,
    worker: Mutex<Option<Worker>>,
    closed: AtomicBool,
    /// Set once `close` has cleared the queue for the last time
    drained: AtomicBool,
}

impl AsyncTargetWrapper {
    pub fn new(name: impl Into<String>, wrapped: TargetRef, config: AsyncTargetConfig) -> Self {
        Self {
            state: Arc::new(DispatchState {
                name: name.into(),
                queue: RequestQueue::new(config.queue_limit, config.overflow_policy),
                wrapped,
                config,
                drain_lock: Mutex::new(()),
            }),
            worker: Mutex::new(None),
            closed: AtomicBool::new(false),
            drained: AtomicBool::new(false),
        }
    }

    /// Wrap with the default configuration
    pub fn with_defaults(name: impl Into<String>, wrapped: TargetRef) -> Self {
        Self::new(name, wrapped, AsyncTargetConfig::default())
    }

    pub fn config(&self) -> &AsyncTargetConfig {
        &self.state.config
    }

    /// Events waiting for the worker
    pub fn pending_count(&self) -> usize {
        self.state.queue.len()
    }

    pub fn metrics(&self) -> &QueueMetrics {
        self.state.queue.metrics()
    }

    /// Subscribe to events dropped because the queue was full
    pub fn on_item_dropped(&self, callback: DroppedCallback) {
        self.state.queue.on_item_dropped(callback);
    }

    /// Subscribe to queue limit increases
    pub fn on_limit_grew(&self, callback: GrewCallback) {
        self.state.queue.on_limit_grew(callback);
    }

    fn stop_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.commands.send(WorkerCommand::Stop);
            if worker.handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(e) = worker.handle.join() {
                tracing::error!(
                    target_name = %self.state.name,
                    panic = ?e,
                    "async worker thread panicked"
                );
            }
        }
    }
}

impl Target for AsyncTargetWrapper {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn initialize(&self) -> Result<()> {
        self.state.config.validate()?;
        self.state.wrapped.initialize()?;

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let (commands, receiver) = unbounded();
        let state = Arc::clone(&self.state);
        let handle = thread::Builder::new()
            .name(format!("{}-dispatch", self.state.name))
            .spawn(move || state.run(receiver))
            .map_err(|e| TargetError::io("spawning async dispatch worker", &e))?;
        *worker = Some(Worker { commands, handle });
        self.drained.store(false, Ordering::Release);
        self.closed.store(false, Ordering::Release);

        tracing::debug!(
            target_name = %self.state.name,
            batch_size = self.state.config.batch_size,
            period_ms = self.state.config.time_to_sleep_between_batches_ms,
            "async dispatcher started"
        );
        Ok(())
    }

    fn write(&self, event: AsyncLogEvent) {
        if self.closed.load(Ordering::Acquire) {
            event.complete(Some(TargetError::closed(self.state.name.as_str())));
            return;
        }

        let was_empty = self.state.queue.enqueue(event);

        // A producer that passed the check above, or was blocked for space,
        // may enqueue after the final clear; nothing will drain it then
        if self.drained.load(Ordering::Acquire) {
            self.state.reject_queued();
            return;
        }
        if was_empty && self.state.config.period().is_zero() {
            if let Some(worker) = self.worker.lock().as_ref() {
                let _ = worker.commands.send(WorkerCommand::Wake);
            }
        }
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        for event in events {
            self.write(event);
        }
    }

    /// Drain the whole queue on the calling thread, then flush the wrapped target.
    ///
    /// Items still queued when `timeout` expires are completed with
    /// [`TargetError::FlushTimeout`].
    fn flush(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        {
            // The worker may be stuck inside a slow batch; give up at the deadline
            let Some(_guard) = self.state.drain_lock.try_lock_until(deadline) else {
                return Err(self.state.abandon_queued(timeout));
            };
            loop {
                if Instant::now() >= deadline && !self.state.queue.is_empty() {
                    return Err(self.state.abandon_queued(timeout));
                }

                let batch = self.state.queue.dequeue_batch(self.state.config.batch_size);
                if batch.is_empty() {
                    break;
                }
                self.state.write_to_wrapped(batch);
            }
        }

        self.state
            .wrapped
            .flush(deadline.saturating_duration_since(Instant::now()))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let timeout = Duration::from_millis(self.state.config.close_flush_timeout_ms);
        if let Err(e) = self.flush(timeout) {
            tracing::warn!(target_name = %self.state.name, error = %e, "flush on close failed");
        }
        self.stop_worker();

        self.drained.store(true, Ordering::Release);
        let discarded = self.state.queue.clear();
        if discarded > 0 {
            tracing::debug!(target_name = %self.state.name, discarded, "cleared queue on close");
        }
        self.state.wrapped.close();
        tracing::debug!(target_name = %self.state.name, "async dispatcher closed");
    }
}

impl Drop for AsyncTargetWrapper {
    fn drop(&mut self) {
        if self.worker.lock().is_some() {
            self.close();
        }
    }
}
