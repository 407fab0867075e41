//! Bounded request queue with pluggable overflow handling
//!
//! The queue is the hand-off point between producer threads and a
//! background consumer. Items are kept in FIFO order; what happens when the
//! limit is reached is decided by the [`OverflowPolicy`].

use super::continuation::AsyncLogEvent;
use super::metrics::QueueMetrics;
use super::overflow_policy::{DroppedCallback, GrewCallback, OverflowPolicy};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::collections::VecDeque;

/// Yields attempted before a blocked producer parks on the condition variable
const BLOCK_SPIN_ITERATIONS: usize = 16;

struct QueueState {
    items: VecDeque<AsyncLogEvent>,
    limit: usize,
}

/// Thread-safe FIFO of pending events
///
/// # Example
///
/// ```
/// use rust_log_targets::core::{AsyncLogEvent, LogEvent, LogLevel, OverflowPolicy, RequestQueue};
///
/// let queue = RequestQueue::new(2, OverflowPolicy::Discard);
/// for i in 0..3 {
///     let event = LogEvent::new(LogLevel::Info, "app", format!("message {}", i));
///     queue.enqueue(AsyncLogEvent::fire_and_forget(event));
/// }
///
/// let batch = queue.dequeue_batch(10);
/// assert_eq!(batch.len(), 2);
/// assert_eq!(batch[0].event.message, "message 1");
/// assert_eq!(queue.metrics().dropped_count(), 1);
/// ```
pub struct RequestQueue {
    state: Mutex<QueueState>,
    space_available: Condvar,
    policy: OverflowPolicy,
    metrics: QueueMetrics,
    on_dropped: RwLock<Vec<DroppedCallback>>,
    on_grew: RwLock<Vec<GrewCallback>>,
}

impl RequestQueue {
    /// Create a queue; a zero limit is raised to one
    pub fn new(request_limit: usize, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                limit: request_limit.max(1),
            }),
            space_available: Condvar::new(),
            policy,
            metrics: QueueMetrics::new(),
            on_dropped: RwLock::new(Vec::new()),
            on_grew: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to events dropped by the `Discard` policy
    pub fn on_item_dropped(&self, callback: DroppedCallback) {
        self.on_dropped.write().push(callback);
    }

    /// Subscribe to limit increases made by the `Grow` policy
    pub fn on_limit_grew(&self, callback: GrewCallback) {
        self.on_grew.write().push(callback);
    }

    /// Add an item, applying the overflow policy when the queue is full.
    ///
    /// Returns whether the queue was empty before the item was added.
    pub fn enqueue(&self, item: AsyncLogEvent) -> bool {
        let mut dropped = Vec::new();
        let mut grew_to = None;

        let mut state = self.state.lock();
        match self.policy {
            OverflowPolicy::Discard => {
                while state.items.len() >= state.limit {
                    match state.items.pop_front() {
                        Some(oldest) => dropped.push(oldest),
                        None => break,
                    }
                }
            }
            OverflowPolicy::Grow => {
                if state.items.len() >= state.limit {
                    state.limit = state.limit.saturating_mul(2);
                    grew_to = Some(state.limit);
                }
            }
            OverflowPolicy::Block => {
                if state.items.len() >= state.limit {
                    self.metrics.record_block();
                    self.wait_for_space(&mut state);
                }
            }
        }

        let was_empty = state.items.is_empty();
        state.items.push_back(item);
        drop(state);

        self.metrics.record_enqueued();

        for item in dropped {
            self.metrics.record_dropped();
            tracing::debug!(
                sequence_id = item.event.sequence_id,
                "request queue full, dropping oldest event"
            );
            for callback in self.on_dropped.read().iter() {
                callback(&item.event);
            }
            item.complete(None);
        }

        if let Some(limit) = grew_to {
            self.metrics.record_grow();
            tracing::debug!(new_limit = limit, "request queue grew beyond its limit");
            for callback in self.on_grew.read().iter() {
                callback(limit);
            }
        }

        was_empty
    }

    fn wait_for_space(&self, state: &mut MutexGuard<'_, QueueState>) {
        let mut spins = 0;
        while state.items.len() >= state.limit && spins < BLOCK_SPIN_ITERATIONS {
            MutexGuard::unlocked(state, std::thread::yield_now);
            spins += 1;
        }
        while state.items.len() >= state.limit {
            self.space_available.wait(state);
        }
    }

    /// Remove up to `max_count` items from the front of the queue
    pub fn dequeue_batch(&self, max_count: usize) -> Vec<AsyncLogEvent> {
        let mut state = self.state.lock();
        let count = max_count.min(state.items.len());
        let batch: Vec<_> = state.items.drain(..count).collect();
        drop(state);

        if !batch.is_empty() {
            self.metrics.record_dequeued(batch.len());
            self.space_available.notify_all();
        }
        batch
    }

    /// Remove every queued item, completing each without error.
    ///
    /// Returns how many items were discarded.
    pub fn clear(&self) -> usize {
        let items: Vec<_> = self.state.lock().items.drain(..).collect();
        self.space_available.notify_all();

        let count = items.len();
        for item in items {
            item.complete(None);
        }
        count
    }

    /// Remove every queued item so the caller decides how to complete them
    pub(crate) fn take_all(&self) -> Vec<AsyncLogEvent> {
        let items: Vec<_> = self.state.lock().items.drain(..).collect();
        self.space_available.notify_all();
        items
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Current limit; grows over time under the `Grow` policy
    pub fn request_limit(&self) -> usize {
        self.state.lock().limit
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("len", &self.len())
            .field("limit", &self.request_limit())
            .field("policy", &self.policy)
            .field("metrics", &self.metrics)
            .finish()
    }
}
