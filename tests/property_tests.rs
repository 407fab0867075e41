//! Property-based tests for rust_log_targets using proptest

use proptest::prelude::*;
use rust_log_targets::core::format_template;
use rust_log_targets::prelude::*;
use rust_log_targets::RequestQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn event(index: usize) -> AsyncLogEvent {
    AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Info, "queue", index.to_string()))
}

fn messages(batch: &[AsyncLogEvent]) -> Vec<String> {
    batch.iter().map(|item| item.event.message.clone()).collect()
}

// ============================================================================
// RequestQueue Tests
// ============================================================================

proptest! {
    /// Grow never loses or reorders items
    #[test]
    fn test_grow_preserves_fifo(limit in 1usize..16, count in 0usize..200) {
        let queue = RequestQueue::new(limit, OverflowPolicy::Grow);
        for i in 0..count {
            queue.enqueue(event(i));
        }

        let batch = queue.dequeue_batch(count.max(1));
        let expected: Vec<String> = (0..count).map(|i| i.to_string()).collect();
        prop_assert_eq!(messages(&batch), expected);
        prop_assert!(queue.request_limit() >= count);
        batch.into_iter().for_each(|item| item.complete(None));
    }

    /// Discard keeps the newest `limit` items and reports every drop
    #[test]
    fn test_discard_bound(limit in 1usize..32, count in 0usize..200) {
        let queue = RequestQueue::new(limit, OverflowPolicy::Discard);
        let dropped = Arc::new(AtomicUsize::new(0));
        {
            let dropped = Arc::clone(&dropped);
            queue.on_item_dropped(Arc::new(move |_| {
                dropped.fetch_add(1, Ordering::SeqCst);
            }));
        }

        for i in 0..count {
            queue.enqueue(event(i));
            prop_assert!(queue.len() <= limit);
        }

        prop_assert_eq!(dropped.load(Ordering::SeqCst), count.saturating_sub(limit));
        prop_assert_eq!(queue.metrics().dropped_count() as usize, count.saturating_sub(limit));

        let kept = queue.dequeue_batch(limit);
        let expected: Vec<String> = (count.saturating_sub(limit)..count).map(|i| i.to_string()).collect();
        prop_assert_eq!(messages(&kept), expected);
        kept.into_iter().for_each(|item| item.complete(None));
    }

    /// Batches never exceed the requested size and together return everything
    #[test]
    fn test_dequeue_batches_partition(count in 0usize..100, batch_size in 1usize..20) {
        let queue = RequestQueue::new(1000, OverflowPolicy::Discard);
        for i in 0..count {
            queue.enqueue(event(i));
        }

        let mut seen = Vec::new();
        loop {
            let batch = queue.dequeue_batch(batch_size);
            if batch.is_empty() {
                break;
            }
            prop_assert!(batch.len() <= batch_size);
            seen.extend(messages(&batch));
            batch.into_iter().for_each(|item| item.complete(None));
        }
        prop_assert_eq!(seen.len(), count);
        prop_assert_eq!(queue.metrics().dequeued_count() as usize, count);
    }
}

// ============================================================================
// LogEvent Tests
// ============================================================================

proptest! {
    /// Control characters never survive into a message (prevents log injection)
    #[test]
    fn test_message_sanitization(message in ".*") {
        let event = LogEvent::new(LogLevel::Info, "app", &message);
        prop_assert!(!event.message.contains('\n'));
        prop_assert!(!event.message.contains('\r'));
        if message.contains('\n') {
            prop_assert!(event.message.contains("\\n"));
        }
    }

    /// Text without braces is returned unchanged
    #[test]
    fn test_format_without_placeholders(template in "[^{}]*", params in prop::collection::vec(".*", 0..4)) {
        prop_assert_eq!(format_template(&template, &params), template);
    }

    /// Each placeholder is replaced by its parameter
    #[test]
    fn test_format_positional(a in "[a-z0-9 ]*", b in "[a-z0-9 ]*") {
        let params = vec![a.clone(), b.clone()];
        prop_assert_eq!(format_template("{1}|{0}", &params), format!("{}|{}", b, a));
    }

    /// LogLevel string conversions roundtrip
    #[test]
    fn test_log_level_roundtrip(index in 0usize..6, lower in any::<bool>()) {
        let level = LogLevel::ALL[index];
        let text = if lower { level.to_str().to_lowercase() } else { level.to_str().to_string() };
        prop_assert_eq!(text.parse::<LogLevel>(), Ok(level));
    }
}

// ============================================================================
// Target Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every write through a sink target completes exactly once
    #[test]
    fn test_memory_target_completes_each_event(count in 0usize..50) {
        let target = MemoryTarget::new("memory");
        let completions = Arc::new(AtomicUsize::new(0));
        for i in 0..count {
            let completions = Arc::clone(&completions);
            target.write(AsyncLogEvent::new(
                LogEvent::new(LogLevel::Debug, "memory", i.to_string()),
                Continuation::new(move |error| {
                    assert!(error.is_none());
                    completions.fetch_add(1, Ordering::SeqCst);
                }),
            ));
        }
        prop_assert_eq!(completions.load(Ordering::SeqCst), count);
        prop_assert_eq!(target.len(), count);
    }
}
