//! Criterion benchmarks for rust_log_targets

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rust_log_targets::groups::{RoundRobinGroup, SplitGroup};
use rust_log_targets::prelude::*;
use rust_log_targets::wrappers::{
    AsyncTargetConfig, AsyncTargetWrapper, BufferingConfig, BufferingTargetWrapper,
    ThrottlingConfig, ThrottlingTargetWrapper,
};
use rust_log_targets::{log_event, RequestQueue};
use std::sync::Arc;
use std::time::Duration;

fn memory() -> Arc<MemoryTarget> {
    Arc::new(MemoryTarget::new("memory").with_max_entries(1024))
}

fn event() -> AsyncLogEvent {
    AsyncLogEvent::fire_and_forget(LogEvent::new(LogLevel::Info, "bench", "Benchmark message"))
}

// ============================================================================
// Event Creation Benchmarks
// ============================================================================

fn bench_event_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("plain", |b| {
        b.iter(|| black_box(LogEvent::new(LogLevel::Info, "bench", black_box("Plain message"))));
    });

    group.bench_function("with_parameters", |b| {
        b.iter(|| black_box(log_event!(LogLevel::Info, "bench", "User {0} did {1}", 42, "login")));
    });

    group.bench_function("format_message", |b| {
        b.iter_batched(
            || log_event!(LogLevel::Info, "bench", "User {0} did {1}", 42, "login"),
            |event| black_box(event.formatted_message().len()),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// Request Queue Benchmarks
// ============================================================================

fn bench_request_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_queue");
    group.throughput(Throughput::Elements(100));

    for policy in [OverflowPolicy::Discard, OverflowPolicy::Grow] {
        group.bench_function(format!("enqueue_dequeue_{}", policy), |b| {
            let queue = RequestQueue::new(64, policy);
            b.iter(|| {
                for _ in 0..100 {
                    queue.enqueue(event());
                }
                for item in queue.dequeue_batch(100) {
                    item.complete(None);
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Async Dispatch Benchmarks
// ============================================================================

fn bench_async_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_dispatch");
    group.throughput(Throughput::Elements(1));

    let dispatcher = AsyncTargetWrapper::new(
        "async",
        memory(),
        AsyncTargetConfig::default().with_overflow_policy(OverflowPolicy::Discard),
    );
    dispatcher.initialize().expect("Failed to initialize");

    group.bench_function("write", |b| {
        b.iter(|| dispatcher.write(black_box(event())));
    });

    group.bench_function("write_and_flush_100", |b| {
        b.iter(|| {
            for _ in 0..100 {
                dispatcher.write(event());
            }
            dispatcher
                .flush(Duration::from_secs(5))
                .expect("Failed to flush");
        });
    });

    dispatcher.close();
    group.finish();
}

// ============================================================================
// Composition Benchmarks
// ============================================================================

fn bench_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("composition");
    group.throughput(Throughput::Elements(1));

    let split = SplitGroup::new("split", vec![memory(), memory(), memory()]);
    group.bench_function("split_3", |b| {
        b.iter(|| split.write(black_box(event())));
    });

    let round_robin = RoundRobinGroup::new("rr", vec![memory(), memory(), memory()]);
    group.bench_function("round_robin_3", |b| {
        b.iter(|| round_robin.write(black_box(event())));
    });

    let buffering = BufferingTargetWrapper::new(
        "buffer",
        memory(),
        BufferingConfig::default().with_buffer_size(100),
    );
    group.bench_function("buffering_100", |b| {
        b.iter(|| buffering.write(black_box(event())));
    });

    let throttling =
        ThrottlingTargetWrapper::new("throttle", memory(), ThrottlingConfig::default());
    group.bench_function("throttling_repeat", |b| {
        b.iter(|| throttling.write(black_box(event())));
    });
    throttling.close();

    group.finish();
}

criterion_group!(
    benches,
    bench_event_creation,
    bench_request_queue,
    bench_async_dispatch,
    bench_composition
);

criterion_main!(benches);
