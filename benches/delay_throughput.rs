//! Delay operator benchmark suite.
//!
//! Benchmarks:
//! - Virtual scheduler drain throughput for raw actions
//! - End-to-end delay throughput (send, schedule, drain, deliver)
//! - Inline delivery through the immediate scheduler
//!
//! Run:
//!   cargo bench --bench delay_throughput

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use backflow::lab::{ManualPublisher, VirtualTimeConfig, VirtualTimeScheduler};
use backflow::operator::PublisherExt;
use backflow::scheduler::{ImmediateScheduler, Scheduler};
use backflow::subscription::{Publisher, Sink};
use backflow::types::{Demand, Time};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// =============================================================================
// HELPERS
// =============================================================================

fn uncapped_scheduler() -> VirtualTimeScheduler {
    VirtualTimeScheduler::new(VirtualTimeConfig::new().no_action_cap())
        .expect("uncapped config is valid")
}

fn counting_sink(counter: &Arc<AtomicU64>) -> Arc<Sink<u64, ()>> {
    let counter = Arc::clone(counter);
    Sink::new(
        move |v: u64| {
            counter.fetch_add(v, Ordering::Relaxed);
        },
        |_| {},
    )
}

// =============================================================================
// VIRTUAL SCHEDULER
// =============================================================================

fn bench_virtual_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("virtual_scheduler/drain");

    for &count in &[64_u64, 1_024, 16_384] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("spread_deadlines", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let scheduler = uncapped_scheduler();
                    for i in 0..count {
                        // Reverse order exercises the ordered insert path.
                        let at = Time::from_nanos(count - i);
                        scheduler.schedule_after(at, Duration::ZERO, None, Box::new(|| {}));
                    }
                    scheduler
                },
                |scheduler| black_box(scheduler.execute_scheduled_actions()),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("same_deadline", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let scheduler = uncapped_scheduler();
                    for _ in 0..count {
                        scheduler.schedule(None, Box::new(|| {}));
                    }
                    scheduler
                },
                |scheduler| black_box(scheduler.execute_scheduled_actions()),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// =============================================================================
// DELAY OPERATOR
// =============================================================================

fn bench_delay_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("delay/virtual");

    for &count in &[64_u64, 1_024, 8_192] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("send_then_drain", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let scheduler = uncapped_scheduler();
                    let source = Arc::new(ManualPublisher::<u64, ()>::new());
                    let total = Arc::new(AtomicU64::new(0));
                    let sink = counting_sink(&total);
                    Arc::clone(&source)
                        .delay(Duration::from_micros(1), None, scheduler.clone(), None)
                        .subscribe(Arc::clone(&sink));
                    scheduler.execute_scheduled_actions();
                    (scheduler, source, sink, total)
                },
                |(scheduler, source, sink, total)| {
                    for v in 0..count {
                        black_box(source.send(v));
                    }
                    scheduler.execute_scheduled_actions();
                    drop(sink);
                    black_box(total.load(Ordering::Relaxed))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_delay_inline(c: &mut Criterion) {
    let mut group = c.benchmark_group("delay/immediate");
    let count = 1_024_u64;
    group.throughput(Throughput::Elements(count));
    group.bench_function("send_inline", |b| {
        let source = Arc::new(ManualPublisher::<u64, ()>::new());
        let total = Arc::new(AtomicU64::new(0));
        let sink = counting_sink(&total);
        Arc::clone(&source)
            .delay(Duration::ZERO, None, ImmediateScheduler, None)
            .subscribe(Arc::clone(&sink));
        b.iter(|| {
            for v in 0..count {
                black_box(source.send(v));
            }
        });
        black_box(total.load(Ordering::Relaxed));
    });
    group.finish();
}

fn bench_demand_arithmetic(c: &mut Criterion) {
    c.bench_function("demand/accumulate", |b| {
        b.iter(|| {
            let mut demand = Demand::NONE;
            for i in 0..1_000_u64 {
                demand += black_box(i);
                demand -= black_box(1_u64);
            }
            black_box(demand)
        })
    });
    c.bench_function("scheduler/immediate_now", |b| {
        let scheduler = ImmediateScheduler;
        b.iter(|| black_box(scheduler.now()))
    });
}

// =============================================================================
// MAIN
// =============================================================================

criterion_group!(
    benches,
    bench_virtual_drain,
    bench_delay_end_to_end,
    bench_delay_inline,
    bench_demand_arithmetic,
);

criterion_main!(benches);
