//! Shared-Memory Queue Performance Benchmarks
//!
//! `ShmQueue` sits directly on the tick-to-trade and order-response
//! paths; enqueue/dequeue latency here bounds every other hot path in
//! this crate.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qflow_core::shm::queue::{ShmQueue, ShmRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct Payload {
    seq: u64,
    value: f64,
}
unsafe impl ShmRecord for Payload {}

fn bench_key(salt: i32) -> i32 {
    0x7C00 + salt + (std::process::id() as i32 & 0xFF)
}

/// Benchmark: single enqueue immediately followed by a dequeue, on an
/// otherwise-empty queue (no spin wait on either side).
fn bench_enqueue_dequeue_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("shm_queue_round_trip");
    group.significance_level(0.01).sample_size(10000);

    let key = bench_key(1);
    let q = ShmQueue::<Payload>::create(key, 1024).unwrap();
    let mut seq = 0u64;

    group.bench_function("enqueue_then_dequeue", |b| {
        b.iter(|| {
            black_box(q.enqueue(Payload { seq, value: seq as f64 }, 10_000)).unwrap();
            seq += 1;
            black_box(q.dequeue(10_000)).unwrap();
        });
    });

    group.finish();
    let _ = ShmQueue::<Payload>::destroy(key, 1024);
}

/// Benchmark: enqueue alone, queue never drained within the timed loop
/// (bounded by capacity so the queue doesn't fill mid-benchmark).
fn bench_enqueue_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("shm_queue_enqueue");
    group.significance_level(0.01).sample_size(1000);

    group.bench_function("enqueue", |b| {
        let key = bench_key(2);
        let q = ShmQueue::<Payload>::create(key, 2048).unwrap();
        let mut seq = 0u64;
        b.iter(|| {
            black_box(q.enqueue(Payload { seq, value: seq as f64 }, 10_000)).unwrap();
            seq += 1;
            if seq as u32 % 2000 == 0 {
                while q.try_dequeue().is_some() {}
            }
        });
        let _ = ShmQueue::<Payload>::destroy(key, 2048);
    });

    group.finish();
}

/// Benchmark: dequeue alone against a pre-filled queue.
fn bench_dequeue_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("shm_queue_dequeue");
    group.significance_level(0.01).sample_size(1000);

    group.bench_function("dequeue", |b| {
        let key = bench_key(3);
        let q = ShmQueue::<Payload>::create(key, 2048).unwrap();
        let mut seq = 0u64;
        b.iter_batched(
            || {
                for _ in 0..2047 {
                    q.enqueue(Payload { seq, value: seq as f64 }, 10_000).unwrap();
                    seq += 1;
                }
            },
            |_| {
                while let Some(v) = q.try_dequeue() {
                    black_box(v);
                }
            },
            criterion::BatchSize::SmallInput,
        );
        let _ = ShmQueue::<Payload>::destroy(key, 2048);
    });

    group.finish();
}

/// Benchmark: round-trip latency across varying capacities, to check
/// whether modulo-indexing cost scales with capacity.
fn bench_varying_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("shm_queue_varying_capacity");
    group.significance_level(0.01).sample_size(1000);

    for capacity in [16u32, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, &capacity| {
            let key = bench_key(4 + capacity as i32);
            let q = ShmQueue::<Payload>::create(key, capacity).unwrap();
            let mut seq = 0u64;
            b.iter(|| {
                black_box(q.enqueue(Payload { seq, value: seq as f64 }, 10_000)).unwrap();
                seq += 1;
                black_box(q.dequeue(10_000)).unwrap();
            });
            let _ = ShmQueue::<Payload>::destroy(key, capacity);
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_enqueue_dequeue_round_trip,
    bench_enqueue_only,
    bench_dequeue_only,
    bench_varying_capacity,
);

criterion_main!(benches);
