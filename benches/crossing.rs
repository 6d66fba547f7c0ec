//! Criterion benchmarks for submission and crossing throughput.
//!
//! The arena never recycles slots, so every routine runs against a fresh
//! venue built in the batch setup rather than mutating one engine forever.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crossbook::{Exchange, RetryPolicy, Side};

// Insertion walks the book, so batches are kept modest to stop the
// single-symbol routines from going quadratic on huge resting depth.
const BATCH: u64 = 1_000;

fn fresh_venue() -> Exchange {
    Exchange::with_policy(BATCH as u32 * 2 + 16, RetryPolicy::spinning())
}

/// Submit a batch of resting bids (no crossing ever happens).
fn bench_submit_no_cross(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_no_cross");
    group.throughput(Throughput::Elements(BATCH));
    group.bench_function("single_symbol", |b| {
        b.iter_batched(
            fresh_venue,
            |ex| {
                for i in 0..BATCH {
                    // Rotate over 100 price levels, all on the bid side
                    let price = 1_000_000 + (i % 100) * 10_000;
                    black_box(ex.submit("BENCH", Side::Bid, 10, price).unwrap());
                }
                ex
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

/// Submit crossing pairs and drain them, at several resting depths.
fn bench_submit_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_and_drain");
    group.throughput(Throughput::Elements(BATCH));

    for depth in [1u64, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || {
                    let ex = fresh_venue();
                    // Pre-populate resting asks at one price
                    for _ in 0..depth {
                        ex.submit("BENCH", Side::Ask, 10, 1_000_000).unwrap();
                    }
                    ex
                },
                |ex| {
                    for _ in 0..BATCH / 2 {
                        // Each bid crosses, then an ask replenishes the depth
                        ex.submit("BENCH", Side::Bid, 10, 1_000_000).unwrap();
                        black_box(ex.drain("BENCH"));
                        ex.submit("BENCH", Side::Ask, 10, 1_000_000).unwrap();
                    }
                    ex
                },
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

/// Mixed seeded flow over several symbols, submit + drain per order.
fn bench_multi_symbol_flow(c: &mut Criterion) {
    const SYMBOLS: [&str; 5] = ["AAPL", "GOOG", "TSLA", "MSFT", "AMZN"];

    let mut group = c.benchmark_group("multi_symbol_flow");
    group.throughput(Throughput::Elements(BATCH));
    group.bench_function("mixed", |b| {
        // Pre-generate the flow so the PRNG stays out of the measurement
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let flow: Vec<(&str, Side, u64, u64)> = (0..BATCH)
            .map(|_| {
                (
                    SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
                    if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask },
                    rng.gen_range(1..=100u64),
                    rng.gen_range(50_0000..=500_0000u64),
                )
            })
            .collect();

        b.iter_batched(
            fresh_venue,
            |ex| {
                for &(symbol, side, quantity, price) in &flow {
                    ex.submit(symbol, side, quantity, price).unwrap();
                    black_box(ex.drain(symbol));
                }
                ex
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_submit_no_cross,
    bench_submit_and_drain,
    bench_multi_symbol_flow
);
criterion_main!(benches);
