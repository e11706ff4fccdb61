//! Benchmark for span splitting.
//!
//! TARGET: the no-event path costs no more than a range query.
//!
//! Run with: cargo bench --package tessel_core --bench split_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use tessel_core::{EventTable, NoopCallback, PlannedSpan, SpanSplitter, SubSpan};

fn dense_table() -> EventTable {
    // One event every 64 tile samples over 1M samples.
    EventTable::register((1..=16_384u32).map(|i| i * 64), Arc::new(NoopCallback), 1 << 20)
        .expect("valid table")
}

fn benchmark_no_event_path(c: &mut Criterion) {
    let table = EventTable::register([1 << 20], Arc::new(NoopCallback), 1 << 20).expect("valid table");
    let mut out: Vec<SubSpan> = Vec::with_capacity(8);

    c.bench_function("split_no_events", |b| {
        let mut start = 0u32;
        b.iter(|| {
            start = (start + 16) % 100_000;
            let span = PlannedSpan::new(start, start + 16).expect("valid span");
            SpanSplitter::split_into(black_box(span), Some(&table), &mut out);
            black_box(out.len())
        });
    });
}

fn benchmark_dense_table(c: &mut Criterion) {
    let table = dense_table();
    let mut out: Vec<SubSpan> = Vec::with_capacity(64);

    let mut group = c.benchmark_group("split_dense");
    group.throughput(Throughput::Elements(1));
    group.bench_function("span_1024_samples", |b| {
        let mut start = 0u32;
        b.iter(|| {
            start = (start + 1024) % 1_000_000;
            let span = PlannedSpan::new(start, start + 1024).expect("valid span");
            SpanSplitter::split_into(black_box(span), Some(&table), &mut out);
            black_box(out.len())
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_no_event_path, benchmark_dense_table);
criterion_main!(benches);
