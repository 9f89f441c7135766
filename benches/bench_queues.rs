//! Throughput benchmarks for the bounded MPMC queue and the unbounded MPSC queue.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use ringcore::MpmcQueue;

const TOTAL_ITEMS: u64 = 1_000_000;

fn bench_mpmc(items: u64) -> u64 {
    let queue = Arc::new(MpmcQueue::new(4096).unwrap());

    let cons_queue = queue.clone();
    let consumer = thread::spawn(move || {
        let mut consumed = 0u64;
        while consumed < items {
            black_box(cons_queue.pop());
            consumed += 1;
        }
    });

    for i in 0..items {
        queue.push(i);
    }

    consumer.join().unwrap();
    items
}

fn benchmark_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded MPMC queue");
    group.throughput(Throughput::Elements(TOTAL_ITEMS));
    group.sample_size(20);

    group.bench_function("single_producer_single_consumer", |b| b.iter(|| bench_mpmc(TOTAL_ITEMS)));

    group.finish();
}

criterion_group!(benches, benchmark_mpmc);
criterion_main!(benches);
