//! Throughput benchmark for the heap-backed SPSC circular buffer.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use ringcore::{HeapMemory, Ring};

const RECORD_LEN: usize = 64;
const TOTAL_RECORDS: u64 = 2_000_000;

fn bench_spsc(records: u64) -> u64 {
    let mem = HeapMemory::allocate(1024 * 1024).unwrap();
    let ring = Arc::new(Ring::init(mem, 1).unwrap());

    let ring_cons = ring.clone();
    let consumer = thread::spawn(move || {
        let mut consumed = 0u64;
        while consumed < records {
            if let Some(region) = ring_cons.claim_read(RECORD_LEN) {
                black_box(region.len());
                ring_cons.commit_read(RECORD_LEN);
                consumed += 1;
            }
        }
    });

    let mut produced = 0u64;
    while produced < records {
        if let Some(region) = ring.claim_write(RECORD_LEN) {
            region.fill(produced as u8);
            ring.commit_write(RECORD_LEN);
            produced += 1;
        }
    }

    consumer.join().unwrap();
    records
}

fn benchmark_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("SPSC ring buffer");
    group.throughput(Throughput::Elements(TOTAL_RECORDS));
    group.sample_size(20);

    group.bench_function("heap_backed_64b_records", |b| b.iter(|| bench_spsc(TOTAL_RECORDS)));

    group.finish();
}

criterion_group!(benches, benchmark_ring);
criterion_main!(benches);
