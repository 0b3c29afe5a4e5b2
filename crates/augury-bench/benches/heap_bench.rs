//! Heap operation benchmarks.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use augury_core::{BumpHeap, FrontierOracle, MetadataMode, OracleHeap, StderrSink};

fn bench_alloc_free_cycle(c: &mut Criterion) {
    let sizes: &[u64] = &[16, 64, 256, 1024, 4096];
    let mut group = c.benchmark_group("alloc_free_cycle");

    for &size in sizes {
        group.bench_with_input(BenchmarkId::new("oracle", size), &size, |b, &sz| {
            b.iter(|| {
                let mut heap =
                    OracleHeap::new(FrontierOracle::new(MetadataMode::MarkerAndSize), StderrSink);
                let addr = heap.allocate(sz);
                heap.deallocate(black_box(addr));
            });
        });
        group.bench_with_input(BenchmarkId::new("linear", size), &size, |b, &sz| {
            b.iter(|| {
                let mut heap = BumpHeap::new(StderrSink);
                let addr = heap.allocate(sz);
                heap.deallocate(black_box(addr));
            });
        });
    }
    group.finish();
}

fn bench_alloc_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_burst");

    group.bench_function("100x64B", |b| {
        b.iter(|| {
            let mut heap =
                OracleHeap::new(FrontierOracle::new(MetadataMode::MarkerAndSize), StderrSink);
            let addrs: Vec<u64> = (0..100).map(|_| heap.allocate(64)).collect();
            black_box(addrs);
        });
    });

    group.finish();
}

fn bench_realloc_growth(c: &mut Criterion) {
    c.bench_function("realloc_doubling_to_4k", |b| {
        b.iter(|| {
            let mut heap =
                OracleHeap::new(FrontierOracle::new(MetadataMode::MarkerAndSize), StderrSink);
            let mut addr = heap.allocate(8);
            let mut size = 8u64;
            while size < 4096 {
                size *= 2;
                addr = heap.reallocate(addr, size);
            }
            black_box(addr);
        });
    });
}

fn bench_snapshot_capture(c: &mut Criterion) {
    let mut heap = BumpHeap::new(StderrSink);
    for i in 0..64u8 {
        let addr = heap.allocate(64);
        heap.mem.write_bytes_unchecked(addr, &[i; 64]);
    }

    c.bench_function("snapshot_64_blocks", |b| {
        b.iter(|| black_box(heap.snapshot_bytes()));
    });
}

criterion_group!(
    benches,
    bench_alloc_free_cycle,
    bench_alloc_burst,
    bench_realloc_growth,
    bench_snapshot_capture
);
criterion_main!(benches);
