//! Benchmarks for segwal performance.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segwal::{ChunkPosition, OptionsBuilder, SyncMode, Wal};
use tempfile::TempDir;

fn open_wal(dir: &TempDir, block_cache_size: u64) -> Wal {
    let options = OptionsBuilder::new()
        .segment_size(64 * 1024 * 1024)
        .block_cache_size(block_cache_size)
        .build()
        .unwrap();
    Wal::open_with_options(dir.path(), options).unwrap()
}

/// Benchmark single-record appends by record size.
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    for size in [128usize, 4 * 1024, 64 * 1024].iter() {
        let value = vec![b'w'; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let dir = TempDir::new().unwrap();
            let wal = open_wal(&dir, 0);
            b.iter(|| black_box(wal.write(&value).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark batched appends.
fn bench_write_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_all");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let dir = TempDir::new().unwrap();
                let wal = open_wal(&dir, 0);
                let value = vec![b'b'; 256];
                b.iter(|| {
                    for _ in 0..batch_size {
                        wal.pending_writes(&value);
                    }
                    black_box(wal.write_all().unwrap())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark synced appends.
fn bench_write_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_sync");
    group.sample_size(20);

    let dir = TempDir::new().unwrap();
    let options = OptionsBuilder::new()
        .sync_mode(SyncMode::Always)
        .build()
        .unwrap();
    let wal = Wal::open_with_options(dir.path(), options).unwrap();
    let value = vec![b's'; 512];

    group.bench_function("always", |b| {
        b.iter(|| black_box(wal.write(&value).unwrap()))
    });

    group.finish();
}

/// Benchmark positional reads with and without the block cache.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for (name, cache_size) in [("no_cache", 0u64), ("cache", 4 * 1024 * 1024)] {
        let dir = TempDir::new().unwrap();
        let wal = open_wal(&dir, cache_size);
        let positions: Vec<ChunkPosition> = (0..10000)
            .map(|i| wal.write(format!("value{:08}", i).as_bytes()).unwrap())
            .collect();

        group.bench_function(name, |b| {
            let mut i = 0;
            b.iter(|| {
                // Pseudo-random access pattern
                let pos = &positions[(i * 7919) % positions.len()];
                i += 1;
                black_box(wal.read(pos).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark full sequential scans.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 0);
    for i in 0..10000 {
        wal.write(format!("record{:08}", i).as_bytes()).unwrap();
    }

    group.throughput(Throughput::Elements(10000));
    group.bench_function("10000_records", |b| {
        b.iter(|| {
            let count = wal.new_reader().map(|r| r.unwrap()).count();
            black_box(count)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_write,
    bench_write_all,
    bench_write_sync,
    bench_read,
    bench_scan,
);

criterion_main!(benches);
