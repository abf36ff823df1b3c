//! Stress tests for concurrent WAL use.

use bytes::Bytes;
use segwal::{ChunkPosition, OptionsBuilder, Wal};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn small_segments() -> segwal::Options {
    OptionsBuilder::new()
        .segment_size(256 * 1024)
        .block_cache_size(64 * 1024)
        .build()
        .unwrap()
}

/// Test many concurrent writers.
#[test]
fn stress_concurrent_writers() {
    let dir = TempDir::new().unwrap();
    let wal = Arc::new(Wal::open_with_options(dir.path(), small_segments()).unwrap());

    let num_threads = 8;
    let writes_per_thread = 500;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                (0..writes_per_thread)
                    .map(|i| {
                        let data = format!("t{:02}-{:05}-{}", t, i, "v".repeat(i % 300));
                        let pos = wal.write(data.as_bytes()).unwrap();
                        (data, pos)
                    })
                    .collect::<Vec<(String, ChunkPosition)>>()
            })
        })
        .collect();

    let written: Vec<(String, ChunkPosition)> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(written.len(), num_threads * writes_per_thread);

    // Every position is distinct and reads back its own record.
    let unique: HashSet<(u32, u32, i64)> = written
        .iter()
        .map(|(_, p)| (p.segment_id, p.block_number, p.chunk_offset))
        .collect();
    assert_eq!(unique.len(), written.len());
    for (data, pos) in &written {
        assert_eq!(wal.read(pos).unwrap(), data.as_bytes());
    }

    assert!(wal.active_segment_id() > 1);
    assert_eq!(wal.new_reader().count(), written.len());
}

/// Test readers running while writers append and rotate.
#[test]
fn stress_concurrent_read_write() {
    let dir = TempDir::new().unwrap();
    let wal = Arc::new(Wal::open_with_options(dir.path(), small_segments()).unwrap());

    // Pre-populate
    let seeded: Vec<ChunkPosition> = (0..1000)
        .map(|i| wal.write(format!("seed-{:04}", i).as_bytes()).unwrap())
        .collect();
    let seeded = Arc::new(seeded);

    let mut handles = vec![];

    // Writers
    for t in 0..4 {
        let wal = Arc::clone(&wal);
        handles.push(thread::spawn(move || {
            for i in 0..500 {
                let data = format!("w{}-{:04}-{}", t, i, "x".repeat(200));
                wal.write(data.as_bytes()).unwrap();
            }
        }));
    }

    // Positional readers
    for t in 0..4 {
        let wal = Arc::clone(&wal);
        let seeded = Arc::clone(&seeded);
        handles.push(thread::spawn(move || {
            for round in 0..5 {
                for (i, pos) in seeded.iter().enumerate().skip((t + round) % 7).step_by(7) {
                    assert_eq!(wal.read(pos).unwrap(), format!("seed-{:04}", i).as_bytes());
                }
            }
        }));
    }

    // Sequential readers
    for _ in 0..2 {
        let wal = Arc::clone(&wal);
        handles.push(thread::spawn(move || {
            let mut count = 0;
            for record in wal.new_reader() {
                let (data, _) = record.unwrap();
                assert!(!data.is_empty());
                count += 1;
            }
            assert!(count >= 1000);
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(wal.new_reader().count(), 1000 + 4 * 500);
}

/// Test concurrent batch producers sharing the pending queue.
#[test]
fn stress_concurrent_batches() {
    let dir = TempDir::new().unwrap();
    let wal = Arc::new(Wal::open_with_options(dir.path(), small_segments()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                let mut flushed = 0;
                for batch in 0..50 {
                    for i in 0..10 {
                        wal.pending_writes(format!("b{}-{:02}-{}", t, batch, i).as_bytes());
                    }
                    flushed += wal.write_all().unwrap().len();
                }
                flushed
            })
        })
        .collect();

    let flushed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(flushed, 4 * 50 * 10);

    let records: Vec<Bytes> = wal.new_reader().map(|r| r.unwrap().0).collect();
    assert_eq!(records.len(), flushed);
}

/// Test repeated open/write/close cycles.
#[test]
fn stress_open_close_cycles() {
    let dir = TempDir::new().unwrap();

    for cycle in 0..10 {
        let wal = Wal::open_with_options(dir.path(), small_segments()).unwrap();
        assert_eq!(wal.new_reader().count(), cycle * 100);

        for i in 0..100 {
            wal.write(format!("cycle{}-{}", cycle, i).as_bytes()).unwrap();
        }
        wal.close().unwrap();
    }

    let wal = Wal::open_with_options(dir.path(), small_segments()).unwrap();
    assert_eq!(wal.new_reader().count(), 1000);
}

/// Test large records spanning many blocks and segments.
#[test]
fn stress_large_values() {
    let dir = TempDir::new().unwrap();
    let wal = Wal::open_with_options(dir.path(), small_segments()).unwrap();

    let values: Vec<Vec<u8>> = (0..20)
        .map(|i| (0..(100_000 + i * 1000)).map(|b| (b % 251) as u8).collect())
        .collect();
    let positions: Vec<ChunkPosition> = values.iter().map(|v| wal.write(v).unwrap()).collect();

    for (value, pos) in values.iter().zip(&positions) {
        assert_eq!(wal.read(pos).unwrap(), value[..]);
    }
    assert!(wal.active_segment_id() > 5);
}
