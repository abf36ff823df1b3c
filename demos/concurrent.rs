//! Concurrent access example for segwal.
//!
//! Run with: cargo run --example concurrent

use segwal::{OptionsBuilder, Wal};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tempfile::TempDir;

fn main() -> segwal::Result<()> {
    let dir = TempDir::new().expect("failed to create temp dir");
    let options = OptionsBuilder::new()
        .segment_size(1024 * 1024)
        .block_cache_size(256 * 1024)
        .build()?;
    let wal = Arc::new(Wal::open_with_options(dir.path(), options)?);

    println!("=== Concurrent Access Example ===\n");

    let num_writers = 4;
    let writes_per_writer = 10_000;

    let start = Instant::now();
    let handles: Vec<_> = (0..num_writers)
        .map(|w| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || -> segwal::Result<usize> {
                for i in 0..writes_per_writer {
                    let data = format!("writer{}-record{:06}", w, i);
                    wal.write(data.as_bytes())?;
                }
                Ok(writes_per_writer)
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += handle.join().expect("writer thread panicked")?;
    }
    let elapsed = start.elapsed();

    println!(
        "{} writers appended {} records in {:?} ({:.0} records/sec)",
        num_writers,
        total,
        elapsed,
        total as f64 / elapsed.as_secs_f64()
    );
    println!("Active segment: {}", wal.active_segment_id());

    // Scan while another thread keeps writing.
    let writer = {
        let wal = Arc::clone(&wal);
        thread::spawn(move || -> segwal::Result<()> {
            for i in 0..1000 {
                wal.write(format!("late-{}", i).as_bytes())?;
            }
            Ok(())
        })
    };

    let start = Instant::now();
    let mut scanned = 0;
    for record in wal.new_reader() {
        record?;
        scanned += 1;
    }
    writer.join().expect("writer thread panicked")?;

    println!("Scanned {} records in {:?}", scanned, start.elapsed());

    if let Some(stats) = wal.block_cache_stats() {
        println!("Block cache hit rate: {:.2}", stats.hit_rate());
    }

    wal.close()?;
    Ok(())
}
