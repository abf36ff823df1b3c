//! Checkpoint and resume example for segwal.
//!
//! A consumer persists the position of the last record it handled and,
//! after a restart, continues from there.
//!
//! Run with: cargo run --example resume

use segwal::{ChunkPosition, OptionsBuilder, Wal};
use tempfile::TempDir;

fn main() -> segwal::Result<()> {
    let dir = TempDir::new().expect("failed to create temp dir");
    let options = OptionsBuilder::new()
        .segment_size(16 * 1024)
        .block_cache_size(0)
        .build()?;

    println!("=== Resume Example ===\n");

    // First run: produce events and consume half of them.
    let checkpoint = {
        let wal = Wal::open_with_options(dir.path(), options.clone())?;
        for i in 0..200 {
            wal.write(format!("event-{:03} {}", i, "payload ".repeat(10)).as_bytes())?;
        }
        println!("Wrote 200 events over {} segments", wal.active_segment_id());

        let mut reader = wal.new_reader();
        for _ in 0..100 {
            reader.next_record()?;
        }
        // Position of the first unconsumed record.
        let next = reader
            .current_chunk_position()
            .unwrap_or_default()
            .encode_fixed_size();
        wal.close()?;
        next
    };
    println!("Saved checkpoint ({} bytes)", checkpoint.len());

    // Second run: reopen and pick up where we left off.
    let wal = Wal::open_with_options(dir.path(), options)?;
    let start = ChunkPosition::decode(&checkpoint)?;
    println!(
        "Resuming at segment {} block {} offset {}",
        start.segment_id, start.block_number, start.chunk_offset
    );

    let mut resumed = 0;
    let mut first = None;
    for record in wal.new_reader_with_start(&start)? {
        let (data, _) = record?;
        if first.is_none() {
            first = Some(String::from_utf8_lossy(&data[..9]).into_owned());
        }
        resumed += 1;
    }

    println!("Resumed {} events, starting with {:?}", resumed, first);

    Ok(())
}
