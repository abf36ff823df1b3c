//! Basic usage example for segwal.
//!
//! Run with: cargo run --example basic

use segwal::Wal;
use tempfile::TempDir;

fn main() -> segwal::Result<()> {
    // Create a temporary directory for the WAL
    let dir = TempDir::new().expect("failed to create temp dir");

    // Open the WAL
    let wal = Wal::open(dir.path())?;

    println!("WAL opened, active segment {}", wal.active_segment_id());

    // Append some records
    let first = wal.write(b"set name Alice")?;
    let second = wal.write(b"set city San Francisco")?;
    wal.write(b"del city")?;

    println!("Appended 3 records");
    println!("first  -> {:?}", first);
    println!("second -> {:?}", second);

    // Random access by position
    let data = wal.read(&second)?;
    println!("read back: {}", String::from_utf8_lossy(&data));

    // Batch several records into one write
    wal.pending_writes(b"set a 1");
    wal.pending_writes(b"set b 2");
    wal.pending_writes(b"set c 3");
    let positions = wal.write_all()?;
    println!("Batched {} records", positions.len());

    // Make it durable
    wal.sync()?;

    // Replay everything in write order
    println!("\nReplay:");
    for record in wal.new_reader() {
        let (data, pos) = record?;
        println!(
            "  [{}:{}:{}] {}",
            pos.segment_id,
            pos.block_number,
            pos.chunk_offset,
            String::from_utf8_lossy(&data)
        );
    }

    wal.close()?;
    println!("\nWAL closed successfully!");

    Ok(())
}
