//! # segwal
//!
//! An embeddable write-ahead log built from append-only segment files.
//!
//! ## Features
//!
//! - **Block Framing**: Records are split into checksummed chunks inside 32KB blocks
//! - **Segment Rotation**: The active segment rolls over at a configurable size
//! - **Batched Writes**: Stage records and persist them with one file write
//! - **Positional Reads**: Every write returns a `ChunkPosition` for random access
//! - **Block Cache**: Optional LRU cache of full blocks for repeated reads
//! - **Concurrent Access**: Share one `Wal` between threads behind an `Arc`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use segwal::{Options, Wal};
//!
//! // Open a WAL
//! let wal = Wal::open("./my_wal")?;
//!
//! // Append and read back
//! let pos = wal.write(b"hello")?;
//! assert_eq!(&wal.read(&pos)?[..], b"hello");
//!
//! // Batched writes
//! wal.pending_writes(b"one");
//! wal.pending_writes(b"two");
//! let positions = wal.write_all()?;
//!
//! // Iterate everything
//! for record in wal.new_reader() {
//!     let (data, pos) = record?;
//! }
//! ```

// Public modules
pub mod error;
pub mod options;

// Internal modules
mod cache;
mod position;
mod reader;
mod segment;
mod util;
mod wal;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, OptionsBuilder, SyncMode};

// WAL
pub use reader::Reader;
pub use wal::{Wal, INITIAL_SEGMENT_ID};

// Positions
pub use position::{ChunkPosition, MAX_POSITION_LEN};

// Segments
pub use segment::{ChunkType, Segment, SegmentId, SegmentReader, BLOCK_SIZE, CHUNK_HEADER_SIZE};
pub use util::filename::segment_file_name;

// Cache
pub use cache::{BlockCache, CacheStats, LruCache};
