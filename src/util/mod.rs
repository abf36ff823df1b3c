//! Shared helpers: checksums, varint coding, file naming and buffer pooling.

pub mod coding;
pub mod crc;
pub mod filename;
pub mod pool;
