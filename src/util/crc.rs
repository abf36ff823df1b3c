//! CRC32 checksum utilities.

use crc32fast::Hasher;

/// Compute CRC32 checksum of the given data.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Compute CRC32 checksum of multiple data slices.
pub fn crc32_multi(slices: &[&[u8]]) -> u32 {
    let mut hasher = Hasher::new();
    for slice in slices {
        hasher.update(slice);
    }
    hasher.finalize()
}

/// Checksum stored in a chunk header.
///
/// Covers the 2-byte little-endian length, the type byte and the payload,
/// in that order. The length is taken from `payload.len()`.
pub fn chunk_checksum(chunk_type: u8, payload: &[u8]) -> u32 {
    let len = (payload.len() as u16).to_le_bytes();
    crc32_multi(&[&len, &[chunk_type], payload])
}
