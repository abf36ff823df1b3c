//! Chunk framing.
//!
//! A record is written as one `Full` chunk when it fits in the space left
//! in the current block, otherwise as `First`, zero or more `Middle`, and a
//! `Last` chunk, each filling the rest of a block. Every chunk carries its
//! own header:
//!
//! ```text
//! +----------+--------+------+---------+
//! | CRC32 LE | Len LE | Type | Payload |
//! | 4 bytes  | 2 bytes| 1    | Len     |
//! +----------+--------+------+---------+
//! ```

use bytes::{BufMut, BytesMut};

use super::{ChunkType, SegmentId, BLOCK_SIZE, CHUNK_HEADER_SIZE};
use crate::position::ChunkPosition;
use crate::util::crc::chunk_checksum;

/// Write-side block accounting of a segment.
///
/// `block_size` is the number of bytes used in `block_number`; it is always
/// below `BLOCK_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct BlockCursor {
    pub block_number: u32,
    pub block_size: u32,
}

impl BlockCursor {
    /// Cursor for a segment file that is `len` bytes long.
    pub fn from_len(len: u64) -> Self {
        Self {
            block_number: (len / BLOCK_SIZE as u64) as u32,
            block_size: (len % BLOCK_SIZE as u64) as u32,
        }
    }

    /// Logical size of the segment in bytes.
    pub fn size(&self) -> u64 {
        self.block_number as u64 * BLOCK_SIZE as u64 + self.block_size as u64
    }

    /// Frame `data` into `buf` and advance the cursor past it.
    ///
    /// Returns the position of the record's first chunk. The returned
    /// `chunk_size` counts headers and payload but not any padding written
    /// before the first chunk.
    pub fn append_record(
        &mut self,
        segment_id: SegmentId,
        data: &[u8],
        buf: &mut BytesMut,
    ) -> ChunkPosition {
        // Not even a header fits: pad the block out and start a new one.
        if self.block_size as usize + CHUNK_HEADER_SIZE >= BLOCK_SIZE {
            buf.put_bytes(0, BLOCK_SIZE - self.block_size as usize);
            self.block_number += 1;
            self.block_size = 0;
        }

        let mut position = ChunkPosition {
            segment_id,
            block_number: self.block_number,
            chunk_offset: self.block_size as i64,
            chunk_size: 0,
        };

        let data_size = data.len();
        if self.block_size as usize + CHUNK_HEADER_SIZE + data_size <= BLOCK_SIZE {
            append_chunk(buf, ChunkType::Full, data);
            self.advance(CHUNK_HEADER_SIZE + data_size);
            position.chunk_size = (CHUNK_HEADER_SIZE + data_size) as u32;
            return position;
        }

        let mut written = 0;
        let mut chunks = 0;
        while written < data_size {
            let avail = BLOCK_SIZE - self.block_size as usize - CHUNK_HEADER_SIZE;
            let end = data_size.min(written + avail);
            let chunk_type = if written == 0 {
                ChunkType::First
            } else if end == data_size {
                ChunkType::Last
            } else {
                ChunkType::Middle
            };

            append_chunk(buf, chunk_type, &data[written..end]);
            self.advance(CHUNK_HEADER_SIZE + end - written);
            written = end;
            chunks += 1;
        }

        let total = chunks * CHUNK_HEADER_SIZE + data_size;
        position.chunk_size = u32::try_from(total).unwrap_or(u32::MAX);
        position
    }

    fn advance(&mut self, n: usize) {
        let used = self.block_size as usize + n;
        self.block_number += (used / BLOCK_SIZE) as u32;
        self.block_size = (used % BLOCK_SIZE) as u32;
    }
}

/// Append one chunk (header + payload) to `buf`.
pub(crate) fn append_chunk(buf: &mut BytesMut, chunk_type: ChunkType, payload: &[u8]) {
    debug_assert!(payload.len() <= u16::MAX as usize);

    let crc = chunk_checksum(chunk_type.to_byte(), payload);
    buf.reserve(CHUNK_HEADER_SIZE + payload.len());
    buf.put_u32_le(crc);
    buf.put_u16_le(payload.len() as u16);
    buf.put_u8(chunk_type.to_byte());
    buf.put_slice(payload);
}

/// Decoded chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkHeader {
    pub checksum: u32,
    pub length: u16,
    pub chunk_type: u8,
}

impl ChunkHeader {
    /// Parse the first `CHUNK_HEADER_SIZE` bytes of `raw`.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < CHUNK_HEADER_SIZE {
            return None;
        }
        Some(Self {
            checksum: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            length: u16::from_le_bytes([raw[4], raw[5]]),
            chunk_type: raw[6],
        })
    }
}
