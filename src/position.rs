//! Record locators.
//!
//! A [`ChunkPosition`] names the first chunk of a record inside the WAL and
//! can be persisted by callers (for example as a "last processed"
//! checkpoint) in a compact varint form.

use bytes::{Bytes, BytesMut};

use crate::segment::SegmentId;
use crate::util::coding::{
    get_uvarint32, get_uvarint64, put_uvarint, uvarint_len, MAX_VARINT32_LEN, MAX_VARINT64_LEN,
};
use crate::{Error, Result};

/// Length of [`ChunkPosition::encode_fixed_size`] output.
pub const MAX_POSITION_LEN: usize = MAX_VARINT32_LEN * 3 + MAX_VARINT64_LEN;

/// Position of a record in the WAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkPosition {
    /// Segment holding the record.
    pub segment_id: SegmentId,
    /// Block of the segment holding the record's first chunk.
    pub block_number: u32,
    /// Offset of the first chunk inside its block.
    pub chunk_offset: i64,
    /// Bytes the record occupies on disk, headers included.
    ///
    /// An estimate for accounting only. Reads never depend on it.
    pub chunk_size: u32,
}

impl ChunkPosition {
    /// Encode as four unsigned varints, trimmed to the bytes used.
    pub fn encode(&self) -> Bytes {
        self.encode_into(false)
    }

    /// Encode as four unsigned varints, zero-padded to [`MAX_POSITION_LEN`].
    pub fn encode_fixed_size(&self) -> Bytes {
        self.encode_into(true)
    }

    fn encode_into(&self, fixed: bool) -> Bytes {
        let capacity = if fixed {
            MAX_POSITION_LEN
        } else {
            self.fields().into_iter().map(uvarint_len).sum()
        };
        let mut buf = BytesMut::with_capacity(capacity);
        for field in self.fields() {
            put_uvarint(&mut buf, field);
        }
        if fixed {
            buf.resize(MAX_POSITION_LEN, 0);
        }
        buf.freeze()
    }

    fn fields(&self) -> [u64; 4] {
        [
            self.segment_id as u64,
            self.block_number as u64,
            self.chunk_offset as u64,
            self.chunk_size as u64,
        ]
    }

    /// Decode a position produced by either encoding.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::invalid_format("empty chunk position"));
        }

        let mut slice = buf;
        let segment_id = get_uvarint32(&mut slice)
            .ok_or_else(|| Error::invalid_format("bad segment id in chunk position"))?;
        let block_number = get_uvarint32(&mut slice)
            .ok_or_else(|| Error::invalid_format("bad block number in chunk position"))?;
        let chunk_offset = get_uvarint64(&mut slice)
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| Error::invalid_format("bad chunk offset in chunk position"))?;
        let chunk_size = get_uvarint32(&mut slice)
            .ok_or_else(|| Error::invalid_format("bad chunk size in chunk position"))?;

        Ok(Self {
            segment_id,
            block_number,
            chunk_offset,
            chunk_size,
        })
    }
}
