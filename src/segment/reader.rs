//! Forward iteration over one segment.

use bytes::Bytes;

use super::{Segment, SegmentId, BLOCK_SIZE};
use crate::position::ChunkPosition;
use crate::{Error, Result};

/// Read cursor into one segment, detached from the segment itself.
///
/// The WAL-level reader keeps one cursor per segment and only borrows the
/// segment for the duration of each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentCursor {
    pub segment_id: SegmentId,
    pub block_number: u32,
    pub chunk_offset: i64,
}

impl SegmentCursor {
    pub fn new(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            block_number: 0,
            chunk_offset: 0,
        }
    }

    /// Position of the record the next step will return.
    pub fn position(&self) -> ChunkPosition {
        ChunkPosition {
            segment_id: self.segment_id,
            block_number: self.block_number,
            chunk_offset: self.chunk_offset,
            chunk_size: 0,
        }
    }

    /// Read the record under the cursor from `segment` and move past it.
    ///
    /// Returns `Ok(None)` once the segment is exhausted.
    pub fn advance(&mut self, segment: &Segment) -> Result<Option<(Bytes, ChunkPosition)>> {
        if segment.is_closed() {
            return Err(Error::Closed);
        }

        let Some((data, next)) = segment.read_internal(self.block_number, self.chunk_offset)?
        else {
            return Ok(None);
        };

        let mut position = self.position();
        // Estimate only: includes any padding up to the next record.
        let start = self.block_number as u64 * BLOCK_SIZE as u64 + self.chunk_offset as u64;
        let end = next.block_number as u64 * BLOCK_SIZE as u64 + next.chunk_offset as u64;
        position.chunk_size = u32::try_from(end - start).unwrap_or(u32::MAX);

        self.block_number = next.block_number;
        self.chunk_offset = next.chunk_offset;

        Ok(Some((data, position)))
    }
}

/// Iterates every record of a segment in write order.
pub struct SegmentReader<'a> {
    segment: &'a Segment,
    cursor: SegmentCursor,
}

impl<'a> SegmentReader<'a> {
    pub(crate) fn new(segment: &'a Segment) -> Self {
        Self {
            segment,
            cursor: SegmentCursor::new(segment.id()),
        }
    }

    /// Read the next record and its position.
    ///
    /// Returns `Ok(None)` when there are no more records.
    pub fn next_record(&mut self) -> Result<Option<(Bytes, ChunkPosition)>> {
        self.cursor.advance(self.segment)
    }

    /// Position of the record the next call will return.
    pub fn position(&self) -> ChunkPosition {
        self.cursor.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::CHUNK_HEADER_SIZE;
    use std::path::Path;
    use tempfile::tempdir;

    fn open_segment(dir: &Path) -> Segment {
        Segment::open(dir, ".SEG", 1, None).unwrap()
    }

    #[test]
    fn test_reader_empty_segment() {
        let dir = tempdir().unwrap();
        let seg = open_segment(dir.path());

        let mut reader = seg.new_reader();
        assert!(reader.next_record().unwrap().is_none());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_multiple_records() {
        let dir = tempdir().unwrap();
        let mut seg = open_segment(dir.path());

        let mut written = Vec::new();
        for i in 0..10 {
            let data = format!("record {}", i);
            written.push(seg.write(data.as_bytes()).unwrap());
        }

        let mut reader = seg.new_reader();
        for (i, expected_pos) in written.iter().enumerate() {
            assert_eq!(reader.position().chunk_offset, expected_pos.chunk_offset);
            let (data, pos) = reader.next_record().unwrap().unwrap();
            assert_eq!(&data[..], format!("record {}", i).as_bytes());
            assert_eq!(pos.block_number, expected_pos.block_number);
            assert_eq!(pos.chunk_offset, expected_pos.chunk_offset);
            assert_eq!(pos.chunk_size, expected_pos.chunk_size);
        }

        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_mixed_sizes() {
        let dir = tempdir().unwrap();
        let mut seg = open_segment(dir.path());

        let records: Vec<Vec<u8>> = vec![
            b"small".to_vec(),
            vec![b'x'; 1000],
            b"".to_vec(),
            vec![b'y'; BLOCK_SIZE + 100], // Spans blocks
            vec![b'z'; BLOCK_SIZE * 3],
            b"end".to_vec(),
        ];
        for record in &records {
            seg.write(record).unwrap();
        }

        let mut reader = seg.new_reader();
        for expected in &records {
            let (data, _) = reader.next_record().unwrap().unwrap();
            assert_eq!(&data[..], &expected[..]);
        }
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_skips_block_padding() {
        let dir = tempdir().unwrap();
        let mut seg = open_segment(dir.path());

        // Leave 3 bytes in block 0, too few for a header.
        let filler = vec![0xAB; BLOCK_SIZE - 3 - CHUNK_HEADER_SIZE];
        seg.write(&filler).unwrap();
        let second = seg.write(b"next block").unwrap();
        assert_eq!(second.block_number, 1);
        assert_eq!(second.chunk_offset, 0);

        let mut reader = seg.new_reader();
        let (_, first_pos) = reader.next_record().unwrap().unwrap();
        // The estimate spans the padding.
        assert_eq!(first_pos.chunk_size as usize, BLOCK_SIZE);
        let (data, pos) = reader.next_record().unwrap().unwrap();
        assert_eq!(&data[..], b"next block");
        assert_eq!(pos.block_number, 1);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_sees_later_writes() {
        let dir = tempdir().unwrap();
        let mut seg = open_segment(dir.path());
        seg.write(b"one").unwrap();

        let mut cursor = SegmentCursor::new(seg.id());
        assert!(cursor.advance(&seg).unwrap().is_some());
        assert!(cursor.advance(&seg).unwrap().is_none());

        seg.write(b"two").unwrap();
        let (data, _) = cursor.advance(&seg).unwrap().unwrap();
        assert_eq!(&data[..], b"two");
    }

    #[test]
    fn test_reader_closed_segment() {
        let dir = tempdir().unwrap();
        let mut seg = open_segment(dir.path());
        seg.write(b"one").unwrap();
        seg.close().unwrap();

        let mut reader = seg.new_reader();
        assert_eq!(reader.next_record().unwrap_err(), Error::Closed);
    }
}
