//! Merged iteration over every segment of a WAL.

use bytes::Bytes;

use crate::position::ChunkPosition;
use crate::segment::{SegmentCursor, SegmentId};
use crate::wal::Wal;
use crate::Result;

/// Iterates records across segments in ascending segment id order.
///
/// The reader holds one cursor per segment captured when it was created;
/// segments added later by rotation are not visited. Each step briefly takes
/// the WAL's shared lock, so writers make progress while a reader is alive.
///
/// As an [`Iterator`] the reader ends after the first error. The failing
/// record is not skipped: [`Reader::next_record`] returns the same error
/// again, and [`Reader::skip_current_segment`] moves past the damaged
/// segment and lets iteration continue.
///
/// # Example
///
/// ```rust,ignore
/// let mut reader = wal.new_reader();
/// while let Some((data, pos)) = reader.next_record()? {
///     println!("{:?} -> {} bytes", pos, data.len());
/// }
/// ```
pub struct Reader<'a> {
    wal: &'a Wal,
    cursors: Vec<SegmentCursor>,
    current: usize,
    /// Set when iteration yielded an error.
    failed: bool,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(wal: &'a Wal, cursors: Vec<SegmentCursor>) -> Self {
        Self {
            wal,
            cursors,
            current: 0,
            failed: false,
        }
    }

    /// Read the next record and its position.
    ///
    /// Returns `Ok(None)` once every segment is exhausted.
    pub fn next_record(&mut self) -> Result<Option<(Bytes, ChunkPosition)>> {
        while self.current < self.cursors.len() {
            if let Some(record) = self.step_current()? {
                return Ok(Some(record));
            }
            self.current += 1;
        }
        Ok(None)
    }

    /// Move on to the next segment without reading the rest of this one.
    pub fn skip_current_segment(&mut self) {
        if self.current < self.cursors.len() {
            self.current += 1;
        }
        self.failed = false;
    }

    /// Id of the segment being read, or `None` once exhausted.
    pub fn current_segment_id(&self) -> Option<SegmentId> {
        self.cursors.get(self.current).map(|c| c.segment_id)
    }

    /// Position of the record the next read will start from.
    pub fn current_chunk_position(&self) -> Option<ChunkPosition> {
        self.cursors.get(self.current).map(|c| c.position())
    }

    /// Advance to the first record at or after `start`.
    pub(crate) fn seek(&mut self, start: &ChunkPosition) -> Result<()> {
        while let Some(cursor) = self.cursors.get(self.current) {
            if cursor.segment_id < start.segment_id {
                self.skip_current_segment();
                continue;
            }
            if cursor.segment_id > start.segment_id {
                break;
            }
            if (cursor.block_number, cursor.chunk_offset)
                >= (start.block_number, start.chunk_offset)
            {
                break;
            }
            // Stay in this segment when it runs out, so the first record of
            // the next segment is not consumed here.
            if self.step_current()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Read one record from the current segment only.
    fn step_current(&mut self) -> Result<Option<(Bytes, ChunkPosition)>> {
        let Some(cursor) = self.cursors.get_mut(self.current) else {
            return Ok(None);
        };
        self.wal
            .with_segment(cursor.segment_id, |segment| cursor.advance(segment))
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<(Bytes, ChunkPosition)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_record().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
