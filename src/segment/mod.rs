//! Segment files.
//!
//! A segment is one append-only file made of 32KB blocks. Records are framed
//! into checksummed chunks and located by a
//! [`ChunkPosition`]. The file content is always a run of full blocks
//! followed by the partially filled current block.

mod chunk;
mod reader;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use log::{debug, warn};

use crate::cache::BlockCache;
use crate::position::ChunkPosition;
use crate::util::crc::crc32;
use crate::util::filename::{delete_file, segment_file_name};
use crate::util::pool::BufferPool;
use crate::{Error, Result};

pub(crate) use chunk::BlockCursor;
use chunk::ChunkHeader;
pub use reader::SegmentReader;
pub(crate) use reader::SegmentCursor;

/// Segment identifier, starting at 1.
pub type SegmentId = u32;

/// Block size for segments (32KB).
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Chunk header size: CRC (4) + Length (2) + Type (1) = 7 bytes.
pub const CHUNK_HEADER_SIZE: usize = 7;

/// Chunk types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    /// Complete record in a single chunk.
    Full = 0,
    /// First chunk of a record.
    First = 1,
    /// Middle chunk(s) of a record.
    Middle = 2,
    /// Last chunk of a record.
    Last = 3,
}

impl ChunkType {
    /// Create from byte value.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ChunkType::Full),
            1 => Some(ChunkType::First),
            2 => Some(ChunkType::Middle),
            3 => Some(ChunkType::Last),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// One append-only segment file.
pub struct Segment {
    id: SegmentId,
    path: PathBuf,
    /// `None` once closed.
    file: Option<File>,
    cursor: BlockCursor,
    cache: Option<Arc<BlockCache>>,
    /// Read buffers, shared by every segment of a WAL.
    block_pool: Arc<BufferPool>,
    #[cfg(test)]
    pub(crate) fail_next_write: bool,
}

impl Segment {
    /// Open (or create) the segment file `id` in `dir_path`.
    ///
    /// Block accounting resumes from the current file length. The segment
    /// gets its own read buffer pool.
    pub fn open(
        dir_path: &Path,
        ext: &str,
        id: SegmentId,
        cache: Option<Arc<BlockCache>>,
    ) -> Result<Self> {
        Self::open_shared(
            dir_path,
            ext,
            id,
            cache,
            Arc::new(BufferPool::new(BLOCK_SIZE)),
        )
    }

    /// Open a segment that borrows read buffers from `block_pool`.
    pub(crate) fn open_shared(
        dir_path: &Path,
        ext: &str,
        id: SegmentId,
        cache: Option<Arc<BlockCache>>,
        block_pool: Arc<BufferPool>,
    ) -> Result<Self> {
        let path = segment_file_name(dir_path, ext, id);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let len = file.metadata()?.len();
        debug!("opened segment {} ({} bytes)", path.display(), len);

        Ok(Self {
            id,
            path,
            file: Some(file),
            cursor: BlockCursor::from_len(len),
            cache,
            block_pool,
            #[cfg(test)]
            fail_next_write: false,
        })
    }

    /// Segment id.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the segment has been closed.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Block currently being filled.
    pub fn current_block_number(&self) -> u32 {
        self.cursor.block_number
    }

    /// Bytes used in the current block.
    pub fn current_block_size(&self) -> u32 {
        self.cursor.block_size
    }

    /// Logical size in bytes: `block_number * BLOCK_SIZE + block_size`.
    pub fn size(&self) -> u64 {
        self.cursor.size()
    }

    #[cfg(test)]
    pub(crate) fn block_pool(&self) -> &Arc<BufferPool> {
        &self.block_pool
    }

    /// Create a forward reader starting at the first record.
    pub fn new_reader(&self) -> SegmentReader<'_> {
        SegmentReader::new(self)
    }

    /// Append one record.
    pub fn write(&mut self, data: &[u8]) -> Result<ChunkPosition> {
        let id = self.id;
        self.append(|cursor, buf| cursor.append_record(id, data, buf))
    }

    /// Append a batch of records with a single file write.
    ///
    /// Either every record is persisted or none is: on failure the block
    /// counters keep their pre-call values and the file is truncated back to
    /// its previous length.
    pub fn write_all<'a, I>(&mut self, records: I) -> Result<Vec<ChunkPosition>>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let id = self.id;
        self.append(|cursor, buf| {
            records
                .into_iter()
                .map(|data| cursor.append_record(id, data, buf))
                .collect()
        })
    }

    /// Frame into a scratch buffer on a copy of the cursor, write it, and
    /// commit the cursor only if the write succeeded.
    fn append<T>(
        &mut self,
        frame: impl FnOnce(&mut BlockCursor, &mut BytesMut) -> T,
    ) -> Result<T> {
        if self.file.is_none() {
            return Err(Error::Closed);
        }

        let mut cursor = self.cursor;
        let mut buf = BytesMut::new();
        let framed = frame(&mut cursor, &mut buf);

        if let Err(err) = self.write_buffer(&buf) {
            self.rollback();
            return Err(err);
        }

        self.cursor = cursor;
        Ok(framed)
    }

    fn write_buffer(&mut self, buf: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::Closed)?;

        #[cfg(test)]
        {
            if std::mem::take(&mut self.fail_next_write) {
                // Simulate a torn write: half of the buffer reaches the file.
                file.write_all(&buf[..buf.len() / 2])?;
                return Err(Error::Io("injected write failure".into()));
            }
        }

        file.write_all(buf)?;
        Ok(())
    }

    /// Drop any bytes a failed write left past the committed size.
    fn rollback(&mut self) {
        let size = self.cursor.size();
        if let Some(file) = self.file.as_ref() {
            if let Err(e) = file.set_len(size) {
                warn!(
                    "failed to truncate segment {} back to {} bytes: {}",
                    self.path.display(),
                    size,
                    e
                );
            }
        }
    }

    /// Read the record whose first chunk is at (`block_number`, `chunk_offset`).
    pub fn read(&self, block_number: u32, chunk_offset: i64) -> Result<Bytes> {
        match self.read_internal(block_number, chunk_offset)? {
            Some((data, _)) => Ok(data),
            None => Err(Error::PositionOutOfRange {
                segment_id: self.id,
                block_number,
                chunk_offset,
            }),
        }
    }

    /// Read a record and return it with the position of the following one.
    ///
    /// Returns `Ok(None)` when the position is at or past the end of the
    /// written data.
    pub(crate) fn read_internal(
        &self,
        mut block_number: u32,
        mut chunk_offset: i64,
    ) -> Result<Option<(Bytes, ChunkPosition)>> {
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        let segment_size = self.size();
        let mut block = self.block_pool.get();
        let mut record = Vec::new();
        let mut in_fragmented_record = false;

        loop {
            let offset = block_number as u64 * BLOCK_SIZE as u64;
            let size = segment_size.saturating_sub(offset).min(BLOCK_SIZE as u64) as usize;

            if chunk_offset < 0 || chunk_offset as usize >= size {
                // Also covers a record torn off at the end of the file.
                return Ok(None);
            }

            self.load_block(file, block_number, offset, &mut block[..size])?;
            let block = &block[..size];

            let start = chunk_offset as usize;
            let header = ChunkHeader::parse(&block[start..]).ok_or_else(|| {
                Error::corruption(format!(
                    "chunk header at block {} offset {} overruns the block",
                    block_number, start
                ))
            })?;
            let payload_start = start + CHUNK_HEADER_SIZE;
            let payload_end = payload_start + header.length as usize;
            if payload_end > size {
                return Err(Error::corruption(format!(
                    "chunk at block {} offset {} overruns the block",
                    block_number, start
                )));
            }

            let actual = crc32(&block[start + 4..payload_end]);
            if actual != header.checksum {
                return Err(Error::InvalidCrc {
                    expected: header.checksum,
                    actual,
                });
            }

            let chunk_type = ChunkType::from_byte(header.chunk_type).ok_or_else(|| {
                Error::corruption(format!("invalid chunk type {}", header.chunk_type))
            })?;
            match (in_fragmented_record, chunk_type) {
                (false, ChunkType::Full | ChunkType::First)
                | (true, ChunkType::Middle | ChunkType::Last) => {}
                _ => {
                    return Err(Error::corruption(format!(
                        "unexpected {:?} chunk at block {} offset {}",
                        chunk_type, block_number, start
                    )))
                }
            }
            record.extend_from_slice(&block[payload_start..payload_end]);

            if matches!(chunk_type, ChunkType::Full | ChunkType::Last) {
                let mut next = ChunkPosition {
                    segment_id: self.id,
                    block_number,
                    chunk_offset: payload_end as i64,
                    chunk_size: 0,
                };
                // The rest of the block is padding.
                if payload_end + CHUNK_HEADER_SIZE >= BLOCK_SIZE {
                    next.block_number += 1;
                    next.chunk_offset = 0;
                }
                return Ok(Some((Bytes::from(record), next)));
            }

            in_fragmented_record = true;
            block_number += 1;
            chunk_offset = 0;
        }
    }

    /// Fill `buf` with block `block_number`, going through the block cache.
    ///
    /// Only full blocks are inserted into the cache.
    fn load_block(
        &self,
        file: &File,
        block_number: u32,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(self.id, block_number) {
                if cached.len() >= buf.len() {
                    buf.copy_from_slice(&cached[..buf.len()]);
                    return Ok(());
                }
            }
        }

        read_exact_at(file, buf, offset)?;

        if let Some(cache) = &self.cache {
            if buf.len() == BLOCK_SIZE {
                cache.insert(self.id, block_number, Bytes::copy_from_slice(buf));
            }
        }
        Ok(())
    }

    /// Flush the segment file to stable storage. A no-op once closed.
    pub fn sync(&self) -> Result<()> {
        match &self.file {
            Some(file) => {
                file.sync_all()?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Sync and close the segment file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => {
                file.sync_all()?;
                debug!("closed segment {}", self.path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Close the segment and delete its file.
    pub fn remove(&mut self) -> Result<()> {
        // The file is going away, a failed sync does not matter.
        drop(self.file.take());
        delete_file(&self.path)?;
        debug!("removed segment {}", self.path.display());
        Ok(())
    }

    /// Rename the (closed) segment file to `new_path`.
    pub(crate) fn rename(&mut self, new_path: PathBuf) -> Result<()> {
        std::fs::rename(&self.path, &new_path)?;
        self.path = new_path;
        Ok(())
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
