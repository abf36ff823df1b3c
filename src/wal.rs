//! Wal - the write-ahead log aggregate.
//!
//! A WAL is a directory of segment files. Exactly one segment (the one with
//! the highest id) is active and receives writes; all others are older
//! segments that are only read. When a write would push the active segment
//! past `Options::segment_size`, the active segment is synced and a new one
//! with the next id takes its place.
//!
//! # Thread Safety
//!
//! `Wal` is `Send + Sync` and is meant to be shared through an `Arc`.
//! Reads take a shared lock; writes, rotation, `close` and `delete` take an
//! exclusive lock. Records staged with [`Wal::pending_writes`] live behind a
//! separate lock so producers can stage while a flush is running.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::cache::{BlockCache, CacheStats};
use crate::options::{validate_file_ext, Options, SyncMode};
use crate::position::ChunkPosition;
use crate::reader::Reader;
use crate::segment::{Segment, SegmentCursor, SegmentId, BLOCK_SIZE, CHUNK_HEADER_SIZE};
use crate::util::filename::{
    create_dir_if_missing, list_segment_ids, segment_file_name, sync_dir,
};
use crate::util::pool::BufferPool;
use crate::{Error, Result};

/// Id of the first segment of a new WAL.
pub const INITIAL_SEGMENT_ID: SegmentId = 1;

/// Mutable state guarded by the main lock.
struct WalInner {
    /// Segment receiving new writes.
    active: Segment,
    /// Closed-for-writing segments, only read.
    older: BTreeMap<SegmentId, Segment>,
    /// Current segment file extension.
    segment_file_ext: String,
    /// Bytes appended since the active segment was last synced.
    bytes_since_sync: u64,
    closed: bool,
    deleted: bool,
}

impl WalInner {
    fn segment(&self, id: SegmentId) -> Option<&Segment> {
        if id == self.active.id() {
            Some(&self.active)
        } else {
            self.older.get(&id)
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn segments_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.older
            .values_mut()
            .chain(std::iter::once(&mut self.active))
    }
}

/// Records staged for the next [`Wal::write_all`].
#[derive(Default)]
struct PendingWrites {
    records: Vec<Bytes>,
    /// Worst-case on-disk size of `records`.
    size: u64,
}

/// Write-ahead log over a directory of segment files.
pub struct Wal {
    /// Directory holding the segment files.
    dir_path: PathBuf,
    options: Options,
    inner: RwLock<WalInner>,
    pending: Mutex<PendingWrites>,
    /// Shared by every segment of this WAL.
    block_cache: Option<Arc<BlockCache>>,
    /// Block read buffers, shared by every segment of this WAL.
    block_pool: Arc<BufferPool>,
}

impl Wal {
    /// Open a WAL in the given directory with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, Options::default())
    }

    /// Open a WAL with custom options.
    ///
    /// The directory is created if missing. Every segment file in it is
    /// opened; the highest id becomes the active segment. An empty directory
    /// starts with segment 1.
    pub fn open_with_options(path: impl AsRef<Path>, options: Options) -> Result<Self> {
        options.validate()?;
        let dir_path = path.as_ref().to_path_buf();
        create_dir_if_missing(&dir_path)?;

        let block_cache = match options.block_cache_capacity() {
            0 => None,
            blocks => Some(Arc::new(BlockCache::new(blocks))),
        };

        let block_pool = Arc::new(BufferPool::new(BLOCK_SIZE));
        let open_segment = |id: SegmentId| {
            Segment::open_shared(
                &dir_path,
                &options.segment_file_ext,
                id,
                block_cache.clone(),
                Arc::clone(&block_pool),
            )
        };

        let ext = options.segment_file_ext.clone();
        let ids = list_segment_ids(&dir_path, &ext)?;
        debug!(
            "opening wal at {} with segments {:?}",
            dir_path.display(),
            ids
        );

        let mut older = BTreeMap::new();
        let active = match ids.split_last() {
            None => open_segment(INITIAL_SEGMENT_ID)?,
            Some((&last, rest)) => {
                for &id in rest {
                    older.insert(id, open_segment(id)?);
                }
                open_segment(last)?
            }
        };

        Ok(Self {
            dir_path,
            options,
            inner: RwLock::new(WalInner {
                active,
                older,
                segment_file_ext: ext,
                bytes_since_sync: 0,
                closed: false,
                deleted: false,
            }),
            pending: Mutex::new(PendingWrites::default()),
            block_cache,
            block_pool,
        })
    }

    /// Directory of the segment files.
    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    /// Options the WAL was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Id of the active segment.
    pub fn active_segment_id(&self) -> SegmentId {
        self.inner.read().active.id()
    }

    /// True when the WAL holds only one, empty, active segment.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.older.is_empty() && inner.active.size() == 0
    }

    /// Block cache statistics, if the cache is enabled.
    pub fn block_cache_stats(&self) -> Option<Arc<CacheStats>> {
        self.block_cache.as_ref().map(|cache| cache.stats())
    }

    /// Append one record and return its position.
    ///
    /// Rotates the active segment first if the record might not fit, then
    /// applies the sync policy.
    pub fn write(&self, data: &[u8]) -> Result<ChunkPosition> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;

        let size = data.len() as u64;
        if size + CHUNK_HEADER_SIZE as u64 > self.options.segment_size {
            return Err(Error::ValueTooLarge {
                size,
                max: self.options.segment_size,
            });
        }

        if self.needs_rotation(&inner, max_data_write_size(size)) {
            self.rotate_active_segment(&mut inner)?;
        }

        let position = inner.active.write(data)?;
        inner.bytes_since_sync += position.chunk_size as u64;

        let need_sync = match self.options.sync_mode {
            SyncMode::Always => true,
            SyncMode::Bytes { bytes } => bytes > 0 && inner.bytes_since_sync >= bytes,
            SyncMode::None => false,
        };
        if need_sync {
            inner.active.sync()?;
            inner.bytes_since_sync = 0;
        }

        Ok(position)
    }

    /// Stage a record for the next [`Wal::write_all`].
    pub fn pending_writes(&self, data: &[u8]) {
        let mut pending = self.pending.lock();
        pending.size += max_data_write_size(data.len() as u64);
        pending.records.push(Bytes::copy_from_slice(data));
    }

    /// Drop every staged record without writing it.
    pub fn clear_pending_writes(&self) {
        let mut pending = self.pending.lock();
        pending.records.clear();
        pending.size = 0;
    }

    /// Number of staged records.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().records.len()
    }

    /// Write every staged record to the active segment with one file write.
    ///
    /// Returns one position per record, in staging order. The staged records
    /// are cleared whether or not the write succeeds. The sync policy is not
    /// applied; call [`Wal::sync`] for durability.
    pub fn write_all(&self) -> Result<Vec<ChunkPosition>> {
        let mut inner = self.inner.write();
        let pending = std::mem::take(&mut *self.pending.lock());
        if pending.records.is_empty() {
            return Ok(Vec::new());
        }
        inner.ensure_open()?;

        if pending.size > self.options.segment_size {
            return Err(Error::PendingSizeTooLarge {
                size: pending.size,
                max: self.options.segment_size,
            });
        }

        if self.needs_rotation(&inner, pending.size) {
            self.rotate_active_segment(&mut inner)?;
        }

        let positions = inner
            .active
            .write_all(pending.records.iter().map(|r| r.as_ref()))?;
        inner.bytes_since_sync += positions.iter().map(|p| p.chunk_size as u64).sum::<u64>();

        Ok(positions)
    }

    /// Read the record at `position`.
    pub fn read(&self, position: &ChunkPosition) -> Result<Bytes> {
        self.with_segment(position.segment_id, |segment| {
            segment.read(position.block_number, position.chunk_offset)
        })
    }

    /// Reader over every record of the WAL.
    pub fn new_reader(&self) -> Reader<'_> {
        self.new_reader_with_max(0)
    }

    /// Reader over the segments whose id is at most `max_segment_id`
    /// (0 means all segments).
    pub fn new_reader_with_max(&self, max_segment_id: SegmentId) -> Reader<'_> {
        let inner = self.inner.read();
        let in_range = |id: SegmentId| max_segment_id == 0 || id <= max_segment_id;

        let mut cursors: Vec<SegmentCursor> = inner
            .older
            .keys()
            .copied()
            .filter(|&id| in_range(id))
            .map(SegmentCursor::new)
            .collect();
        if in_range(inner.active.id()) {
            cursors.push(SegmentCursor::new(inner.active.id()));
        }

        Reader::new(self, cursors)
    }

    /// Reader positioned at the first record at or after `start`.
    ///
    /// Whole segments before `start.segment_id` are skipped; inside that
    /// segment records are read and discarded until the cursor reaches
    /// `start`.
    pub fn new_reader_with_start(&self, start: &ChunkPosition) -> Result<Reader<'_>> {
        let mut reader = self.new_reader();
        reader.seek(start)?;
        Ok(reader)
    }

    /// Sync the active segment to stable storage.
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.active.sync()?;
        inner.bytes_since_sync = 0;
        Ok(())
    }

    /// Sync the active segment and start a new one even if it is not full.
    pub fn open_new_active_segment(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        self.rotate_active_segment(&mut inner)
    }

    /// Close every segment. Closing twice is a no-op.
    ///
    /// All segments are attempted; the first failure is returned.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        if let Some(cache) = &self.block_cache {
            cache.purge();
        }

        let mut first_err = None;
        for segment in inner.segments_mut() {
            if let Err(e) = segment.close() {
                warn!("failed to close segment {}: {}", segment.path().display(), e);
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Close the WAL and remove every segment file.
    ///
    /// All segments are attempted; the first failure is returned. Segments
    /// whose removal failed stay registered so a later `delete` retries them.
    pub fn delete(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.deleted {
            return Ok(());
        }
        inner.closed = true;

        if let Some(cache) = &self.block_cache {
            cache.purge();
        }

        let mut first_err = None;
        let WalInner { active, older, .. } = &mut *inner;
        older.retain(|_, segment| match segment.remove() {
            Ok(()) => false,
            Err(e) => {
                warn!("failed to remove segment {}: {}", segment.path().display(), e);
                first_err.get_or_insert(e);
                true
            }
        });
        if let Err(e) = active.remove() {
            warn!("failed to remove segment {}: {}", active.path().display(), e);
            first_err.get_or_insert(e);
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                inner.deleted = true;
                info!("deleted wal at {}", self.dir_path.display());
                Ok(())
            }
        }
    }

    /// Rename every segment file of a closed WAL to the extension `ext`.
    pub fn rename_file_ext(&self, ext: &str) -> Result<()> {
        validate_file_ext(ext)?;

        let mut inner = self.inner.write();
        if !inner.closed {
            return Err(Error::invalid_config(
                "segment files can only be renamed after close",
            ));
        }

        if !inner.deleted {
            let dir_path = self.dir_path.clone();
            for segment in inner.segments_mut() {
                let new_path = segment_file_name(&dir_path, ext, segment.id());
                segment.rename(new_path)?;
            }
            sync_dir(&self.dir_path)?;
        }

        inner.segment_file_ext = ext.to_string();
        Ok(())
    }

    /// Run `f` against segment `id` under the shared lock.
    pub(crate) fn with_segment<R>(
        &self,
        id: SegmentId,
        f: impl FnOnce(&Segment) -> Result<R>,
    ) -> Result<R> {
        let inner = self.inner.read();
        match inner.segment(id) {
            Some(segment) => f(segment),
            None => Err(Error::SegmentNotFound {
                segment_id: id,
                ext: inner.segment_file_ext.clone(),
            }),
        }
    }

    /// Whether `incoming` more bytes could push the active segment past the limit.
    ///
    /// An empty active segment is never rotated away.
    fn needs_rotation(&self, inner: &WalInner, incoming: u64) -> bool {
        let active_size = inner.active.size();
        active_size > 0 && active_size + incoming > self.options.segment_size
    }

    /// Sync the active segment, move it to the older segments and open the next id.
    fn rotate_active_segment(&self, inner: &mut WalInner) -> Result<()> {
        inner.active.sync()?;

        let next_id = inner.active.id() + 1;
        let segment = Segment::open_shared(
            &self.dir_path,
            &inner.segment_file_ext,
            next_id,
            self.block_cache.clone(),
            Arc::clone(&self.block_pool),
        )?;
        sync_dir(&self.dir_path)?;

        let old = std::mem::replace(&mut inner.active, segment);
        info!(
            "rotated wal segment {} ({} bytes) -> {}",
            old.id(),
            old.size(),
            next_id
        );
        inner.older.insert(old.id(), old);
        inner.bytes_since_sync = 0;
        Ok(())
    }
}

/// Worst-case on-disk size of a record of `size` bytes.
///
/// Leaves room for a leading header's worth of padding and one header per
/// block the record can touch.
pub(crate) fn max_data_write_size(size: u64) -> u64 {
    let header = CHUNK_HEADER_SIZE as u64;
    header + size + (size / BLOCK_SIZE as u64 + 1) * header
}
