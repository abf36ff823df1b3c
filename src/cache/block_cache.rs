//! Block cache for full segment blocks.
//!
//! Only complete 32KB blocks are ever inserted, and only by the read path.
//! The block still being filled by the writer is never cached, so a cached
//! block is immutable for the lifetime of the WAL.

use std::sync::Arc;

use bytes::Bytes;

use super::lru::{CacheStats, LruCache};
use crate::segment::SegmentId;

/// Composite cache key: `segment_id << 32 | block_number`.
pub fn block_cache_key(segment_id: SegmentId, block_number: u32) -> u64 {
    ((segment_id as u64) << 32) | block_number as u64
}

/// Block cache shared by every segment of one WAL.
pub struct BlockCache {
    cache: LruCache<u64, Bytes>,
}

impl BlockCache {
    /// Create a new block cache with the given capacity (in number of blocks).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Get a block from the cache.
    pub fn get(&self, segment_id: SegmentId, block_number: u32) -> Option<Bytes> {
        self.cache.get(&block_cache_key(segment_id, block_number))
    }

    /// Insert a block into the cache.
    pub fn insert(&self, segment_id: SegmentId, block_number: u32, block: Bytes) {
        self.cache
            .insert(block_cache_key(segment_id, block_number), block);
    }

    /// Maximum number of cached blocks.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Get the number of cached blocks.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        self.cache.stats()
    }

    /// Drop every cached block.
    pub fn purge(&self) {
        self.cache.clear();
    }
}
