//! Block caching for segment reads.
//!
//! - **LRU Cache**: Generic sharded LRU cache with an exact entry bound
//! - **Block Cache**: Caches full 32KB segment blocks keyed by segment id and block number

mod block_cache;
mod lru;

pub use block_cache::BlockCache;
pub use lru::{CacheStats, LruCache};
