//! Reusable fixed-size block buffers.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Upper bound on idle buffers kept around.
pub(crate) const MAX_IDLE_BUFFERS: usize = 16;

/// A pool of equally sized byte buffers.
///
/// Buffers handed out by [`BufferPool::get`] may hold bytes from a previous
/// borrower; callers must only read ranges they have filled themselves.
pub struct BufferPool {
    buffer_size: usize,
    idle: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    /// Create an empty pool of `buffer_size` byte buffers.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a buffer of exactly `buffer_size` bytes.
    ///
    /// The buffer goes back to the pool when the guard is dropped.
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size]);
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    /// Return a buffer to the pool.
    pub fn put(&self, buf: Vec<u8>) {
        if buf.len() != self.buffer_size {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE_BUFFERS {
            idle.push(buf);
        }
    }

    /// Number of idle buffers.
    #[cfg(test)]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// A buffer borrowed from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuse() {
        let pool = BufferPool::new(64);
        {
            let mut buf = pool.get();
            assert_eq!(buf.len(), 64);
            buf[0] = 42;
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);

        let buf = pool.get();
        assert_eq!(buf.len(), 64);
        assert_eq!(pool.idle_count(), 0);
        drop(buf);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_pool_rejects_wrong_size() {
        let pool = BufferPool::new(64);
        pool.put(vec![0u8; 8]);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_pool_bounded() {
        let pool = BufferPool::new(8);
        for _ in 0..MAX_IDLE_BUFFERS + 4 {
            pool.put(vec![0u8; 8]);
        }
        assert_eq!(pool.idle_count(), MAX_IDLE_BUFFERS);
    }
}
