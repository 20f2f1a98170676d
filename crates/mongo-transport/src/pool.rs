//! Size-classed pool of reusable byte buffers.
//!
//! Buffers come in power-of-two classes from [`MIN_CLASS`] to [`MAX_CLASS`]
//! bytes. Requests above the largest class are allocated exactly and never
//! pooled. Each class keeps at most `max_per_class` idle buffers.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// Smallest pooled capacity.
pub const MIN_CLASS: usize = 512;
/// Largest pooled capacity.
pub const MAX_CLASS: usize = 64 * 1024;

const CLASS_COUNT: usize = (MAX_CLASS / MIN_CLASS).trailing_zeros() as usize + 1;
const DEFAULT_MAX_PER_CLASS: usize = 32;

static SHARED_POOL: Lazy<Arc<BufferPool>> = Lazy::new(|| Arc::new(BufferPool::default()));

/// A pool of `BytesMut` buffers grouped by capacity.
#[derive(Debug)]
pub struct BufferPool {
    classes: Mutex<[Vec<BytesMut>; CLASS_COUNT]>,
    max_per_class: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_CLASS)
    }
}

impl BufferPool {
    /// Create a pool keeping at most `max_per_class` idle buffers per class.
    #[must_use]
    pub fn new(max_per_class: usize) -> Self {
        Self {
            classes: Mutex::new(std::array::from_fn(|_| Vec::new())),
            max_per_class,
        }
    }

    /// The process-wide pool used by transports that are not given one.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED_POOL)
    }

    /// Smallest class that can hold `size` bytes.
    fn class_for_request(size: usize) -> Option<usize> {
        if size > MAX_CLASS {
            return None;
        }
        let rounded = size.max(MIN_CLASS).next_power_of_two();
        Some((rounded / MIN_CLASS).trailing_zeros() as usize)
    }

    /// Largest class a buffer of `capacity` fully covers.
    fn class_for_capacity(capacity: usize) -> Option<usize> {
        if capacity < MIN_CLASS {
            return None;
        }
        let floor = 1usize << (usize::BITS - 1 - capacity.leading_zeros());
        Some(((floor.min(MAX_CLASS)) / MIN_CLASS).trailing_zeros() as usize)
    }

    const fn class_size(class: usize) -> usize {
        MIN_CLASS << class
    }

    /// Get an empty buffer with capacity of at least `size` bytes.
    #[must_use]
    pub fn acquire(&self, size: usize) -> BytesMut {
        let Some(class) = Self::class_for_request(size) else {
            return BytesMut::with_capacity(size);
        };
        if let Some(buf) = self.classes.lock()[class].pop() {
            return buf;
        }
        BytesMut::with_capacity(Self::class_size(class))
    }

    /// Return a buffer for reuse. Its contents are discarded.
    pub fn release(&self, mut buf: BytesMut) {
        buf.clear();
        let Some(class) = Self::class_for_capacity(buf.capacity()) else {
            return;
        };
        let mut classes = self.classes.lock();
        if classes[class].len() < self.max_per_class {
            classes[class].push(buf);
        }
    }

    /// Return the storage behind a frozen region when nothing else shares it.
    pub fn release_bytes(&self, bytes: Bytes) {
        if let Ok(buf) = bytes.try_into_mut() {
            self.release(buf);
        }
    }

    /// Number of idle buffers across all classes.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.classes.lock().iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_selection() {
        assert_eq!(BufferPool::class_for_request(0), Some(0));
        assert_eq!(BufferPool::class_for_request(512), Some(0));
        assert_eq!(BufferPool::class_for_request(513), Some(1));
        assert_eq!(BufferPool::class_for_request(MAX_CLASS), Some(CLASS_COUNT - 1));
        assert_eq!(BufferPool::class_for_request(MAX_CLASS + 1), None);

        assert_eq!(BufferPool::class_for_capacity(100), None);
        assert_eq!(BufferPool::class_for_capacity(1000), Some(0));
        assert_eq!(BufferPool::class_for_capacity(1024), Some(1));
        assert_eq!(BufferPool::class_for_capacity(1 << 20), Some(CLASS_COUNT - 1));
    }

    #[test]
    fn test_acquire_capacity() {
        let pool = BufferPool::default();
        assert!(pool.acquire(100).capacity() >= 100);
        assert!(pool.acquire(3000).capacity() >= 3000);
        assert!(pool.acquire(MAX_CLASS * 2).capacity() >= MAX_CLASS * 2);
    }

    #[test]
    fn test_release_and_reuse() {
        let pool = BufferPool::default();
        let mut buf = pool.acquire(1024);
        buf.extend_from_slice(b"stale");
        let ptr = buf.as_ptr();
        pool.release(buf);
        assert_eq!(pool.idle_count(), 1);

        let again = pool.acquire(1024);
        assert!(again.is_empty());
        assert_eq!(again.as_ptr(), ptr);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_release_bytes_only_when_unique() {
        let pool = BufferPool::default();
        let mut buf = pool.acquire(2048);
        buf.extend_from_slice(&[1; 64]);
        let frozen = buf.freeze();
        let shared = frozen.clone();

        pool.release_bytes(frozen);
        assert_eq!(pool.idle_count(), 0);
        pool.release_bytes(shared);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_class_limit() {
        let pool = BufferPool::new(2);
        for _ in 0..5 {
            pool.release(BytesMut::with_capacity(MIN_CLASS));
        }
        assert_eq!(pool.idle_count(), 2);
    }
}
