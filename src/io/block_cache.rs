use std::num::NonZeroUsize;
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use lru::LruCache;

use super::RangeReader;
use crate::error::IoError;

/// Default block size: 64KB
/// Large enough to hold a typical IFD plus its small out-of-line values.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default cache capacity in number of blocks.
/// 64 blocks * 64KB = 4MB default cache size.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Block-based caching layer that wraps any RangeReader.
///
/// Walking an IFD chain issues many 2, 4 and 8 byte reads at scattered
/// offsets. The block cache turns these into a handful of block-sized reads
/// against the underlying source.
///
/// Features:
/// - Fixed-size block cache (default 64KB blocks)
/// - LRU eviction when cache reaches capacity
/// - Handles reads spanning multiple blocks
pub struct BlockCache<R> {
    /// The underlying reader
    inner: R,
    /// Block size in bytes
    block_size: usize,
    /// Cached blocks indexed by block number
    cache: Mutex<LruCache<u64, Bytes>>,
}

impl<R: RangeReader> BlockCache<R> {
    /// Create a new BlockCache wrapping the given reader.
    ///
    /// Uses default block size (64KB) and cache capacity (64 blocks).
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new BlockCache with custom block size and capacity.
    ///
    /// A zero block size or capacity is raised to 1.
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Get the wrapped reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Get a block from cache or fetch it from the underlying reader.
    fn get_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        // Fetch under the lock: concurrent readers of a missing block wait for one read.
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(data) = cache.get(&block_idx) {
            return Ok(data.clone());
        }

        let data = self.fetch_block_from_source(block_idx)?;
        cache.put(block_idx, data.clone());
        Ok(data)
    }

    /// Fetch a block directly from the underlying reader.
    fn fetch_block_from_source(&self, block_idx: u64) -> Result<Bytes, IoError> {
        let offset = block_idx * self.block_size as u64;
        let size = self.inner.size();

        // Calculate actual bytes to read (may be less for last block)
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: self.block_size as u64,
                size,
            });
        }

        let len = std::cmp::min(self.block_size as u64, remaining) as usize;
        self.inner.read_exact_at(offset, len)
    }

    #[inline]
    fn block_for_offset(&self, offset: u64) -> u64 {
        offset / self.block_size as u64
    }

    #[inline]
    fn offset_within_block(&self, offset: u64) -> usize {
        (offset % self.block_size as u64) as usize
    }
}

impl<R: RangeReader> RangeReader for BlockCache<R> {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.inner.size();
        let in_bounds = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= size);
        if !in_bounds {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let start_block = self.block_for_offset(offset);
        let end_block = self.block_for_offset(offset + len as u64 - 1);

        if start_block == end_block {
            let block = self.get_block(start_block)?;
            let block_offset = self.offset_within_block(offset);
            Ok(block.slice(block_offset..block_offset + len))
        } else {
            let mut result = BytesMut::with_capacity(len);
            let mut remaining = len;
            let mut current_offset = offset;

            for block_idx in start_block..=end_block {
                let block = self.get_block(block_idx)?;
                let block_offset = self.offset_within_block(current_offset);
                let bytes_in_block = std::cmp::min(block.len() - block_offset, remaining);

                result.extend_from_slice(&block[block_offset..block_offset + bytes_in_block]);

                remaining -= bytes_in_block;
                current_offset += bytes_in_block as u64;
            }

            Ok(result.freeze())
        }
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
