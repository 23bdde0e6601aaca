//! Fixed-pool allocator of storage blocks.
//!
//! Hands out fixed-size blocks from a contiguous backing region, tracked by
//! one bit per block. Offsets are expressed in bytes relative to the region's
//! configured base, so the region may be mapped at different addresses
//! without invalidating any bookkeeping.
//!
//! The allocator carries its own mutex and is safe to call from any thread.
//! Inside the manager the lock order is manager mutex → allocator mutex,
//! never reversed.

use parking_lot::Mutex;

use crate::constants::{BLOCK_SIZE, MAX_BLOCKS_PER_CHUNK};
use crate::stdx::bitset::BitSet;

/// Errors surfaced by block allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// Fewer free blocks remain than the request asked for.
    #[error("no free storage blocks")]
    OutOfMemory,

    /// The request exceeds the per-chunk block limit.
    #[error("allocation request exceeds {MAX_BLOCKS_PER_CHUNK} blocks")]
    OutOfRange,
}

/// Allocator over `NUM_BLOCKS` fixed-size blocks.
///
/// `WORDS` must equal `words_for_bits(NUM_BLOCKS)`. A set bit means the
/// block is in use. Multi-block requests are all-or-nothing and claim blocks
/// in ascending offset order, so allocation after a matching free is
/// reproducible (see [`BitSet::claim`]).
#[derive(Debug)]
pub struct BlockAllocator<const NUM_BLOCKS: usize, const WORDS: usize> {
    pool: Mutex<BitSet<NUM_BLOCKS, WORDS>>,
    /// Byte offset of block 0 within the backing region.
    offset: usize,
}

impl<const NUM_BLOCKS: usize, const WORDS: usize> BlockAllocator<NUM_BLOCKS, WORDS> {
    /// Creates an allocator whose first block lives `offset` bytes into the
    /// backing region. All blocks start out free.
    pub fn new(offset: usize) -> Self {
        Self {
            pool: Mutex::new(BitSet::empty()),
            offset,
        }
    }

    /// Allocates a single block, returning its byte offset.
    pub fn allocate(&self) -> Result<usize, AllocError> {
        let mut index = [0usize; 1];
        let mut pool = self.pool.lock();
        if !pool.claim(&mut index) {
            return Err(AllocError::OutOfMemory);
        }
        Ok(self.offset + index[0] * BLOCK_SIZE)
    }

    /// Allocates `offsets.len()` blocks, writing their byte offsets in
    /// ascending order. Either every block is claimed or none is.
    pub fn allocate_many(&self, offsets: &mut [usize]) -> Result<(), AllocError> {
        let n = offsets.len();
        if n > MAX_BLOCKS_PER_CHUNK {
            return Err(AllocError::OutOfRange);
        }
        if n == 0 {
            return Ok(());
        }

        let mut indexes = [0usize; MAX_BLOCKS_PER_CHUNK];
        let mut pool = self.pool.lock();
        if !pool.claim(&mut indexes[..n]) {
            return Err(AllocError::OutOfMemory);
        }
        for (offset, &index) in offsets.iter_mut().zip(&indexes[..n]) {
            *offset = self.offset + index * BLOCK_SIZE;
        }
        Ok(())
    }

    /// Returns blocks to the pool.
    ///
    /// Panics if any offset was not produced by this allocator or is already
    /// free: both indicate corrupted bookkeeping.
    pub fn free_many(&self, offsets: &[usize]) {
        assert!(offsets.len() <= MAX_BLOCKS_PER_CHUNK);

        let mut indexes = [0usize; MAX_BLOCKS_PER_CHUNK];
        for (index, &offset) in indexes.iter_mut().zip(offsets) {
            assert!(offset >= self.offset, "block not allocated by this allocator");
            let relative = offset - self.offset;
            assert!(relative.is_multiple_of(BLOCK_SIZE), "invalid block offset");
            let block = relative / BLOCK_SIZE;
            assert!(block < NUM_BLOCKS, "block not allocated by this allocator");
            *index = block;
        }

        // BitSet::release asserts each bit is currently set.
        self.pool.lock().release(&indexes[..offsets.len()]);
    }

    /// Returns the number of free blocks remaining.
    pub fn free_count(&self) -> usize {
        self.pool.lock().count_zeros()
    }
}
