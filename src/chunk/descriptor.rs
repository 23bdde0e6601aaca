//! Pool entries for the visit tracker and the chunk table.

use crate::constants::{ENTRIES_PER_BLOCK, MAX_BLOCKS_PER_CHUNK, MAX_VISITS_IN_FLIGHT};
use crate::stdx::fifo::Fifo;
use crate::stdx::hashed_set::{NIL_ID, SetEntry};

/// Number of blocks needed to hold `entries` entries.
#[inline]
pub(crate) fn blocks_for_entries(entries: u32) -> u32 {
    entries.div_ceil(ENTRIES_PER_BLOCK as u32)
}

/// One in-flight observation of a field of view.
///
/// Created by `register_visit`, flagged by `fail_visit`, destroyed by
/// `end_visit`.
#[derive(Clone, Copy, Debug)]
pub struct Visit {
    id: i64,
    failed: bool,
    next_in_chain: i32,
}

impl Visit {
    /// Returns whether the visit has been marked failed.
    #[inline]
    pub fn failed(&self) -> bool {
        self.failed
    }

    #[inline]
    pub(crate) fn set_failed(&mut self) {
        self.failed = true;
    }
}

impl Default for Visit {
    fn default() -> Self {
        Self {
            id: NIL_ID,
            failed: false,
            next_in_chain: -1,
        }
    }
}

impl SetEntry for Visit {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn next_in_chain(&self) -> i32 {
        self.next_in_chain
    }
    fn set_next_in_chain(&mut self, next: i32) {
        self.next_in_chain = next;
    }
}

/// The manager's knowledge of one chunk of sky data.
///
/// A live descriptor always names exactly one owner (`visit_id`). Entry
/// counts, not entry contents, are tracked here: `size` is the total entry
/// count and `delta` the count already present when the current owner took
/// over, so a rollback can truncate back to the last committed snapshot.
/// Blocks in `blocks[..num_blocks]` stay allocated across a rollback; only
/// `next_block` (blocks in active use) shrinks. They are returned to the
/// allocator when the descriptor is erased.
#[derive(Clone, Copy, Debug)]
pub struct ChunkDescriptor {
    id: i64,
    pub(crate) visit_id: i64,
    /// True once a successful read or commit has made the contents
    /// consistent; false means the owner must refill from disk.
    pub(crate) usable: bool,
    /// Visits waiting for ownership, in arrival order.
    pub(crate) interested_parties: Fifo<MAX_VISITS_IN_FLIGHT>,
    /// Byte offsets of the blocks backing this chunk.
    pub(crate) blocks: [usize; MAX_BLOCKS_PER_CHUNK],
    /// Blocks allocated.
    pub(crate) num_blocks: u32,
    /// Blocks in active use; always `blocks_for_entries(size)`.
    pub(crate) next_block: u32,
    /// Total entry count.
    pub(crate) size: u32,
    /// Entry count at the last commit.
    pub(crate) delta: u32,
    next_in_chain: i32,
}

impl ChunkDescriptor {
    #[inline]
    pub fn visit_id(&self) -> i64 {
        self.visit_id
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Marks the current contents as the committed snapshot.
    pub(crate) fn commit(&mut self) {
        self.delta = self.size;
        self.usable = true;
    }

    /// Discards entries appended since the last commit. Blocks past
    /// `next_block` remain allocated for reuse.
    pub(crate) fn rollback(&mut self) {
        debug_assert!(self.delta <= self.size);
        self.size = self.delta;
        self.next_block = blocks_for_entries(self.size);
    }

    /// Resets the in-memory contents ahead of a fresh read from disk.
    pub(crate) fn reset_contents(&mut self) {
        self.size = 0;
        self.delta = 0;
        self.next_block = 0;
    }
}

impl Default for ChunkDescriptor {
    fn default() -> Self {
        Self {
            id: NIL_ID,
            visit_id: NIL_ID,
            usable: false,
            interested_parties: Fifo::new(),
            blocks: [0; MAX_BLOCKS_PER_CHUNK],
            num_blocks: 0,
            next_block: 0,
            size: 0,
            delta: 0,
            next_in_chain: -1,
        }
    }
}

impl SetEntry for ChunkDescriptor {
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn next_in_chain(&self) -> i32 {
        self.next_in_chain
    }
    fn set_next_in_chain(&mut self, next: i32) {
        self.next_in_chain = next;
    }
}

/// Point-in-time snapshot of a chunk descriptor, safe to hold outside the
/// manager lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub id: i64,
    pub visit_id: i64,
    pub usable: bool,
    pub size: u32,
    pub delta: u32,
    pub num_blocks: u32,
    pub next_block: u32,
    /// Whether any visit is queued for ownership.
    pub interesting: bool,
}

impl From<&ChunkDescriptor> for ChunkInfo {
    fn from(d: &ChunkDescriptor) -> Self {
        Self {
            id: d.id,
            visit_id: d.visit_id,
            usable: d.usable,
            size: d.size,
            delta: d.delta,
            num_blocks: d.num_blocks,
            next_block: d.next_block,
            interesting: !d.interested_parties.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkDescriptor, blocks_for_entries};
    use crate::constants::ENTRIES_PER_BLOCK;
    use crate::stdx::hashed_set::SetEntry;

    #[test]
    fn block_count_rounds_up() {
        let per_block = ENTRIES_PER_BLOCK as u32;
        assert_eq!(blocks_for_entries(0), 0);
        assert_eq!(blocks_for_entries(1), 1);
        assert_eq!(blocks_for_entries(per_block), 1);
        assert_eq!(blocks_for_entries(per_block + 1), 2);
    }

    #[test]
    fn commit_snapshots_size() {
        let mut d = ChunkDescriptor::default();
        d.set_id(7);
        d.size = 100;

        d.commit();
        assert_eq!(d.delta, 100);
        assert!(d.usable);
    }

    #[test]
    fn rollback_truncates_to_last_commit() {
        let per_block = ENTRIES_PER_BLOCK as u32;
        let mut d = ChunkDescriptor::default();
        d.size = per_block;
        d.next_block = 1;
        d.num_blocks = 1;
        d.commit();

        // Grow past the committed snapshot, then roll back.
        d.size = 3 * per_block + 5;
        d.next_block = 4;
        d.num_blocks = 4;
        d.rollback();

        assert_eq!(d.size, per_block);
        assert_eq!(d.next_block, 1);
        // Allocated blocks are retained for reuse.
        assert_eq!(d.num_blocks, 4);
        assert!(d.usable, "rollback does not invalidate a committed chunk");
    }

    #[test]
    fn rollback_of_uncommitted_chunk_empties_it() {
        let mut d = ChunkDescriptor::default();
        d.size = 42;
        d.next_block = 1;
        d.num_blocks = 1;

        d.rollback();
        assert_eq!(d.size, 0);
        assert_eq!(d.next_block, 0);
        assert!(!d.usable);
    }
}
