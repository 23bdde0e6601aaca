//! Visit-centric operations over the chunk descriptor table.
//!
//! Every method here is invoked with the manager's mutex held; the table
//! does no locking of its own. Chunks and visits reference each other by id
//! only, never by pointer, so the tracker and the table stay acyclic and
//! lookups happen under the same lock that serializes mutation.

use tracing::trace;

use crate::constants::MAX_CHUNKS_IN_MEMORY;
use crate::stdx::hashed_set::{HashedSet, SetEntry, Slot};

use super::RegionAllocator;
use super::descriptor::{ChunkDescriptor, ChunkInfo};
use super::manager::Error;
use super::visit_tracker::VisitTracker;

/// Fixed table of chunk descriptors plus the operations `ChunkManager`
/// drives against it.
pub struct SubManager {
    chunks: HashedSet<ChunkDescriptor, MAX_CHUNKS_IN_MEMORY, { 2 * MAX_CHUNKS_IN_MEMORY }>,
}

impl SubManager {
    pub fn new() -> Self {
        Self {
            chunks: HashedSet::new(),
        }
    }

    /// Returns the number of free descriptor slots.
    pub fn space(&self) -> usize {
        self.chunks.space()
    }

    /// Returns the number of live descriptors.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(crate) fn descriptor(&self, chunk_id: i64) -> Option<&ChunkDescriptor> {
        self.chunks.find(chunk_id)
    }

    pub(crate) fn descriptor_mut(&mut self, chunk_id: i64) -> Option<&mut ChunkDescriptor> {
        self.chunks.find_mut(chunk_id)
    }

    /// Snapshots every live descriptor, in slot order.
    pub(crate) fn snapshot(&self) -> Vec<ChunkInfo> {
        self.chunks.iter().map(ChunkInfo::from).collect()
    }

    /// Registers `visit_id` as an interested party of each chunk in
    /// `chunk_ids`, creating descriptors for ids not yet in memory.
    ///
    /// Newly created chunks are owned by `visit_id` immediately, are not yet
    /// usable, and land in `to_read` (their data must be read from disk).
    /// Preexisting chunks land in `to_wait_for` and `visit_id` joins their
    /// interest queue. `chunk_ids` is assumed duplicate-free.
    ///
    /// The caller has already checked `space()`, so descriptor exhaustion
    /// mid-loop surfaces as [`Error::OutOfMemory`]; an interest queue at
    /// capacity surfaces as [`Error::CapacityExceeded`].
    pub fn create_or_register_interest(
        &mut self,
        to_read: &mut Vec<i64>,
        to_wait_for: &mut Vec<i64>,
        visit_id: i64,
        chunk_ids: &[i64],
    ) -> Result<(), Error> {
        for &chunk_id in chunk_ids {
            match self.chunks.find_or_insert(chunk_id) {
                Slot::Inserted(d) => {
                    d.visit_id = visit_id;
                    d.usable = false;
                    to_read.push(chunk_id);
                }
                Slot::Found(d) => {
                    d.interested_parties
                        .enqueue(visit_id)
                        .map_err(|_| Error::CapacityExceeded { visit_id })?;
                    to_wait_for.push(chunk_id);
                }
                Slot::Full => return Err(Error::OutOfMemory),
            }
        }
        Ok(())
    }

    /// Removes from `to_wait_for` every chunk now owned by `visit_id`.
    ///
    /// Chunks acquired in an unusable state (their previous owner failed
    /// before finishing the read) have their contents reset and are appended
    /// to `to_read`. Removal swaps with the last element, so the remaining
    /// order is not preserved. Returns `true` iff `to_wait_for` is empty.
    pub fn check_for_ownership(
        &mut self,
        to_read: &mut Vec<i64>,
        to_wait_for: &mut Vec<i64>,
        visit_id: i64,
    ) -> bool {
        let mut i = 0;
        while i < to_wait_for.len() {
            let chunk_id = to_wait_for[i];
            match self.chunks.find_mut(chunk_id) {
                Some(d) if d.visit_id == visit_id => {
                    if !d.usable {
                        d.reset_contents();
                        to_read.push(chunk_id);
                    }
                    to_wait_for.swap_remove(i);
                }
                // Not ours yet, or the descriptor was dropped after every
                // interested party became invalid; keep waiting either way.
                _ => i += 1,
            }
        }
        to_wait_for.is_empty()
    }

    /// Snapshots the descriptors matching `chunk_ids`; unknown ids are
    /// skipped. Lookup only, no creation.
    pub fn get_chunks(&self, chunk_ids: &[i64]) -> Vec<ChunkInfo> {
        chunk_ids
            .iter()
            .filter_map(|&chunk_id| self.chunks.find(chunk_id).map(ChunkInfo::from))
            .collect()
    }

    /// Relinquishes every chunk owned by `visit_id`.
    ///
    /// Each chunk is handed to the first queued visit that is still valid in
    /// `tracker` (applying a rollback or commit first) or, when no live
    /// interested party remains, its blocks are freed and the descriptor is
    /// erased. Returns `true` iff any chunk changed hands.
    pub fn relinquish_ownership(
        &mut self,
        visit_id: i64,
        rollback: bool,
        tracker: &VisitTracker,
        allocator: &RegionAllocator,
    ) -> bool {
        let owned: Vec<i64> = self
            .chunks
            .iter()
            .filter(|d| d.visit_id == visit_id)
            .map(|d| d.id())
            .collect();

        let mut change = false;
        for chunk_id in owned {
            let Some(d) = self.chunks.find_mut(chunk_id) else {
                continue;
            };
            debug_assert_eq!(d.visit_id, visit_id);

            let mut successor = None;
            while let Ok(next_id) = d.interested_parties.dequeue() {
                if tracker.is_valid(next_id) {
                    successor = Some(next_id);
                    break;
                }
                // Failed or already-ended visits are skipped transparently.
            }

            match successor {
                Some(next_id) => {
                    d.visit_id = next_id;
                    if rollback {
                        d.rollback();
                    } else {
                        d.commit();
                    }
                    change = true;
                    trace!(chunk_id, from = visit_id, to = next_id, "chunk handed off");
                }
                None => {
                    let num_blocks = d.num_blocks as usize;
                    let blocks = d.blocks;
                    self.chunks.erase(chunk_id);
                    allocator.free_many(&blocks[..num_blocks]);
                    trace!(chunk_id, owner = visit_id, "chunk deallocated");
                }
            }
        }
        change
    }
}

impl Default for SubManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SubManager;
    use crate::chunk::RegionAllocator;
    use crate::chunk::visit_tracker::VisitTracker;
    use crate::constants::{MAX_CHUNKS_IN_MEMORY, NUM_BLOCKS};

    fn fixture() -> (SubManager, VisitTracker, RegionAllocator) {
        (SubManager::new(), VisitTracker::new(), RegionAllocator::new(0))
    }

    #[test]
    fn new_chunks_go_to_read_existing_to_wait() {
        let (mut data, _, _) = fixture();
        let mut to_read = Vec::new();
        let mut to_wait_for = Vec::new();

        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 1, &[100, 101])
            .unwrap();
        assert_eq!(to_read, vec![100, 101]);
        assert!(to_wait_for.is_empty());

        to_read.clear();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 2, &[101, 102])
            .unwrap();
        assert_eq!(to_read, vec![102]);
        assert_eq!(to_wait_for, vec![101]);
        assert_eq!(data.descriptor(101).unwrap().visit_id(), 1);
    }

    #[test]
    fn ownership_check_claims_transferred_chunks() {
        let (mut data, mut tracker, allocator) = fixture();
        tracker.insert(1).unwrap();
        tracker.insert(2).unwrap();

        let mut to_read = Vec::new();
        let mut to_wait_for = Vec::new();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 1, &[100])
            .unwrap();
        to_read.clear();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 2, &[100])
            .unwrap();
        assert_eq!(to_wait_for, vec![100]);

        // Still owned by visit 1.
        to_read.clear();
        assert!(!data.check_for_ownership(&mut to_read, &mut to_wait_for, 2));

        // Commit hand-off: the chunk arrives usable, nothing to re-read.
        data.descriptor_mut(100).unwrap().commit();
        tracker.erase(1);
        assert!(data.relinquish_ownership(1, false, &tracker, &allocator));
        assert!(data.check_for_ownership(&mut to_read, &mut to_wait_for, 2));
        assert!(to_read.is_empty());
        assert!(to_wait_for.is_empty());
        assert_eq!(data.descriptor(100).unwrap().visit_id(), 2);
        assert!(data.descriptor(100).unwrap().is_usable());
    }

    #[test]
    fn unusable_chunks_are_queued_for_reread() {
        let (mut data, mut tracker, allocator) = fixture();
        tracker.insert(1).unwrap();
        tracker.insert(2).unwrap();

        let mut to_read = Vec::new();
        let mut to_wait_for = Vec::new();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 1, &[200])
            .unwrap();
        to_read.clear();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 2, &[200])
            .unwrap();

        // Owner fails mid-read; the chunk is rolled back, never committed.
        tracker.fail(1);
        tracker.erase(1);
        assert!(data.relinquish_ownership(1, true, &tracker, &allocator));

        assert!(data.check_for_ownership(&mut to_read, &mut to_wait_for, 2));
        assert_eq!(to_read, vec![200]);
        assert!(!data.descriptor(200).unwrap().is_usable());
        assert_eq!(data.descriptor(200).unwrap().visit_id(), 2);
    }

    #[test]
    fn relinquish_skips_dead_interested_parties() {
        let (mut data, mut tracker, allocator) = fixture();
        for id in 1..=4 {
            tracker.insert(id).unwrap();
        }

        let mut to_read = Vec::new();
        let mut to_wait_for = Vec::new();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 1, &[300])
            .unwrap();
        for id in 2..=4 {
            data.create_or_register_interest(&mut to_read, &mut to_wait_for, id, &[300])
                .unwrap();
        }

        // Visit 2 failed, visit 3 ended: visit 4 is next in line.
        tracker.fail(2);
        tracker.erase(3);
        tracker.erase(1);
        assert!(data.relinquish_ownership(1, false, &tracker, &allocator));
        assert_eq!(data.descriptor(300).unwrap().visit_id(), 4);
    }

    #[test]
    fn relinquish_without_successor_deallocates() {
        let (mut data, mut tracker, allocator) = fixture();
        tracker.insert(1).unwrap();

        let mut to_read = Vec::new();
        let mut to_wait_for = Vec::new();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 1, &[400])
            .unwrap();

        tracker.erase(1);
        assert!(!data.relinquish_ownership(1, false, &tracker, &allocator));
        assert!(data.descriptor(400).is_none());
        assert!(data.is_empty());
        assert_eq!(allocator.free_count(), NUM_BLOCKS);
    }

    #[test]
    fn table_capacity_is_enforced() {
        let (mut data, _, _) = fixture();
        let ids: Vec<i64> = (0..MAX_CHUNKS_IN_MEMORY as i64).collect();
        let mut to_read = Vec::new();
        let mut to_wait_for = Vec::new();
        data.create_or_register_interest(&mut to_read, &mut to_wait_for, 1, &ids)
            .unwrap();
        assert_eq!(data.space(), 0);

        let err = data
            .create_or_register_interest(&mut to_read, &mut to_wait_for, 1, &[-2])
            .unwrap_err();
        assert_eq!(err, crate::chunk::Error::OutOfMemory);
    }
}
