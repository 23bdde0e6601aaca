//! Top-level chunk manager: the visit lifecycle state machine.
//!
//! One mutex guards the visit tracker and the chunk table together; a
//! condition variable paired with it wakes visits waiting for ownership.
//! The block allocator keeps its own lock and is only ever called with the
//! manager lock held (manager first, allocator second, never reversed), so
//! the pair cannot deadlock.
//!
//! # Lifecycle
//!
//! ```text
//! [none] --register_visit--> [registered]
//! [registered] --start_visit--> [awaiting]   (to_read + to_wait_for known)
//! [awaiting] --wait_for_ownership--> [owning]
//! any state --fail_visit--> failed flag set
//! any state --end_visit--> [none]; chunks handed off or freed
//! ```
//!
//! All operations on a single visit are serialized by the manager mutex and
//! are therefore linearizable. Among visits queued on the same chunk, the
//! earliest still-valid one becomes the next owner.

use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::constants::MAX_BLOCKS_PER_CHUNK;

use super::RegionAllocator;
use super::block_allocator::AllocError;
use super::descriptor::{ChunkInfo, blocks_for_entries};
use super::status::StatusReport;
use super::sub_manager::SubManager;
use super::visit_tracker::VisitTracker;

/// Errors surfaced by the public manager API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `register_visit` was called for an id already in flight.
    #[error("visit {visit_id} is already in flight")]
    AlreadyExists { visit_id: i64 },

    /// The visit tracker, chunk table or an interest queue is full.
    #[error("capacity exceeded while processing visit {visit_id}")]
    CapacityExceeded { visit_id: i64 },

    /// The named visit is absent, failed, or does not own the chunk it
    /// tried to touch.
    #[error("visit {visit_id} is not in a valid state for this operation")]
    InvalidState { visit_id: i64 },

    /// The block allocator or the descriptor table ran dry mid-operation.
    #[error("out of chunk storage")]
    OutOfMemory,

    /// A growth request exceeds the per-chunk block limit.
    #[error("request exceeds the per-chunk block limit")]
    OutOfRange,

    /// The deadline expired before every awaited chunk was acquired.
    #[error("deadline expired while visit {visit_id} waited for ownership")]
    Timeout { visit_id: i64 },
}

impl From<AllocError> for Error {
    fn from(e: AllocError) -> Self {
        match e {
            AllocError::OutOfMemory => Error::OutOfMemory,
            AllocError::OutOfRange => Error::OutOfRange,
        }
    }
}

/// Result of [`ChunkManager::start_visit`]: the chunk ids partitioned into
/// those that must be read from disk and those currently owned by another
/// visit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartVisit {
    /// Freshly created chunks; the visit owns them but must populate them.
    pub to_read: Vec<i64>,
    /// Chunks owned by another visit; pass to
    /// [`ChunkManager::wait_for_ownership`].
    pub to_wait_for: Vec<i64>,
}

/// Everything guarded by the manager mutex.
struct State {
    visits: VisitTracker,
    data: SubManager,
}

/// Arbitrates chunk ownership among concurrent visits.
///
/// See the module documentation for the lifecycle and locking rules. All
/// methods take `&self`; the manager is meant to be shared (for example in
/// an `Arc`) among the threads driving individual visits.
pub struct ChunkManager {
    state: Mutex<State>,
    owner_changed: Condvar,
    allocator: RegionAllocator,
}

impl ChunkManager {
    /// Creates an empty manager whose first storage block lives
    /// `region_offset` bytes into the backing region.
    pub fn new(region_offset: usize) -> Self {
        Self {
            state: Mutex::new(State {
                visits: VisitTracker::new(),
                data: SubManager::new(),
            }),
            owner_changed: Condvar::new(),
            allocator: RegionAllocator::new(region_offset),
        }
    }

    /// Registers a visit as in flight without any further action.
    pub fn register_visit(&self, visit_id: i64) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.visits.contains(visit_id) {
            return Err(Error::AlreadyExists { visit_id });
        }
        if state.visits.space() == 0 {
            return Err(Error::CapacityExceeded { visit_id });
        }
        let inserted = state.visits.insert(visit_id);
        debug_assert!(inserted.is_some());
        debug!(visit_id, "visit registered");
        Ok(())
    }

    /// Returns `true` iff the visit is in flight and not marked failed.
    pub fn is_visit_in_flight(&self, visit_id: i64) -> bool {
        self.state.lock().visits.is_valid(visit_id)
    }

    /// Marks the visit as failed.
    ///
    /// Idempotent and infallible: unknown ids are ignored. This is the safe
    /// escape hatch for workers that cannot complete. The failed visit's
    /// chunks are passed on (unusable) when `end_visit` runs.
    pub fn fail_visit(&self, visit_id: i64) {
        let mut state = self.state.lock();
        state.visits.fail(visit_id);
        debug!(visit_id, "visit failed");
    }

    /// Begins visit processing for the given duplicate-free chunk id list.
    ///
    /// Chunk ids not yet in memory get a fresh descriptor owned by
    /// `visit_id` and are returned in `to_read`; ids already resident are
    /// returned in `to_wait_for` with `visit_id` queued as an interested
    /// party.
    ///
    /// Capacity and visit validity are checked before any state changes, so
    /// a `CapacityExceeded` or `InvalidState` error leaves the manager
    /// untouched.
    pub fn start_visit(&self, visit_id: i64, chunk_ids: &[i64]) -> Result<StartVisit, Error> {
        let mut to_read = Vec::with_capacity(chunk_ids.len());
        let mut to_wait_for = Vec::with_capacity(chunk_ids.len());

        let mut state = self.state.lock();
        if state.data.space() < chunk_ids.len() {
            return Err(Error::CapacityExceeded { visit_id });
        }
        if !state.visits.is_valid(visit_id) {
            return Err(Error::InvalidState { visit_id });
        }
        state
            .data
            .create_or_register_interest(&mut to_read, &mut to_wait_for, visit_id, chunk_ids)?;

        debug!(
            visit_id,
            creating = to_read.len(),
            waiting = to_wait_for.len(),
            "visit started"
        );
        Ok(StartVisit {
            to_read,
            to_wait_for,
        })
    }

    /// Blocks until `visit_id` owns every chunk in `to_wait_for`, or the
    /// absolute `deadline` passes.
    ///
    /// Acquired chunks are removed from `to_wait_for`; the subset acquired
    /// in an unusable state (their previous owner failed mid-read) is
    /// appended to `to_read`, which is cleared on entry. On timeout,
    /// `to_wait_for` retains exactly the still-unacquired chunks, so the
    /// caller may retry with a later deadline or give up via `end_visit`.
    ///
    /// Spurious wakeups are harmless: the ownership check re-runs on every
    /// wake and the wait re-arms against the same deadline.
    pub fn wait_for_ownership(
        &self,
        visit_id: i64,
        to_read: &mut Vec<i64>,
        to_wait_for: &mut Vec<i64>,
        deadline: Instant,
    ) -> Result<(), Error> {
        to_read.clear();
        to_read.reserve(to_wait_for.len());

        let mut state = self.state.lock();
        loop {
            if state
                .data
                .check_for_ownership(to_read, to_wait_for, visit_id)
            {
                return Ok(());
            }
            if self
                .owner_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Err(Error::Timeout { visit_id });
            }
        }
    }

    /// Snapshots the live descriptors matching `chunk_ids`; unknown ids are
    /// skipped.
    pub fn get_chunks(&self, chunk_ids: &[i64]) -> Vec<ChunkInfo> {
        self.state.lock().data.get_chunks(chunk_ids)
    }

    /// Records `count` entries appended to a chunk by its owner, growing the
    /// chunk's block storage as needed.
    ///
    /// Blocks already allocated but not in active use (left over from a
    /// rollback) are reused before new ones are claimed. New blocks are
    /// claimed all-or-nothing, so an `OutOfMemory` error leaves the chunk
    /// unchanged.
    pub fn add_entries(&self, visit_id: i64, chunk_id: i64, count: u32) -> Result<(), Error> {
        if count == 0 {
            return Ok(());
        }

        let mut state = self.state.lock();
        let Some(descriptor) = state.data.descriptor_mut(chunk_id) else {
            return Err(Error::InvalidState { visit_id });
        };
        if descriptor.visit_id != visit_id {
            return Err(Error::InvalidState { visit_id });
        }

        let new_size = descriptor.size.checked_add(count).ok_or(Error::OutOfRange)?;
        let needed = blocks_for_entries(new_size);
        if needed as usize > MAX_BLOCKS_PER_CHUNK {
            return Err(Error::OutOfRange);
        }

        if needed > descriptor.num_blocks {
            let extra = (needed - descriptor.num_blocks) as usize;
            let mut offsets = [0usize; MAX_BLOCKS_PER_CHUNK];
            self.allocator.allocate_many(&mut offsets[..extra])?;
            for (k, &offset) in offsets[..extra].iter().enumerate() {
                descriptor.blocks[descriptor.num_blocks as usize + k] = offset;
            }
            descriptor.num_blocks = needed;
        }

        descriptor.size = new_size;
        descriptor.next_block = needed;
        trace!(visit_id, chunk_id, count, size = new_size, "entries added");
        Ok(())
    }

    /// Ends a visit: removes it from the tracker and passes each of its
    /// chunks to the next live interested visit, or deallocates chunks
    /// nobody wants.
    ///
    /// Changes are rolled back instead of committed when `rollback` is set
    /// *or* the visit was marked failed. Threads blocked in
    /// [`wait_for_ownership`] are woken iff any chunk changed hands.
    ///
    /// Returns `true` iff the visit existed, had not failed, and was
    /// committed.
    pub fn end_visit(&self, visit_id: i64, rollback: bool) -> bool {
        let mut state = self.state.lock();
        let roll = rollback || !state.visits.is_valid(visit_id);
        if !state.visits.erase(visit_id) {
            return false;
        }

        let State { visits, data } = &mut *state;
        if data.relinquish_ownership(visit_id, roll, visits, &self.allocator) {
            self.owner_changed.notify_all();
        }
        debug!(visit_id, rollback = roll, "visit ended");
        !roll
    }

    /// Snapshots the manager state for diagnostics: every tracked visit and
    /// every live chunk. See [`StatusReport`] for the rendering.
    pub fn status(&self) -> StatusReport {
        let state = self.state.lock();
        StatusReport::new(state.visits.snapshot(), state.data.snapshot())
    }

    /// Returns the number of free blocks left in the backing region.
    pub fn free_blocks(&self) -> usize {
        self.allocator.free_count()
    }
}
