//! Visit/chunk lifecycle coordination.
//!
//! The [`ChunkManager`] arbitrates ownership of sky-region chunks among
//! in-flight visits: a visit registers, names the chunks it needs, waits
//! until it owns the ones somebody else holds, does its work, and ends with
//! either a commit or a rollback. Chunks freed by one visit are handed to
//! the next interested visit in FIFO order instead of being purged.

pub mod block_allocator;
pub mod descriptor;
pub mod manager;
pub mod status;
pub mod sub_manager;
pub mod visit_tracker;

pub use block_allocator::{AllocError, BlockAllocator};
pub use descriptor::{ChunkDescriptor, ChunkInfo, Visit};
pub use manager::{ChunkManager, Error, StartVisit};
pub use status::StatusReport;
pub use sub_manager::SubManager;
pub use visit_tracker::VisitTracker;

use crate::constants::NUM_BLOCKS;
use crate::stdx::bitset::words_for_bits;

/// Allocator instantiated for the full backing region.
pub type RegionAllocator = BlockAllocator<NUM_BLOCKS, { words_for_bits(NUM_BLOCKS) }>;
