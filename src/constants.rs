//! Capacity and layout constants for the chunk manager.
//!
//! All sizes are fixed at construction; the manager never grows. The
//! relationships between the constants are verified by `const` assertions
//! below, so an inconsistent configuration fails to compile rather than
//! corrupting state at run time.

// =============================================================================
// Visit and chunk capacities
// =============================================================================

/// Maximum number of visits that may be in flight at once.
///
/// Must be a power of two: it is both the capacity of each chunk's interest
/// FIFO (whose ring indexing uses a bit mask) and the entry count of the
/// visit tracker's hash table, whose bucket mask requires a power-of-two
/// table size.
pub const MAX_VISITS_IN_FLIGHT: usize = 16;

/// Maximum number of chunk descriptors resident in memory at once.
///
/// Must be a power of two for the chunk table's bucket mask.
pub const MAX_CHUNKS_IN_MEMORY: usize = 256;

// =============================================================================
// Block storage layout
// =============================================================================

/// Size in bytes of one storage block.
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Total number of blocks in the backing region.
///
/// The region spans `NUM_BLOCKS * BLOCK_SIZE` bytes; the allocator tracks one
/// bit per block.
pub const NUM_BLOCKS: usize = 1024;

/// Upper bound on blocks owned by a single chunk.
pub const MAX_BLOCKS_PER_CHUNK: usize = 16;

/// Size in bytes of one chunk entry.
pub const ENTRY_SIZE: usize = 128;

/// Entries that fit in one block. Chunks accrete blocks as entries are
/// appended; a chunk holding `size` entries has `size.div_ceil(ENTRIES_PER_BLOCK)`
/// blocks in active use.
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / ENTRY_SIZE;

// =============================================================================
// Compile-time design integrity assertions
// =============================================================================

const _: () = assert!(MAX_VISITS_IN_FLIGHT > 0);
const _: () = assert!(
    MAX_VISITS_IN_FLIGHT.is_power_of_two(),
    "visit capacity must be a power of two for FIFO and bucket masks"
);

const _: () = assert!(MAX_CHUNKS_IN_MEMORY > 0);
const _: () = assert!(
    MAX_CHUNKS_IN_MEMORY.is_power_of_two(),
    "chunk capacity must be a power of two for the bucket mask"
);

const _: () = assert!(BLOCK_SIZE > 0);
const _: () = assert!(NUM_BLOCKS > 0);
const _: () = assert!(MAX_BLOCKS_PER_CHUNK > 0);
const _: () = assert!(MAX_BLOCKS_PER_CHUNK <= NUM_BLOCKS);

const _: () = assert!(ENTRY_SIZE > 0);
const _: () = assert!(
    BLOCK_SIZE.is_multiple_of(ENTRY_SIZE),
    "entries must pack blocks exactly"
);
const _: () = assert!(ENTRIES_PER_BLOCK > 0);

// Entry counts are tracked in u32; a full chunk must not overflow one.
const _: () = assert!(MAX_BLOCKS_PER_CHUNK * ENTRIES_PER_BLOCK <= u32::MAX as usize);
