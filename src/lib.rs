//! In-memory coordination of sky-region chunks among concurrent visits.
//!
//! An association pipeline holds chunks of sky data in a fixed-size memory
//! region while many visits (observations of a field of view) read, mutate
//! and commit them in overlapping phases. This crate provides the
//! coordination core: a [`chunk::ChunkManager`] that arbitrates chunk
//! ownership among in-flight visits, a [`chunk::BlockAllocator`] that hands
//! out fixed-size blocks of the backing region, and the fixed-capacity
//! containers ([`stdx`]) they are built on.
//!
//! Everything is sized at compile time (see [`constants`]); the manager never
//! grows, never touches disk, and never persists. Disk I/O and spatial
//! decomposition are the caller's problem: the manager only labels chunks as
//! "must be read" or "in memory", keyed by opaque `i64` identifiers.

pub mod chunk;
pub mod constants;
pub mod stdx;
