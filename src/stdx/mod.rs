//! Fixed-capacity building blocks shared by the chunk manager.
//!
//! Everything here is sized at compile time and allocation-free after
//! construction. The containers are deliberately narrow: they implement
//! exactly what the coordination core needs and panic on misuse that would
//! indicate memory corruption.

pub mod bitset;
pub mod fifo;
pub mod hashed_set;

pub use bitset::{BitSet, words_for_bits};
pub use fifo::{Fifo, FifoError};
pub use hashed_set::{HashedSet, SetEntry, Slot};
