//! Fixed-capacity hashed set keyed by `i64` identifiers.
//!
//! Entries live in a fixed arena of `N` slots; bucket heads are a second
//! fixed array of `2 * N` slot indexes. Hash-chain and free-list links are
//! embedded in the entries themselves as `i32` slot indexes (`-1` = none),
//! so the table needs no heap allocation and no rehashing: capacity is
//! exhausted, never grown, and overflow is surfaced to the caller.
//!
//! Keys are mixed with Thomas Wang's 64→32-bit integer hash before masking
//! to a bucket, so dense id ranges still spread across the table.
//!
//! # Invariants
//!
//! - A live entry with id `k` appears in the `hash(k) & (BUCKETS - 1)`
//!   chain exactly once; free slots (id == [`NIL_ID`]) are reachable only
//!   through the free list.
//! - `len()` equals the number of live slots at all times.

/// Sentinel id meaning "no entry". Live entries never carry it.
pub const NIL_ID: i64 = -1;

/// Sentinel slot index terminating hash chains and the free list.
const NIL: i32 = -1;

/// Storage contract for entries embedded in a [`HashedSet`].
///
/// `Default` must produce a free entry: id [`NIL_ID`], link unset. The set
/// owns the id and link fields; implementors expose them verbatim.
pub trait SetEntry: Default {
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn next_in_chain(&self) -> i32;
    fn set_next_in_chain(&mut self, next: i32);
}

/// Outcome of [`HashedSet::find_or_insert`].
pub enum Slot<'a, E> {
    /// An entry with the requested id already existed.
    Found(&'a mut E),
    /// A fresh entry was allocated and initialized with the requested id.
    Inserted(&'a mut E),
    /// No entry existed and no free slot remained.
    Full,
}

/// Mixes a 64-bit key into 32 bits using Thomas Wang's integer hash.
#[inline]
pub fn hash_id(id: i64) -> u32 {
    let mut key = id as u64;
    key = (!key).wrapping_add(key << 18);
    key ^= key >> 31;
    key = key.wrapping_mul(21);
    key ^= key >> 11;
    key = key.wrapping_add(key << 6);
    key ^= key >> 22;
    key as u32
}

/// Open hash table of at most `N` embedded entries over `BUCKETS` chains.
///
/// `N` must be a power of two and `BUCKETS` must equal `2 * N` so the bucket
/// mask is valid.
pub struct HashedSet<E, const N: usize, const BUCKETS: usize> {
    buckets: [i32; BUCKETS],
    entries: [E; N],
    free_head: i32,
    len: u32,
}

impl<E: SetEntry, const N: usize, const BUCKETS: usize> HashedSet<E, N, BUCKETS> {
    const fn validate() {
        assert!(N > 0, "HashedSet capacity must be > 0");
        assert!(N.is_power_of_two(), "HashedSet capacity must be a power of two");
        assert!(BUCKETS == 2 * N, "BUCKETS must equal 2 * N");
        assert!(N <= i32::MAX as usize, "slot indexes are i32");
    }

    /// Creates an empty set with all `N` slots on the free list.
    pub fn new() -> Self {
        Self::validate();

        let mut entries: [E; N] = core::array::from_fn(|_| E::default());
        for (i, entry) in entries.iter_mut().enumerate() {
            debug_assert_eq!(entry.id(), NIL_ID);
            let next = if i + 1 < N { (i + 1) as i32 } else { NIL };
            entry.set_next_in_chain(next);
        }

        Self {
            buckets: [NIL; BUCKETS],
            entries,
            free_head: 0,
            len: 0,
        }
    }

    /// Returns the number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        debug_assert!(self.len as usize <= N);
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of free slots remaining.
    #[inline]
    pub fn space(&self) -> usize {
        N - self.len()
    }

    /// Returns the fixed slot capacity (`N`).
    #[inline(always)]
    pub const fn capacity() -> usize {
        N
    }

    #[inline]
    fn bucket_of(id: i64) -> usize {
        (hash_id(id) as usize) & (BUCKETS - 1)
    }

    /// Walks the bucket chain for `id`, returning the matching slot index and
    /// its predecessor in the chain (`NIL` when the match heads the chain).
    fn locate(&self, id: i64) -> Option<(i32, i32)> {
        let mut i = self.buckets[Self::bucket_of(id)];
        let mut last = NIL;
        while i >= 0 {
            let entry = &self.entries[i as usize];
            if entry.id() == id {
                return Some((i, last));
            }
            last = i;
            i = entry.next_in_chain();
        }
        None
    }

    /// Returns the entry with the given id, if present.
    pub fn find(&self, id: i64) -> Option<&E> {
        self.locate(id).map(|(i, _)| &self.entries[i as usize])
    }

    /// Returns the entry with the given id mutably, if present.
    pub fn find_mut(&mut self, id: i64) -> Option<&mut E> {
        self.locate(id).map(|(i, _)| &mut self.entries[i as usize])
    }

    /// Takes a slot off the free list and links it at the tail of `id`'s
    /// bucket chain. `tail` is the current last slot of that chain (`NIL`
    /// when the chain is empty). Callers have already verified `id` is absent.
    fn attach(&mut self, id: i64, tail: i32) -> &mut E {
        let slot = self.free_head;
        debug_assert!(slot >= 0);
        self.free_head = self.entries[slot as usize].next_in_chain();

        if tail < 0 {
            self.buckets[Self::bucket_of(id)] = slot;
        } else {
            self.entries[tail as usize].set_next_in_chain(slot);
        }

        let entry = &mut self.entries[slot as usize];
        *entry = E::default();
        entry.set_id(id);
        entry.set_next_in_chain(NIL);
        self.len += 1;
        &mut self.entries[slot as usize]
    }

    /// Inserts a freshly initialized entry with the given id.
    ///
    /// Returns `None` when an entry with `id` already exists or the set is
    /// full.
    pub fn insert(&mut self, id: i64) -> Option<&mut E> {
        assert!(id != NIL_ID, "cannot insert the sentinel id");
        if self.free_head < 0 {
            return None;
        }

        // One chain walk finds both a duplicate and the link point.
        let mut i = self.buckets[Self::bucket_of(id)];
        let mut last = NIL;
        while i >= 0 {
            let entry = &self.entries[i as usize];
            if entry.id() == id {
                return None;
            }
            last = i;
            i = entry.next_in_chain();
        }

        Some(self.attach(id, last))
    }

    /// Finds the entry with the given id, inserting a fresh one if absent.
    pub fn find_or_insert(&mut self, id: i64) -> Slot<'_, E> {
        assert!(id != NIL_ID, "cannot insert the sentinel id");

        let mut i = self.buckets[Self::bucket_of(id)];
        let mut last = NIL;
        while i >= 0 {
            let entry = &self.entries[i as usize];
            if entry.id() == id {
                return Slot::Found(&mut self.entries[i as usize]);
            }
            last = i;
            i = entry.next_in_chain();
        }

        if self.free_head < 0 {
            return Slot::Full;
        }
        Slot::Inserted(self.attach(id, last))
    }

    /// Erases the entry with the given id, returning whether one existed.
    ///
    /// The slot is unlinked from its bucket chain and pushed on the free
    /// list head.
    pub fn erase(&mut self, id: i64) -> bool {
        let Some((i, last)) = self.locate(id) else {
            return false;
        };

        let next = self.entries[i as usize].next_in_chain();
        if last < 0 {
            self.buckets[Self::bucket_of(id)] = next;
        } else {
            self.entries[last as usize].set_next_in_chain(next);
        }

        let entry = &mut self.entries[i as usize];
        entry.set_id(NIL_ID);
        entry.set_next_in_chain(self.free_head);
        self.free_head = i;
        self.len -= 1;
        true
    }

    /// Iterates over live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter().filter(|e| e.id() != NIL_ID)
    }

    /// Iterates over live ids in slot order.
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.iter().map(|e| e.id())
    }
}

impl<E: SetEntry, const N: usize, const BUCKETS: usize> Default for HashedSet<E, N, BUCKETS> {
    fn default() -> Self {
        Self::new()
    }
}
