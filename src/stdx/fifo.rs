//! Bounded FIFO of `i64` identifiers.
//!
//! Each chunk descriptor embeds one of these as its interest queue: visits
//! that want a chunk owned by someone else enqueue their id and are handed
//! the chunk in arrival order when the owner lets go. Capacity is a power of
//! two so ring indexing is a bit mask rather than a modulo.
//!
//! The queue lives inside copyable pool entries, so it is a plain value type
//! with no heap allocation.

/// Errors surfaced by [`Fifo::enqueue`] and [`Fifo::dequeue`].
///
/// Underflow is always a caller bug (dequeue is guarded by `is_empty` in the
/// coordination core). Overflow is reachable when more distinct visits queue
/// up on one chunk than the configured capacity; the manager surfaces it as a
/// capacity error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoError {
    /// Enqueue on a full queue.
    Overflow,
    /// Dequeue on an empty queue.
    Underflow,
}

/// A first-in, first-out queue of fixed capacity `N`.
///
/// # Examples
/// ```
/// use association::stdx::fifo::Fifo;
///
/// let mut q: Fifo<4> = Fifo::new();
/// q.enqueue(7).unwrap();
/// q.enqueue(11).unwrap();
/// assert_eq!(q.dequeue(), Ok(7));
/// assert_eq!(q.dequeue(), Ok(11));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Fifo<const N: usize> {
    buffer: [i64; N],
    size: u32,
    back: u32,
    front: u32,
}

impl<const N: usize> Fifo<N> {
    const fn validate() {
        assert!(N > 0, "Fifo capacity must be > 0");
        assert!(N.is_power_of_two(), "Fifo capacity must be a power of two");
        assert!(N <= u32::MAX as usize);
    }

    const MASK: u32 = (N - 1) as u32;

    /// Creates an empty queue.
    #[inline]
    pub const fn new() -> Self {
        Self::validate();
        Self {
            buffer: [0; N],
            size: 0,
            back: 0,
            front: 0,
        }
    }

    /// Empties the queue.
    #[inline]
    pub fn clear(&mut self) {
        self.size = 0;
        self.back = 0;
        self.front = 0;
    }

    /// Returns the number of queued values.
    #[inline]
    pub const fn len(&self) -> usize {
        debug_assert!(self.size as usize <= N);
        self.size as usize
    }

    /// Returns `true` when nothing is queued.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns `true` when the queue is at capacity.
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.size as usize == N
    }

    /// Appends `value` at the back of the queue.
    pub fn enqueue(&mut self, value: i64) -> Result<(), FifoError> {
        if self.is_full() {
            return Err(FifoError::Overflow);
        }
        self.buffer[self.back as usize] = value;
        self.back = (self.back + 1) & Self::MASK;
        self.size += 1;
        Ok(())
    }

    /// Removes and returns the least recently enqueued value.
    pub fn dequeue(&mut self) -> Result<i64, FifoError> {
        if self.is_empty() {
            return Err(FifoError::Underflow);
        }
        let value = self.buffer[self.front as usize];
        self.front = (self.front + 1) & Self::MASK;
        self.size -= 1;
        Ok(value)
    }
}

impl<const N: usize> Default for Fifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
