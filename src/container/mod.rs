//! Ordered lot containers backing the exact-lot engine.
//!
//! Each node of the exact engine owns one container. The container's
//! ordering alone decides which lot a relay consumes next:
//!
//! ```text
//! PriorityBuffer (ascending birth)   -> oldest-first
//! PriorityBuffer (descending birth)  -> newest-first
//! LotStack                           -> LIFO
//! RingBuffer                         -> FIFO
//! ```
//!
//! Capacity starts at [`INITIAL_CAPACITY`] on first insert and doubles on
//! overflow. It is never shrunk.

pub mod heap;
pub mod ring;
pub mod stack;

pub use heap::{KeyOrder, PriorityBuffer};
pub use ring::RingBuffer;
pub use stack::LotStack;

use crate::types::Lot;

/// Slots allocated on a container's first insert.
pub const INITIAL_CAPACITY: usize = 3;

/// Capacity after one doubling step from `current`.
pub(crate) fn grown_capacity(current: usize) -> usize {
    if current == 0 {
        INITIAL_CAPACITY
    } else {
        current * 2
    }
}

/// Insert/extract interface shared by all lot orderings.
pub trait LotContainer {
    fn insert(&mut self, lot: Lot);

    /// Remove and return the lot the ordering selects next.
    fn take_next(&mut self) -> Option<Lot>;

    /// The lot `take_next` would return, for in-place partial consumption.
    /// Callers may only reduce its quantity; ordering keys must not change.
    fn next_mut(&mut self) -> Option<&mut Lot>;

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    /// Held lots in storage order (not extraction order).
    fn iter(&self) -> Box<dyn Iterator<Item = &Lot> + '_>;

    /// Consume the container, yielding lots in extraction order.
    fn into_lots(self) -> Vec<Lot>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn total_quantity(&self) -> f64 {
        self.iter().map(|lot| lot.quantity).sum()
    }
}
