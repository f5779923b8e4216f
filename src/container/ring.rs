//! Circular FIFO buffer of lots with independent head and tail indices.

use super::{grown_capacity, LotContainer};
use crate::types::Lot;

/// FIFO ring: `insert` writes at the tail, `take_next` reads from the head.
#[derive(Debug, Clone, Default)]
pub struct RingBuffer {
    slots: Vec<Option<Lot>>,
    head: usize,
    tail: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-lay the live range at the front of a doubled slot array.
    fn grow(&mut self) {
        let old_cap = self.slots.len();
        let new_cap = grown_capacity(old_cap);
        let mut slots: Vec<Option<Lot>> = Vec::with_capacity(new_cap);
        for i in 0..self.len {
            slots.push(self.slots[(self.head + i) % old_cap].take());
        }
        slots.resize_with(new_cap, || None);
        self.slots = slots;
        self.head = 0;
        self.tail = self.len;
    }
}

impl LotContainer for RingBuffer {
    fn insert(&mut self, lot: Lot) {
        if self.len == self.slots.len() {
            self.grow();
        }
        self.slots[self.tail] = Some(lot);
        self.tail = (self.tail + 1) % self.slots.len();
        self.len += 1;
    }

    fn take_next(&mut self) -> Option<Lot> {
        if self.len == 0 {
            return None;
        }
        let lot = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        lot
    }

    fn next_mut(&mut self) -> Option<&mut Lot> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_mut()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Lot> + '_> {
        let cap = self.slots.len();
        Box::new((0..self.len).filter_map(move |i| self.slots[(self.head + i) % cap].as_ref()))
    }

    fn into_lots(mut self) -> Vec<Lot> {
        let mut lots = Vec::with_capacity(self.len);
        while let Some(lot) = self.take_next() {
            lots.push(lot);
        }
        lots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around_and_grows_in_order() {
        let mut ring = RingBuffer::new();
        for origin in 0..3 {
            ring.insert(Lot::born(origin, 0.0, 1.0, false));
        }
        assert_eq!(ring.capacity(), 3);
        // Move the head forward so the live range wraps.
        assert_eq!(ring.take_next().map(|l| l.origin), Some(0));
        assert_eq!(ring.take_next().map(|l| l.origin), Some(1));
        ring.insert(Lot::born(3, 0.0, 1.0, false));
        ring.insert(Lot::born(4, 0.0, 1.0, false));
        // Full and wrapped: the next insert doubles capacity.
        ring.insert(Lot::born(5, 0.0, 1.0, false));
        assert_eq!(ring.capacity(), 6);
        let order: Vec<u32> = ring.into_lots().iter().map(|l| l.origin).collect();
        assert_eq!(order, vec![2, 3, 4, 5]);
    }

    #[test]
    fn iter_follows_head_to_tail() {
        let mut ring = RingBuffer::new();
        for origin in 0..4 {
            ring.insert(Lot::born(origin, 0.0, origin as f64, false));
        }
        ring.take_next();
        let seen: Vec<u32> = ring.iter().map(|l| l.origin).collect();
        assert_eq!(seen, vec![1, 2, 3]);
        assert!((ring.total_quantity() - 6.0).abs() < 1e-12);
    }
}
