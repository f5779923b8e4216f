//! Binary min-heap of lots keyed by birth time.
//!
//! Newest-first ordering reuses the same min-heap with the key negated on
//! insertion, so the root is always the most recently born lot. The lot
//! itself keeps its true birth time.

use serde::{Deserialize, Serialize};

use super::{grown_capacity, LotContainer};
use crate::types::Lot;

/// Direction of the birth-time key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOrder {
    /// Smallest birth time first (oldest-first).
    Ascending,
    /// Largest birth time first (newest-first), via a negated key.
    Descending,
}

impl KeyOrder {
    fn key_for(self, lot: &Lot) -> f64 {
        match self {
            Self::Ascending => lot.birth_time,
            Self::Descending => -lot.birth_time,
        }
    }
}

#[derive(Debug, Clone)]
struct HeapSlot {
    key: f64,
    lot: Lot,
}

/// Priority buffer: `take_next` removes the lot with the minimum key.
#[derive(Debug, Clone)]
pub struct PriorityBuffer {
    order: KeyOrder,
    slots: Vec<HeapSlot>,
}

/// Parent position in the implicit tree.
fn parent(pos: usize) -> usize {
    (pos - 1) / 2
}

impl PriorityBuffer {
    pub fn new(order: KeyOrder) -> Self {
        Self { order, slots: Vec::new() }
    }

    pub fn order(&self) -> KeyOrder {
        self.order
    }

    /// Every slot's key is >= its parent's key.
    pub fn satisfies_heap_order(&self) -> bool {
        (1..self.slots.len()).all(|pos| self.slots[pos].key >= self.slots[parent(pos)].key)
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let p = parent(pos);
            if self.slots[pos].key < self.slots[p].key {
                self.slots.swap(pos, p);
                pos = p;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.slots.len();
        loop {
            let left = pos * 2 + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smaller = if right < len && self.slots[right].key < self.slots[left].key {
                right
            } else {
                left
            };
            if self.slots[pos].key > self.slots[smaller].key {
                self.slots.swap(pos, smaller);
                pos = smaller;
            } else {
                break;
            }
        }
    }
}

impl LotContainer for PriorityBuffer {
    fn insert(&mut self, lot: Lot) {
        if self.slots.len() == self.slots.capacity() {
            let target = grown_capacity(self.slots.capacity());
            self.slots.reserve_exact(target - self.slots.len());
        }
        let key = self.order.key_for(&lot);
        self.slots.push(HeapSlot { key, lot });
        let last = self.slots.len() - 1;
        self.sift_up(last);
    }

    fn take_next(&mut self) -> Option<Lot> {
        if self.slots.is_empty() {
            return None;
        }
        let root = self.slots.swap_remove(0);
        if !self.slots.is_empty() {
            self.sift_down(0);
        }
        Some(root.lot)
    }

    fn next_mut(&mut self) -> Option<&mut Lot> {
        self.slots.first_mut().map(|slot| &mut slot.lot)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Lot> + '_> {
        Box::new(self.slots.iter().map(|slot| &slot.lot))
    }

    fn into_lots(mut self) -> Vec<Lot> {
        let mut lots = Vec::with_capacity(self.slots.len());
        while let Some(lot) = self.take_next() {
            lots.push(lot);
        }
        lots
    }
}
