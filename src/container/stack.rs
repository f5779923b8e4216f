//! LIFO stack of lots. Popped slots are not reclaimed; capacity only grows.

use super::{grown_capacity, LotContainer};
use crate::types::Lot;

#[derive(Debug, Clone, Default)]
pub struct LotStack {
    lots: Vec<Lot>,
}

impl LotStack {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LotContainer for LotStack {
    fn insert(&mut self, lot: Lot) {
        if self.lots.len() == self.lots.capacity() {
            let target = grown_capacity(self.lots.capacity());
            self.lots.reserve_exact(target - self.lots.len());
        }
        self.lots.push(lot);
    }

    fn take_next(&mut self) -> Option<Lot> {
        self.lots.pop()
    }

    fn next_mut(&mut self) -> Option<&mut Lot> {
        self.lots.last_mut()
    }

    fn len(&self) -> usize {
        self.lots.len()
    }

    fn capacity(&self) -> usize {
        self.lots.capacity()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Lot> + '_> {
        Box::new(self.lots.iter())
    }

    fn into_lots(mut self) -> Vec<Lot> {
        self.lots.reverse();
        self.lots
    }
}
