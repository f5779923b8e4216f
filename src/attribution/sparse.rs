//! Sparse attribution vectors: origin-sorted `(origin, quantity)` entries.
//!
//! Every vector keeps its origins strictly ascending. All updates go
//! through [`merge_into`], a single linear merge-join of two sorted runs,
//! so the order never has to be restored by sorting (except after
//! [`SparseVector::shrink`], which re-sorts its survivors).

use serde::{Deserialize, Serialize};

use crate::types::{AttributionEntry, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<AttributionEntry>,
}

impl SparseVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(origin: NodeId, quantity: f64) -> Self {
        Self { entries: vec![AttributionEntry::new(origin, quantity)] }
    }

    /// Build from entries in any order; colliding origins are summed.
    pub fn from_entries(entries: impl IntoIterator<Item = AttributionEntry>) -> Self {
        let mut vector = Self::new();
        for entry in entries {
            vector.add(entry.origin, entry.quantity);
        }
        vector
    }

    pub fn entries(&self) -> &[AttributionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    pub fn get(&self, origin: NodeId) -> Option<f64> {
        self.entries
            .binary_search_by_key(&origin, |e| e.origin)
            .ok()
            .map(|i| self.entries[i].quantity)
    }

    /// Origins strictly ascending, no duplicates.
    pub fn is_strictly_ascending(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].origin < w[1].origin)
    }

    /// Add `quantity` to `origin`, inserting it in order if absent.
    pub fn add(&mut self, origin: NodeId, quantity: f64) {
        match self.entries.binary_search_by_key(&origin, |e| e.origin) {
            Ok(i) => self.entries[i].quantity += quantity,
            Err(i) => self.entries.insert(i, AttributionEntry::new(origin, quantity)),
        }
    }

    /// Full transfer: every entry of `source` moves into `self`.
    pub fn absorb(&mut self, source: SparseVector) {
        if self.entries.is_empty() {
            *self = source;
            return;
        }
        let mut source = source;
        self.entries = merge_into(&mut source.entries, &self.entries, |e| e.quantity);
    }

    /// Proportional transfer of `quantity` out of `self` (whose scalar total
    /// is `source_total`) into `dest`. Each source entry gives up
    /// `quantity * entry / source_total`.
    pub fn transfer_share(&mut self, dest: &mut SparseVector, quantity: f64, source_total: f64) {
        dest.entries = merge_into(&mut self.entries, &dest.entries, |e| {
            let moved = quantity * e.quantity / source_total;
            e.quantity -= moved;
            moved
        });
    }

    /// Keep the `reduced_size` largest entries and fold the rest into
    /// `residual`. Returns the quantity folded.
    ///
    /// If `residual` survives among the kept entries the folded quantity is
    /// added to it; otherwise a new entry is appended. The survivors are
    /// re-sorted by origin.
    pub fn shrink(&mut self, reduced_size: usize, residual: NodeId) -> f64 {
        if self.entries.len() <= reduced_size {
            return 0.0;
        }
        self.entries.sort_by(|a, b| b.quantity.total_cmp(&a.quantity));
        let folded: f64 = self.entries[reduced_size..].iter().map(|e| e.quantity).sum();
        self.entries.truncate(reduced_size);
        match self.entries.iter_mut().find(|e| e.origin == residual) {
            Some(entry) => entry.quantity += folded,
            None => self.entries.push(AttributionEntry::new(residual, folded)),
        }
        self.entries.sort_by_key(|e| e.origin);
        folded
    }

    pub fn into_entries(self) -> Vec<AttributionEntry> {
        self.entries
    }
}

/// Merge-join `source` into `dest`, producing a new origin-sorted run.
///
/// `take` is called once per source entry and returns the quantity that
/// moves to the destination (it may also reduce the source entry in place).
/// Colliding origins are summed; destination-only entries pass through.
pub fn merge_into<F>(
    source: &mut [AttributionEntry],
    dest: &[AttributionEntry],
    mut take: F,
) -> Vec<AttributionEntry>
where
    F: FnMut(&mut AttributionEntry) -> f64,
{
    let mut merged = Vec::with_capacity(source.len() + dest.len());
    let (mut a, mut b) = (0, 0);

    while a < source.len() && b < dest.len() {
        let s_origin = source[a].origin;
        let d_origin = dest[b].origin;
        if s_origin < d_origin {
            let moved = take(&mut source[a]);
            merged.push(AttributionEntry::new(s_origin, moved));
            a += 1;
        } else if s_origin > d_origin {
            merged.push(dest[b]);
            b += 1;
        } else {
            let moved = take(&mut source[a]);
            merged.push(AttributionEntry::new(d_origin, moved + dest[b].quantity));
            a += 1;
            b += 1;
        }
    }
    for entry in &mut source[a..] {
        let moved = take(&mut *entry);
        merged.push(AttributionEntry::new(entry.origin, moved));
    }
    merged.extend_from_slice(&dest[b..]);

    merged
}
