// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine - Type Definitions

use serde::{Deserialize, Serialize};

/// Node identifier; valid ids are `0..numnodes`.
pub type NodeId = u32;

/// Origin key that absorbs quantity whose attribution was given up
/// (window collapse, budget compaction). Sorts after every real node id.
pub const RESIDUAL_ORIGIN: NodeId = NodeId::MAX;

/// Shortfalls at or below this are floating residue, not new provenance.
pub const BIRTH_EPSILON: f64 = 1e-7;

// ─── Interaction ─────────────────────────────────────────────────────────────

/// One quantity transfer from the time-ordered log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub source: NodeId,
    pub dest: NodeId,
    pub timestamp: f64,
    pub quantity: f64,
}

impl Interaction {
    pub fn new(source: NodeId, dest: NodeId, timestamp: f64, quantity: f64) -> Self {
        Self { source, dest, timestamp, quantity }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.dest
    }
}

/// Sum of all interaction quantities.
pub fn total_quantity(interactions: &[Interaction]) -> f64 {
    interactions.iter().map(|ix| ix.quantity).sum()
}

// ─── Lot (exact engine) ─────────────────────────────────────────────────────

/// Quantity still attributable to a single origin, born at `birth_time`.
///
/// `path` lists the relaying nodes the lot passed through after its origin,
/// in order. It is `None` unless path recording is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub origin: NodeId,
    pub birth_time: f64,
    pub quantity: f64,
    pub path: Option<Vec<NodeId>>,
}

impl Lot {
    /// A freshly born lot. Born lots have an empty path when tracking.
    pub fn born(origin: NodeId, birth_time: f64, quantity: f64, track_path: bool) -> Self {
        Self {
            origin,
            birth_time,
            quantity,
            path: if track_path { Some(Vec::new()) } else { None },
        }
    }

    /// Carve `quantity` off this lot as a new lot with the same identity,
    /// relayed through `via`. The receiver keeps the remainder.
    pub fn split_off(&mut self, quantity: f64, via: NodeId) -> Lot {
        self.quantity -= quantity;
        let path = self.path.as_ref().map(|p| {
            let mut extended = Vec::with_capacity(p.len() + 1);
            extended.extend_from_slice(p);
            extended.push(via);
            extended
        });
        Lot {
            origin: self.origin,
            birth_time: self.birth_time,
            quantity,
            path,
        }
    }

    /// Record that this lot was relayed (whole) through `via`.
    pub fn relayed_through(mut self, via: NodeId) -> Lot {
        if let Some(path) = self.path.as_mut() {
            path.push(via);
        }
        self
    }

    pub fn path_len(&self) -> usize {
        self.path.as_ref().map_or(0, Vec::len)
    }
}

// ─── Attribution entry (approximate engine) ─────────────────────────────────

/// `(origin, quantity)` pair of a sparse attribution vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributionEntry {
    pub origin: NodeId,
    pub quantity: f64,
}

impl AttributionEntry {
    pub fn new(origin: NodeId, quantity: f64) -> Self {
        Self { origin, quantity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_off_keeps_identity_and_extends_path() {
        let mut lot = Lot::born(3, 1.5, 10.0, true);
        let part = lot.split_off(4.0, 7);
        assert_eq!(part.origin, 3);
        assert_eq!(part.birth_time, 1.5);
        assert!((part.quantity - 4.0).abs() < 1e-12);
        assert!((lot.quantity - 6.0).abs() < 1e-12);
        assert_eq!(part.path, Some(vec![7]));
        assert_eq!(lot.path, Some(vec![]));
    }

    #[test]
    fn untracked_lots_carry_no_path() {
        let lot = Lot::born(0, 0.0, 1.0, false).relayed_through(2);
        assert!(lot.path.is_none());
        assert_eq!(lot.path_len(), 0);
    }

    #[test]
    fn residual_origin_sorts_last() {
        assert!(RESIDUAL_ORIGIN > 1_000_000);
    }

    #[test]
    fn total_quantity_sums_log() {
        let log = [Interaction::new(0, 1, 1.0, 2.5), Interaction::new(1, 2, 2.0, 0.5)];
        assert!((total_quantity(&log) - 3.0).abs() < 1e-12);
    }
}
