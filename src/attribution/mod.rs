// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine - Proportional Attribution

//! Proportional provenance: every node carries a vector of quantities
//! keyed by origin (or by a slot standing for several origins).
//!
//! Per interaction `(src, dest, ts, qty)`:
//!
//! * `qty >= buffered[src]`: the whole source vector moves to `dest` and
//!   the uncovered remainder is attributed to `src` itself;
//! * otherwise every source entry gives up `qty / buffered[src]` of itself.
//!
//! [`SparseEngine`] keeps origin-sorted sparse vectors and merges them with
//! a linear merge-join. [`DenseEngine`] keeps fixed-length arrays over a
//! slot map and covers the dense, selected-origin and grouped variants.

pub mod dense;
pub mod engine;
pub mod sparse;

pub use dense::{DenseEngine, DenseNode, DenseOutcome, DenseStats, DenseVector, SlotLabel};
pub use engine::{SparseEngine, SparseNode, SparseStats, Unbounded, VectorBound};
pub use sparse::{merge_into, SparseVector};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::types::{Interaction, NodeId};

/// Common surface of the attribution engines and their controllers.
pub trait AttributionTracker {
    fn apply(&mut self, ix: &Interaction);

    fn numnodes(&self) -> usize;

    /// Scalar quantity currently held at `node`.
    fn buffered(&self, node: NodeId) -> f64;

    /// Sum of `node`'s attribution entries. Matches [`buffered`] up to
    /// floating error.
    ///
    /// [`buffered`]: AttributionTracker::buffered
    fn attributed(&self, node: NodeId) -> f64;

    fn total_buffered(&self) -> f64 {
        (0..self.numnodes() as NodeId).map(|n| self.buffered(n)).sum()
    }
}

/// Apply every interaction in log order.
pub fn replay<T: AttributionTracker + ?Sized>(tracker: &mut T, interactions: &[Interaction]) {
    for ix in interactions {
        tracker.apply(ix);
    }
}

/// Two distinct mutable elements of one slice.
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Final per-node sparse state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseOutcome {
    pub nodes: Vec<SparseNode>,
    pub stats: SparseStats,
}

impl SparseOutcome {
    pub fn buffered(&self, node: NodeId) -> f64 {
        self.nodes[node as usize].buffered
    }

    pub fn total_buffered(&self) -> f64 {
        self.nodes.iter().map(|n| n.buffered).sum()
    }
}

/// Full-origin tracking over sparse vectors.
pub fn run_sparse(interactions: &[Interaction], numnodes: usize) -> SparseOutcome {
    info!(numnodes, interactions = interactions.len(), "sparse attribution replay starts");
    let mut engine = SparseEngine::new(numnodes);
    replay(&mut engine, interactions);
    let (nodes, stats, _) = engine.into_parts();
    info!(
        entries = stats.entries_held,
        born = stats.total_born,
        "sparse attribution replay finished"
    );
    SparseOutcome { nodes, stats }
}

/// Full-origin tracking over dense per-node arrays.
pub fn run_dense(interactions: &[Interaction], numnodes: usize) -> DenseOutcome {
    run_dense_engine("dense", DenseEngine::full(numnodes), interactions)
}

/// Track only `selected` origins; all others share one slot.
pub fn run_selected(
    interactions: &[Interaction],
    numnodes: usize,
    selected: &[NodeId],
) -> Result<DenseOutcome> {
    let engine = DenseEngine::selected(numnodes, selected)?;
    Ok(run_dense_engine("selected", engine, interactions))
}

/// Track groups of origins through `groups[node]`.
pub fn run_grouped(
    interactions: &[Interaction],
    numnodes: usize,
    groups: &[usize],
    numgroups: usize,
) -> Result<DenseOutcome> {
    let engine = DenseEngine::grouped(numnodes, groups, numgroups)?;
    Ok(run_dense_engine("grouped", engine, interactions))
}

fn run_dense_engine(
    variant: &'static str,
    mut engine: DenseEngine,
    interactions: &[Interaction],
) -> DenseOutcome {
    info!(
        variant,
        numnodes = engine.numnodes(),
        slots = engine.numslots(),
        interactions = interactions.len(),
        "dense attribution replay starts"
    );
    replay(&mut engine, interactions);
    let outcome = engine.into_outcome();
    info!(
        variant,
        allocated = outcome.stats.allocated_nodes,
        born = outcome.stats.total_born,
        "dense attribution replay finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_mut_either_order() {
        let mut items = vec![1, 2, 3, 4];
        let (a, b) = pair_mut(&mut items, 0, 3);
        std::mem::swap(a, b);
        let (c, d) = pair_mut(&mut items, 2, 1);
        *c += 10;
        *d += 20;
        assert_eq!(items, vec![4, 22, 13, 1]);
    }

    #[test]
    fn dense_and_sparse_agree_per_origin() {
        let log = vec![
            Interaction::new(0, 1, 1.0, 4.0),
            Interaction::new(2, 1, 2.0, 2.0),
            Interaction::new(1, 3, 3.0, 3.0),
            Interaction::new(3, 0, 4.0, 1.0),
        ];
        let sparse = run_sparse(&log, 4);
        let dense = run_dense(&log, 4);
        for node in 0..4u32 {
            for origin in 0..4u32 {
                let s = sparse.nodes[node as usize].vector.get(origin).unwrap_or(0.0);
                let d = dense.slot_quantity(node, origin as usize);
                assert!((s - d).abs() < 1e-9, "node {node} origin {origin}: {s} vs {d}");
            }
        }
    }

    #[test]
    fn selected_rejects_bad_origin() {
        assert!(run_selected(&[], 3, &[0, 5]).is_err());
        assert!(run_selected(&[], 3, &[1, 1]).is_err());
    }
}
