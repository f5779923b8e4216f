//! Full-origin proportional tracking over sparse vectors.

use serde::{Deserialize, Serialize};

use super::sparse::SparseVector;
use super::{pair_mut, AttributionTracker};
use crate::types::{Interaction, NodeId, BIRTH_EPSILON, RESIDUAL_ORIGIN};

/// Per-node state: the attribution vector and its scalar total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseNode {
    pub vector: SparseVector,
    /// `sumbuffered`: total quantity held, kept alongside the vector so
    /// transfer ratios are O(1).
    pub buffered: f64,
}

/// Hook run on a destination vector after every update.
pub trait VectorBound {
    fn enforce(&mut self, node: NodeId, step: u64, vector: &mut SparseVector);
}

/// No limit on vector size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl VectorBound for Unbounded {
    fn enforce(&mut self, _node: NodeId, _step: u64, _vector: &mut SparseVector) {}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseStats {
    pub interactions: u64,
    pub full_transfers: u64,
    pub proportional_transfers: u64,
    pub births: u64,
    pub total_born: f64,
    pub entries_held: usize,
    pub capacity_held: usize,
}

pub struct SparseEngine<B: VectorBound = Unbounded> {
    nodes: Vec<SparseNode>,
    bound: B,
    stats: SparseStats,
}

impl SparseEngine<Unbounded> {
    pub fn new(numnodes: usize) -> Self {
        Self::with_bound(numnodes, Unbounded)
    }
}

impl<B: VectorBound> SparseEngine<B> {
    pub fn with_bound(numnodes: usize, bound: B) -> Self {
        Self {
            nodes: vec![SparseNode::default(); numnodes],
            bound,
            stats: SparseStats::default(),
        }
    }

    pub fn node(&self, node: NodeId) -> &SparseNode {
        &self.nodes[node as usize]
    }

    pub fn nodes(&self) -> &[SparseNode] {
        &self.nodes
    }

    pub fn bound(&self) -> &B {
        &self.bound
    }

    /// Replace every non-empty node's attribution with a single residual
    /// entry holding its whole buffered total.
    pub fn collapse_to_residual(&mut self) {
        for node in &mut self.nodes {
            node.vector = if node.buffered > 0.0 {
                SparseVector::singleton(RESIDUAL_ORIGIN, node.buffered)
            } else {
                SparseVector::new()
            };
        }
    }

    pub fn stats(&self) -> SparseStats {
        let mut stats = self.stats.clone();
        stats.entries_held = self.nodes.iter().map(|n| n.vector.len()).sum();
        stats.capacity_held = self.nodes.iter().map(|n| n.vector.capacity()).sum();
        stats
    }

    pub fn into_parts(self) -> (Vec<SparseNode>, SparseStats, B) {
        let stats = self.stats();
        (self.nodes, stats, self.bound)
    }

    fn record_birth(&mut self, quantity: f64) {
        self.stats.births += 1;
        self.stats.total_born += quantity;
    }
}

impl<B: VectorBound> AttributionTracker for SparseEngine<B> {
    fn apply(&mut self, ix: &Interaction) {
        let step = self.stats.interactions;
        self.stats.interactions += 1;
        if ix.quantity <= 0.0 {
            return;
        }
        let src = ix.source as usize;
        let dest = ix.dest as usize;
        let qty = ix.quantity;

        if src == dest {
            // Relaying to itself only matters if it exceeds what it holds.
            let shortfall = qty - self.nodes[src].buffered;
            if shortfall > BIRTH_EPSILON {
                self.nodes[src].vector.add(ix.source, shortfall);
                self.nodes[src].buffered = qty;
                self.record_birth(shortfall);
            }
        } else if qty >= self.nodes[src].buffered {
            self.stats.full_transfers += 1;
            let source_total = self.nodes[src].buffered;
            let moved = std::mem::take(&mut self.nodes[src].vector);
            let target = &mut self.nodes[dest];
            target.vector.absorb(moved);
            let shortfall = qty - source_total;
            if shortfall > BIRTH_EPSILON {
                target.vector.add(ix.source, shortfall);
            }
            target.buffered += qty;
            self.nodes[src].buffered = 0.0;
            if shortfall > BIRTH_EPSILON {
                self.record_birth(shortfall);
            }
        } else {
            self.stats.proportional_transfers += 1;
            let (source, target) = pair_mut(&mut self.nodes, src, dest);
            source.vector.transfer_share(&mut target.vector, qty, source.buffered);
            source.buffered -= qty;
            target.buffered += qty;
        }

        self.bound.enforce(ix.dest, step, &mut self.nodes[dest].vector);
    }

    fn numnodes(&self) -> usize {
        self.nodes.len()
    }

    fn buffered(&self, node: NodeId) -> f64 {
        self.nodes[node as usize].buffered
    }

    fn attributed(&self, node: NodeId) -> f64 {
        self.nodes[node as usize].vector.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::replay;

    fn ix(s: u32, d: u32, t: f64, q: f64) -> Interaction {
        Interaction::new(s, d, t, q)
    }

    #[test]
    fn proportional_split_follows_shares() {
        let mut engine = SparseEngine::new(4);
        replay(
            &mut engine,
            &[ix(0, 2, 1.0, 6.0), ix(1, 2, 2.0, 2.0), ix(2, 3, 3.0, 4.0)],
        );
        let n3 = engine.node(3);
        assert!((n3.vector.get(0).unwrap_or(0.0) - 3.0).abs() < 1e-12);
        assert!((n3.vector.get(1).unwrap_or(0.0) - 1.0).abs() < 1e-12);
        assert!((engine.node(2).buffered - 4.0).abs() < 1e-12);
        assert!((engine.attributed(2) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn full_transfer_clears_source_and_births_remainder() {
        let mut engine = SparseEngine::new(3);
        replay(&mut engine, &[ix(0, 1, 1.0, 3.0), ix(1, 2, 2.0, 5.0)]);
        assert!(engine.node(1).vector.is_empty());
        assert_eq!(engine.node(1).buffered, 0.0);
        let n2 = &engine.node(2).vector;
        assert_eq!(n2.get(0), Some(3.0));
        assert_eq!(n2.get(1), Some(2.0));
        assert_eq!(engine.stats().births, 2);
    }

    #[test]
    fn self_loop_only_births_shortfall() {
        let mut engine = SparseEngine::new(2);
        replay(&mut engine, &[ix(0, 1, 1.0, 5.0), ix(1, 1, 2.0, 3.0)]);
        assert_eq!(engine.node(1).vector.get(1), None);
        assert_eq!(engine.node(1).buffered, 5.0);
        replay(&mut engine, &[ix(1, 1, 3.0, 8.0)]);
        assert_eq!(engine.node(1).vector.get(1), Some(3.0));
        assert_eq!(engine.node(1).buffered, 8.0);
        assert!((engine.attributed(1) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn collapse_keeps_totals() {
        let mut engine = SparseEngine::new(3);
        replay(&mut engine, &[ix(0, 1, 1.0, 3.0), ix(2, 1, 2.0, 1.0)]);
        engine.collapse_to_residual();
        assert_eq!(engine.node(1).vector.len(), 1);
        assert_eq!(engine.node(1).vector.get(RESIDUAL_ORIGIN), Some(4.0));
        assert!(engine.node(0).vector.is_empty());
    }
}
