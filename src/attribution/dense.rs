//! Dense attribution over a fixed slot map.
//!
//! Every origin maps to one slot. The identity map gives full dense
//! tracking, a selected set maps everything unselected into a shared
//! `Others` slot, and a group map folds origins into caller-defined groups.
//! A node's array is allocated on the first write that reaches it.

use serde::{Deserialize, Serialize};

use super::{pair_mut, AttributionTracker};
use crate::error::{ProvenanceError, Result};
use crate::types::{Interaction, NodeId, BIRTH_EPSILON};

/// What a dense slot stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotLabel {
    Origin(NodeId),
    Group(usize),
    Others,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseVector {
    slots: Vec<f64>,
}

impl DenseVector {
    pub fn is_allocated(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    pub fn get(&self, slot: usize) -> f64 {
        self.slots.get(slot).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.slots.iter().sum()
    }

    fn ensure(&mut self, numslots: usize) -> &mut [f64] {
        if self.slots.is_empty() {
            self.slots = vec![0.0; numslots];
        }
        &mut self.slots
    }

    fn add(&mut self, numslots: usize, slot: usize, quantity: f64) {
        self.ensure(numslots)[slot] += quantity;
    }

    fn zero(&mut self) {
        self.slots.iter_mut().for_each(|q| *q = 0.0);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseNode {
    pub vector: DenseVector,
    pub buffered: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseStats {
    pub interactions: u64,
    pub full_transfers: u64,
    pub proportional_transfers: u64,
    pub births: u64,
    pub total_born: f64,
    /// Nodes whose array has been allocated.
    pub allocated_nodes: usize,
    pub slots_held: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseOutcome {
    pub labels: Vec<SlotLabel>,
    pub nodes: Vec<DenseNode>,
    pub stats: DenseStats,
}

impl DenseOutcome {
    pub fn slot_quantity(&self, node: NodeId, slot: usize) -> f64 {
        self.nodes[node as usize].vector.get(slot)
    }

    pub fn buffered(&self, node: NodeId) -> f64 {
        self.nodes[node as usize].buffered
    }

    pub fn total_buffered(&self) -> f64 {
        self.nodes.iter().map(|n| n.buffered).sum()
    }

    /// Per-node `(label, quantity)` pairs for non-zero slots.
    pub fn labelled(&self, node: NodeId) -> Vec<(SlotLabel, f64)> {
        self.nodes[node as usize]
            .vector
            .slots()
            .iter()
            .zip(&self.labels)
            .filter(|(q, _)| **q != 0.0)
            .map(|(q, label)| (*label, *q))
            .collect()
    }
}

pub struct DenseEngine {
    nodes: Vec<DenseNode>,
    /// Slot receiving quantity born at each origin.
    slot_of: Vec<usize>,
    labels: Vec<SlotLabel>,
    stats: DenseStats,
}

impl DenseEngine {
    fn with_map(numnodes: usize, slot_of: Vec<usize>, labels: Vec<SlotLabel>) -> Self {
        Self {
            nodes: vec![DenseNode::default(); numnodes],
            slot_of,
            labels,
            stats: DenseStats::default(),
        }
    }

    /// One slot per origin.
    pub fn full(numnodes: usize) -> Self {
        let labels = (0..numnodes as NodeId).map(SlotLabel::Origin).collect();
        Self::with_map(numnodes, (0..numnodes).collect(), labels)
    }

    /// One slot per selected origin, in the given order, plus a trailing
    /// `Others` slot.
    pub fn selected(numnodes: usize, selected: &[NodeId]) -> Result<Self> {
        let others = selected.len();
        let mut slot_of = vec![others; numnodes];
        for (slot, &origin) in selected.iter().enumerate() {
            let index = origin as usize;
            if index >= numnodes {
                return Err(ProvenanceError::SelectedOriginOutOfRange { origin, numnodes });
            }
            if slot_of[index] != others {
                return Err(ProvenanceError::DuplicateSelectedOrigin(origin));
            }
            slot_of[index] = slot;
        }
        let mut labels: Vec<SlotLabel> = selected.iter().copied().map(SlotLabel::Origin).collect();
        labels.push(SlotLabel::Others);
        Ok(Self::with_map(numnodes, slot_of, labels))
    }

    /// One slot per group; `groups[node]` is the group of origin `node`.
    pub fn grouped(numnodes: usize, groups: &[usize], numgroups: usize) -> Result<Self> {
        if numgroups == 0 {
            return Err(ProvenanceError::NoGroups);
        }
        if groups.len() != numnodes {
            return Err(ProvenanceError::GroupMapLength { len: groups.len(), numnodes });
        }
        if let Some(node) = groups.iter().position(|&g| g >= numgroups) {
            return Err(ProvenanceError::GroupOutOfRange {
                node: node as NodeId,
                group: groups[node],
                numgroups,
            });
        }
        let labels = (0..numgroups).map(SlotLabel::Group).collect();
        Ok(Self::with_map(numnodes, groups.to_vec(), labels))
    }

    pub fn numslots(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[SlotLabel] {
        &self.labels
    }

    pub fn node(&self, node: NodeId) -> &DenseNode {
        &self.nodes[node as usize]
    }

    pub fn stats(&self) -> DenseStats {
        let mut stats = self.stats.clone();
        stats.allocated_nodes = self.nodes.iter().filter(|n| n.vector.is_allocated()).count();
        stats.slots_held = stats.allocated_nodes * self.numslots();
        stats
    }

    pub fn into_outcome(self) -> DenseOutcome {
        let stats = self.stats();
        DenseOutcome { labels: self.labels, nodes: self.nodes, stats }
    }

    fn record_birth(&mut self, quantity: f64) {
        self.stats.births += 1;
        self.stats.total_born += quantity;
    }
}

impl AttributionTracker for DenseEngine {
    fn apply(&mut self, ix: &Interaction) {
        self.stats.interactions += 1;
        if ix.quantity <= 0.0 {
            return;
        }
        let numslots = self.labels.len();
        let src = ix.source as usize;
        let dest = ix.dest as usize;
        let qty = ix.quantity;
        let birth_slot = self.slot_of[src];

        if src == dest {
            let shortfall = qty - self.nodes[src].buffered;
            if shortfall > BIRTH_EPSILON {
                self.nodes[src].vector.add(numslots, birth_slot, shortfall);
                self.nodes[src].buffered = qty;
                self.record_birth(shortfall);
            }
            return;
        }

        let (source, target) = pair_mut(&mut self.nodes, src, dest);
        let shortfall = if qty >= source.buffered {
            self.stats.full_transfers += 1;
            if source.vector.is_allocated() {
                let to = target.vector.ensure(numslots);
                for (t, s) in to.iter_mut().zip(source.vector.slots()) {
                    *t += s;
                }
                source.vector.zero();
            }
            let shortfall = qty - source.buffered;
            source.buffered = 0.0;
            shortfall
        } else {
            self.stats.proportional_transfers += 1;
            let ratio = qty / source.buffered;
            let to = target.vector.ensure(numslots);
            for (t, s) in to.iter_mut().zip(source.vector.slots.iter_mut()) {
                let moved = *s * ratio;
                *s -= moved;
                *t += moved;
            }
            source.buffered -= qty;
            0.0
        };
        target.buffered += qty;
        if shortfall > BIRTH_EPSILON {
            target.vector.add(numslots, birth_slot, shortfall);
            self.record_birth(shortfall);
        }
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
