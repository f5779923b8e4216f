// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine - Exact Lot Accounting

//! Exact-lot provenance: discrete lots move between per-node containers.
//!
//! For each interaction `(src, dest, ts, qty)` the source relays `qty` by
//! consuming lots in its container's order, splitting the last lot if it
//! is larger than what remains. Any shortfall is born at `src` as a new
//! lot. The relay loop is the same for every policy; only the container
//! differs.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::container::{KeyOrder, LotContainer, LotStack, PriorityBuffer, RingBuffer};
use crate::types::{Interaction, Lot, NodeId, BIRTH_EPSILON};

// ---------------------------------------------------------------------------
// Policy & configuration
// ---------------------------------------------------------------------------

/// Which buffered lot a relay consumes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExactPolicy {
    /// Least recently born lot first.
    OldestFirst,
    /// Most recently born lot first.
    NewestFirst,
    /// Most recently received lot first.
    Lifo,
    /// Least recently received lot first.
    Fifo,
}

impl ExactPolicy {
    pub fn description(&self) -> &'static str {
        match self {
            Self::OldestFirst => "least recently born",
            Self::NewestFirst => "most recently born",
            Self::Lifo => "last in, first out",
            Self::Fifo => "first in, first out",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactConfig {
    pub policy: ExactPolicy,
    /// Record the relaying nodes of every lot.
    pub track_paths: bool,
    /// Ignore `src == dest` interactions. `None` keeps the historical
    /// per-policy behaviour: only LIFO skips them.
    pub skip_self_loops: Option<bool>,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            policy: ExactPolicy::OldestFirst,
            track_paths: false,
            skip_self_loops: None,
        }
    }
}

impl ExactConfig {
    pub fn new(policy: ExactPolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    pub fn with_paths(mut self) -> Self {
        self.track_paths = true;
        self
    }

    pub fn skips_self_loops(&self) -> bool {
        self.skip_self_loops.unwrap_or(matches!(self.policy, ExactPolicy::Lifo))
    }
}

// ---------------------------------------------------------------------------
// Statistics & outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExactStats {
    pub interactions: u64,
    /// Relay-loop iterations plus births.
    pub transfers: u64,
    /// Whole lots moved without splitting.
    pub relays: u64,
    pub births: u64,
    pub skipped_self_loops: u64,
    pub lots_held: usize,
    pub capacity_held: usize,
    /// Total number of node ids stored across all recorded paths.
    pub path_nodes_held: usize,
    /// Sum of applied interaction quantities.
    pub total_input: f64,
    /// Sum of born lot quantities; equals the final buffered total.
    pub total_born: f64,
}

/// Final per-node lots, each node's list in extraction order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactOutcome {
    pub policy: ExactPolicy,
    pub nodes: Vec<Vec<Lot>>,
    pub stats: ExactStats,
}

impl ExactOutcome {
    pub fn buffered(&self, node: NodeId) -> f64 {
        self.nodes[node as usize].iter().map(|lot| lot.quantity).sum()
    }

    pub fn total_buffered(&self) -> f64 {
        self.nodes.iter().flatten().map(|lot| lot.quantity).sum()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-node lot containers plus the relay state machine.
pub struct ExactEngine<C: LotContainer> {
    buffers: Vec<C>,
    track_paths: bool,
    skip_self_loops: bool,
    stats: ExactStats,
}

impl<C: LotContainer> ExactEngine<C> {
    /// One empty container per node, built by `make`.
    pub fn new(numnodes: usize, make: impl FnMut() -> C, config: &ExactConfig) -> Self {
        let mut make = make;
        Self {
            buffers: (0..numnodes).map(|_| make()).collect(),
            track_paths: config.track_paths,
            skip_self_loops: config.skips_self_loops(),
            stats: ExactStats::default(),
        }
    }

    pub fn buffer(&self, node: NodeId) -> &C {
        &self.buffers[node as usize]
    }

    pub fn buffered(&self, node: NodeId) -> f64 {
        self.buffers[node as usize].total_quantity()
    }

    pub fn total_buffered(&self) -> f64 {
        self.buffers.iter().map(LotContainer::total_quantity).sum()
    }

    /// Apply one interaction.
    pub fn apply(&mut self, ix: &Interaction) {
        self.stats.interactions += 1;
        if ix.quantity <= 0.0 {
            return;
        }
        if self.skip_self_loops && ix.is_self_loop() {
            self.stats.skipped_self_loops += 1;
            return;
        }
        self.stats.total_input += ix.quantity;

        let src = ix.source as usize;
        let dest = ix.dest as usize;

        if src == dest {
            // Held lots stay where they are; only quantity beyond them is new.
            let shortfall = ix.quantity - self.buffers[src].total_quantity();
            self.birth(ix, shortfall);
            return;
        }

        let mut residue = ix.quantity;

        while residue > 0.0 {
            let Some(next) = self.buffers[src].next_mut() else {
                break;
            };
            self.stats.transfers += 1;
            if next.quantity > residue {
                let part = next.split_off(residue, ix.source);
                self.buffers[dest].insert(part);
                residue = 0.0;
            } else if let Some(lot) = self.buffers[src].take_next() {
                residue -= lot.quantity;
                self.stats.relays += 1;
                self.buffers[dest].insert(lot.relayed_through(ix.source));
            }
        }

        // Source could not cover the transfer: the shortfall is new provenance.
        self.birth(ix, residue);
    }

    fn birth(&mut self, ix: &Interaction, quantity: f64) {
        if quantity <= BIRTH_EPSILON {
            return;
        }
        self.stats.transfers += 1;
        self.stats.births += 1;
        self.stats.total_born += quantity;
        let lot = Lot::born(ix.source, ix.timestamp, quantity, self.track_paths);
        self.buffers[ix.dest as usize].insert(lot);
    }

    pub fn stats(&self) -> ExactStats {
        let mut stats = self.stats.clone();
        stats.lots_held = self.buffers.iter().map(LotContainer::len).sum();
        stats.capacity_held = self.buffers.iter().map(LotContainer::capacity).sum();
        stats.path_nodes_held = self
            .buffers
            .iter()
            .flat_map(|b| b.iter())
            .map(Lot::path_len)
            .sum();
        stats
    }

    pub fn into_outcome(self, policy: ExactPolicy) -> ExactOutcome {
        let stats = self.stats();
        ExactOutcome {
            policy,
            nodes: self.buffers.into_iter().map(LotContainer::into_lots).collect(),
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Replay `interactions` over `numnodes` nodes under `config`.
pub fn run(interactions: &[Interaction], numnodes: usize, config: &ExactConfig) -> ExactOutcome {
    info!(
        policy = config.policy.description(),
        paths = config.track_paths,
        numnodes,
        interactions = interactions.len(),
        "exact provenance replay starts"
    );
    let outcome = match config.policy {
        ExactPolicy::OldestFirst => replay_with(interactions, numnodes, config, || {
            PriorityBuffer::new(KeyOrder::Ascending)
        }),
        ExactPolicy::NewestFirst => replay_with(interactions, numnodes, config, || {
            PriorityBuffer::new(KeyOrder::Descending)
        }),
        ExactPolicy::Lifo => replay_with(interactions, numnodes, config, LotStack::new),
        ExactPolicy::Fifo => replay_with(interactions, numnodes, config, RingBuffer::new),
    };
    info!(
        lots = outcome.stats.lots_held,
        births = outcome.stats.births,
        born = outcome.stats.total_born,
        relays = outcome.stats.relays,
        "exact provenance replay finished"
    );
    outcome
}

fn replay_with<C: LotContainer>(
    interactions: &[Interaction],
    numnodes: usize,
    config: &ExactConfig,
    make: impl FnMut() -> C,
) -> ExactOutcome {
    let mut engine = ExactEngine::new(numnodes, make, config);
    for ix in interactions {
        engine.apply(ix);
    }
    engine.into_outcome(config.policy)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ix(s: u32, d: u32, t: f64, q: f64) -> Interaction {
        Interaction::new(s, d, t, q)
    }

    #[test]
    fn oldest_first_splits_oldest_lot() {
        let log = [ix(0, 1, 1.0, 10.0), ix(1, 2, 2.0, 4.0)];
        let out = run(&log, 3, &ExactConfig::new(ExactPolicy::OldestFirst));
        assert_eq!(out.nodes[1].len(), 1);
        assert_eq!(out.nodes[1][0].origin, 0);
        assert_eq!(out.nodes[1][0].birth_time, 1.0);
        assert!((out.nodes[1][0].quantity - 6.0).abs() < 1e-12);
        assert_eq!(out.nodes[2].len(), 1);
        assert!((out.nodes[2][0].quantity - 4.0).abs() < 1e-12);
        assert!(out.nodes[0].is_empty());
    }

    #[test]
    fn newest_first_consumes_latest_birth() {
        // Node 1 receives from 0 at t=1 and from 3 at t=2, then relays 5.
        let log = [ix(0, 1, 1.0, 5.0), ix(3, 1, 2.0, 5.0), ix(1, 2, 3.0, 5.0)];
        let newest = run(&log, 4, &ExactConfig::new(ExactPolicy::NewestFirst));
        assert_eq!(newest.nodes[2][0].origin, 3);
        let oldest = run(&log, 4, &ExactConfig::new(ExactPolicy::OldestFirst));
        assert_eq!(oldest.nodes[2][0].origin, 0);
    }

    #[test]
    fn lifo_and_fifo_pick_by_arrival() {
        let log = [ix(0, 1, 1.0, 5.0), ix(3, 1, 2.0, 5.0), ix(1, 2, 3.0, 5.0)];
        let lifo = run(&log, 4, &ExactConfig::new(ExactPolicy::Lifo));
        assert_eq!(lifo.nodes[2][0].origin, 3);
        let fifo = run(&log, 4, &ExactConfig::new(ExactPolicy::Fifo));
        assert_eq!(fifo.nodes[2][0].origin, 0);
    }

    #[test]
    fn shortfall_is_born_at_source() {
        let log = [ix(0, 1, 1.0, 3.0), ix(1, 2, 2.0, 5.0)];
        let out = run(&log, 3, &ExactConfig::new(ExactPolicy::Fifo));
        let origins: Vec<(u32, f64)> = out.nodes[2].iter().map(|l| (l.origin, l.quantity)).collect();
        assert_eq!(origins.len(), 2);
        assert!(origins.iter().any(|&(o, q)| o == 0 && (q - 3.0).abs() < 1e-12));
        assert!(origins.iter().any(|&(o, q)| o == 1 && (q - 2.0).abs() < 1e-12));
        assert_eq!(out.stats.births, 2);
        assert_eq!(out.stats.relays, 1);
    }

    #[test]
    fn paths_record_relaying_nodes() {
        let log = [ix(0, 1, 1.0, 4.0), ix(1, 2, 2.0, 4.0), ix(2, 3, 3.0, 1.0)];
        let out = run(&log, 4, &ExactConfig::new(ExactPolicy::Lifo).with_paths());
        assert_eq!(out.nodes[3][0].path, Some(vec![1, 2]));
        assert_eq!(out.nodes[2][0].path, Some(vec![1]));
        assert_eq!(out.stats.path_nodes_held, 3);
    }

    #[test]
    fn self_loop_skip_defaults_per_policy() {
        assert!(ExactConfig::new(ExactPolicy::Lifo).skips_self_loops());
        assert!(!ExactConfig::new(ExactPolicy::Fifo).skips_self_loops());
        assert!(!ExactConfig::new(ExactPolicy::OldestFirst).skips_self_loops());

        let log = [ix(0, 0, 1.0, 2.0)];
        let lifo = run(&log, 1, &ExactConfig::new(ExactPolicy::Lifo));
        assert!(lifo.nodes[0].is_empty());
        assert_eq!(lifo.stats.skipped_self_loops, 1);

        let heap = run(&log, 1, &ExactConfig::new(ExactPolicy::OldestFirst));
        assert!((heap.total_buffered() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn explicit_self_loop_override() {
        let config = ExactConfig {
            policy: ExactPolicy::OldestFirst,
            track_paths: false,
            skip_self_loops: Some(true),
        };
        let out = run(&[ix(2, 2, 1.0, 1.0)], 3, &config);
        assert!(out.total_buffered().abs() < 1e-12);
    }

    #[test]
    fn zero_quantity_is_a_no_op() {
        let log = [ix(0, 1, 1.0, 3.0), ix(1, 2, 2.0, 0.0)];
        let out = run(&log, 3, &ExactConfig::new(ExactPolicy::OldestFirst));
        assert!(out.nodes[2].is_empty());
        assert!((out.buffered(1) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn self_loop_births_only_excess_over_held_lots() {
        let log = [ix(0, 1, 1.0, 5.0), ix(1, 1, 2.0, 8.0)];
        for policy in [ExactPolicy::OldestFirst, ExactPolicy::NewestFirst, ExactPolicy::Fifo] {
            let out = run(&log, 2, &ExactConfig::new(policy));
            assert_eq!(out.stats.births, 2, "{:?}", policy);
            assert!((out.buffered(1) - 8.0).abs() < 1e-9);
            let lots: Vec<(u32, f64)> = out.nodes[1].iter().map(|l| (l.origin, l.quantity)).collect();
            assert!(lots.iter().any(|&(o, q)| o == 0 && (q - 5.0).abs() < 1e-12));
            assert!(lots.iter().any(|&(o, q)| o == 1 && (q - 3.0).abs() < 1e-12));
        }
    }

    #[test]
    fn self_loop_within_holdings_changes_nothing() {
        let log = [ix(0, 1, 1.0, 5.0), ix(1, 1, 2.0, 2.0)];
        let out = run(&log, 2, &ExactConfig::new(ExactPolicy::Fifo));
        assert_eq!(out.stats.births, 1);
        assert_eq!(out.nodes[1].len(), 1);
        assert!((out.buffered(1) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn self_loop_over_tiny_leftover_lot_terminates() {
        // Node 1 keeps a sliver after the split, then loops a huge quantity.
        let log = [
            ix(0, 1, 1.0, 1.0),
            ix(1, 2, 2.0, 0.9999999999999999),
            ix(1, 1, 3.0, 1e6),
        ];
        for policy in [ExactPolicy::OldestFirst, ExactPolicy::NewestFirst, ExactPolicy::Fifo] {
            let out = run(&log, 3, &ExactConfig::new(policy));
            assert!((out.buffered(1) - 1e6).abs() < 1e-6, "{:?}", policy);
            assert!((out.total_buffered() - out.stats.total_born).abs() < 1e-6);
        }
    }

    #[test]
    fn buffered_total_equals_born_total() {
        let log = [
            ix(0, 1, 1.0, 10.0),
            ix(1, 2, 2.0, 4.0),
            ix(2, 0, 3.0, 7.0),
            ix(0, 1, 4.0, 1.5),
        ];
        for policy in [
            ExactPolicy::OldestFirst,
            ExactPolicy::NewestFirst,
            ExactPolicy::Lifo,
            ExactPolicy::Fifo,
        ] {
            let out = run(&log, 3, &ExactConfig::new(policy));
            assert!(
                (out.total_buffered() - out.stats.total_born).abs() < 1e-9,
                "{:?} lost quantity",
                policy
            );
        }
    }
}
