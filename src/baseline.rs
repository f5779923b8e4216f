// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine - Scalar Replay

//! Replay without provenance: only per-node totals and the quantity each
//! node has introduced into the graph.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Interaction, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineOutcome {
    /// Quantity held at each node.
    pub buffered: Vec<f64>,
    /// Quantity born at each node, i.e. relayed beyond what it held.
    pub contributions: Vec<f64>,
}

impl BaselineOutcome {
    pub fn buffered(&self, node: NodeId) -> f64 {
        self.buffered[node as usize]
    }

    pub fn contribution(&self, node: NodeId) -> f64 {
        self.contributions[node as usize]
    }

    pub fn total_buffered(&self) -> f64 {
        self.buffered.iter().sum()
    }

    pub fn total_contributed(&self) -> f64 {
        self.contributions.iter().sum()
    }
}

pub fn run(interactions: &[Interaction], numnodes: usize) -> BaselineOutcome {
    info!(numnodes, interactions = interactions.len(), "baseline replay starts");
    let mut buffered = vec![0.0; numnodes];
    let mut contributions = vec![0.0; numnodes];

    for ix in interactions {
        let src = ix.source as usize;
        let dest = ix.dest as usize;
        let held = buffered[src];
        if ix.quantity > held {
            contributions[src] += ix.quantity - held;
        }
        buffered[src] -= ix.quantity.min(held);
        buffered[dest] += ix.quantity;
    }

    let outcome = BaselineOutcome { buffered, contributions };
    info!(
        buffered = outcome.total_buffered(),
        contributed = outcome.total_contributed(),
        "baseline replay finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_counts_as_contribution() {
        let outcome = run(
            &[
                Interaction::new(0, 1, 1.0, 10.0),
                Interaction::new(1, 2, 2.0, 4.0),
                Interaction::new(1, 2, 3.0, 8.0),
            ],
            3,
        );
        assert_eq!(outcome.buffered, vec![0.0, 0.0, 12.0]);
        assert_eq!(outcome.contributions, vec![10.0, 2.0, 0.0]);
        assert_eq!(outcome.total_buffered(), outcome.total_contributed());
    }

    #[test]
    fn self_loop_grows_only_by_shortfall() {
        let outcome = run(
            &[Interaction::new(0, 1, 1.0, 3.0), Interaction::new(1, 1, 2.0, 5.0)],
            2,
        );
        assert_eq!(outcome.buffered(1), 5.0);
        assert_eq!(outcome.contribution(1), 2.0);
    }
}
