// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine - Conservation Checks

//! Quantity conservation across a finished replay.
//!
//! ```text
//! sum of buffered quantities  == sum of born quantities
//! buffered[node]              == sum of node's attribution entries
//! ```
//!
//! Totals are compared as `Decimal` so that the accumulated error is not
//! itself subject to float rounding. Each check allows an absolute
//! tolerance of `0.0001` or a relative one of `1e-9`, whichever is larger.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::attribution::AttributionTracker;
use crate::types::NodeId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConservationError {
    #[error("buffered total {actual} does not match born total {expected}")]
    Imbalance { expected: Decimal, actual: Decimal },

    #[error("node {node}: buffered {buffered} but attributed {attributed}")]
    NodeDrift { node: NodeId, buffered: Decimal, attributed: Decimal },

    #[error("quantity {0} is not finite")]
    NonFinite(f64),
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

const ABSOLUTE_TOLERANCE: Decimal = dec!(0.0001);
const RELATIVE_TOLERANCE: Decimal = dec!(0.000000001);

/// Accumulates the error of every check made against one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConservationLedger {
    cumulative_error: Decimal,
    checks: u64,
    violations: u64,
}

impl ConservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of absolute errors over all checks, within tolerance or not.
    pub fn cumulative_error(&self) -> Decimal {
        self.cumulative_error
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }

    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Final buffered total against the total born during the run.
    pub fn verify_total(&mut self, born: f64, buffered: f64) -> Result<(), ConservationError> {
        let expected = to_decimal(born)?;
        let actual = to_decimal(buffered)?;
        if self.check(expected, actual) {
            Ok(())
        } else {
            Err(ConservationError::Imbalance { expected, actual })
        }
    }

    /// Per-node `(node, buffered, attributed)` triples.
    pub fn verify_nodes<I>(&mut self, nodes: I) -> Result<(), ConservationError>
    where
        I: IntoIterator<Item = (NodeId, f64, f64)>,
    {
        for (node, buffered, attributed) in nodes {
            let buffered = to_decimal(buffered)?;
            let attributed = to_decimal(attributed)?;
            if !self.check(buffered, attributed) {
                return Err(ConservationError::NodeDrift { node, buffered, attributed });
            }
        }
        Ok(())
    }

    /// Both checks against a live tracker.
    pub fn verify_tracker<T>(&mut self, tracker: &T, born: f64) -> Result<(), ConservationError>
    where
        T: AttributionTracker + ?Sized,
    {
        self.verify_total(born, tracker.total_buffered())?;
        self.verify_nodes(
            (0..tracker.numnodes() as NodeId)
                .map(|n| (n, tracker.buffered(n), tracker.attributed(n))),
        )
    }

    fn check(&mut self, expected: Decimal, actual: Decimal) -> bool {
        let error = (expected - actual).abs();
        self.cumulative_error += error;
        self.checks += 1;
        let tolerance = ABSOLUTE_TOLERANCE.max(expected.abs() * RELATIVE_TOLERANCE);
        let balanced = error <= tolerance;
        if !balanced {
            self.violations += 1;
        }
        balanced
    }
}

fn to_decimal(quantity: f64) -> Result<Decimal, ConservationError> {
    Decimal::from_f64(quantity).ok_or(ConservationError::NonFinite(quantity))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{replay, SparseEngine};
    use crate::types::Interaction;

    #[test]
    fn balanced_total_passes() {
        let mut ledger = ConservationLedger::new();
        assert!(ledger.verify_total(10.0, 10.00001).is_ok());
        assert_eq!(ledger.checks(), 1);
        assert_eq!(ledger.violations(), 0);
    }

    #[test]
    fn imbalanced_total_is_reported() {
        let mut ledger = ConservationLedger::new();
        let err = ledger
            .verify_total(10.0, 9.0)
            .expect_err("test: should be Imbalance");
        assert!(
            matches!(err, ConservationError::Imbalance { .. }),
            "expected Imbalance, got: {err}"
        );
        assert_eq!(ledger.violations(), 1);
        assert_eq!(ledger.cumulative_error(), dec!(1));
    }

    #[test]
    fn node_drift_names_the_node() {
        let mut ledger = ConservationLedger::new();
        let err = ledger
            .verify_nodes([(0, 1.0, 1.0), (4, 2.0, 1.5)])
            .expect_err("test: should be NodeDrift");
        assert!(matches!(err, ConservationError::NodeDrift { node: 4, .. }));
    }

    #[test]
    fn nan_is_rejected() {
        let mut ledger = ConservationLedger::new();
        assert!(matches!(
            ledger.verify_total(f64::NAN, 1.0),
            Err(ConservationError::NonFinite(_))
        ));
    }

    #[test]
    fn sparse_tracker_conserves() {
        let mut engine = SparseEngine::new(3);
        replay(
            &mut engine,
            &[
                Interaction::new(0, 1, 1.0, 3.0),
                Interaction::new(1, 2, 2.0, 1.0),
                Interaction::new(2, 0, 3.0, 4.0),
            ],
        );
        let born = engine.stats().total_born;
        let mut ledger = ConservationLedger::new();
        assert!(ledger.verify_tracker(&engine, born).is_ok());
        assert_eq!(ledger.checks(), 4);
    }
}
