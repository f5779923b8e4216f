//! Sliding-window attribution from an even/odd pair of sparse engines.
//!
//! Every `W` interactions one of the two states is collapsed: the even one
//! on multiples of `2W`, the odd one on the other multiples of `W`. Both
//! see every interaction, so at any point one of them holds attribution
//! for the last `W..2W` interactions.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attribution::{replay, AttributionTracker, SparseEngine, SparseNode, SparseStats};
use crate::error::{ProvenanceError, Result};
use crate::types::{Interaction, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Interactions between consecutive resets.
    pub window: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { window: 1000 }
    }
}

impl WindowConfig {
    pub fn new(window: u64) -> Self {
        Self { window }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ProvenanceError::ZeroWindow);
        }
        Ok(())
    }
}

pub struct WindowedEngine {
    even: SparseEngine,
    odd: SparseEngine,
    window: u64,
    step: u64,
    even_resets: u64,
    odd_resets: u64,
}

impl WindowedEngine {
    pub fn new(numnodes: usize, config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            even: SparseEngine::new(numnodes),
            odd: SparseEngine::new(numnodes),
            window: config.window,
            step: 0,
            even_resets: 0,
            odd_resets: 0,
        })
    }

    pub fn even(&self) -> &SparseEngine {
        &self.even
    }

    pub fn odd(&self) -> &SparseEngine {
        &self.odd
    }

    /// Interactions seen so far.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// The state whose last reset is older, i.e. the one covering the
    /// longer history. A boundary only takes effect on the next apply.
    pub fn widest(&self) -> &SparseEngine {
        let passed = self.step.saturating_sub(1) / self.window;
        if passed % 2 == 0 {
            &self.odd
        } else {
            &self.even
        }
    }

    fn reset_if_due(&mut self) {
        let step = self.step;
        if step == 0 || step % self.window != 0 {
            return;
        }
        if step % (2 * self.window) == 0 {
            self.even.collapse_to_residual();
            self.even_resets += 1;
            debug!(step, state = "even", "window reset");
        } else {
            self.odd.collapse_to_residual();
            self.odd_resets += 1;
            debug!(step, state = "odd", "window reset");
        }
    }

    pub fn into_outcome(self) -> WindowedOutcome {
        let (even, even_stats, _) = self.even.into_parts();
        let (odd, odd_stats, _) = self.odd.into_parts();
        WindowedOutcome {
            window: self.window,
            interactions: self.step,
            even,
            odd,
            even_stats,
            odd_stats,
            even_resets: self.even_resets,
            odd_resets: self.odd_resets,
        }
    }
}

impl AttributionTracker for WindowedEngine {
    fn apply(&mut self, ix: &Interaction) {
        self.reset_if_due();
        self.even.apply(ix);
        self.odd.apply(ix);
        self.step += 1;
    }

    fn numnodes(&self) -> usize {
        self.even.numnodes()
    }

    fn buffered(&self, node: NodeId) -> f64 {
        self.even.buffered(node)
    }

    fn attributed(&self, node: NodeId) -> f64 {
        self.even.attributed(node)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowedOutcome {
    pub window: u64,
    pub interactions: u64,
    pub even: Vec<SparseNode>,
    pub odd: Vec<SparseNode>,
    pub even_stats: SparseStats,
    pub odd_stats: SparseStats,
    pub even_resets: u64,
    pub odd_resets: u64,
}

impl WindowedOutcome {
    pub fn total_buffered(&self) -> f64 {
        self.even.iter().map(|n| n.buffered).sum()
    }
}

pub fn run_windowed(
    interactions: &[Interaction],
    numnodes: usize,
    config: WindowConfig,
) -> Result<WindowedOutcome> {
    let mut engine = WindowedEngine::new(numnodes, config)?;
    info!(
        window = config.window,
        numnodes,
        interactions = interactions.len(),
        "windowed attribution replay starts"
    );
    replay(&mut engine, interactions);
    let outcome = engine.into_outcome();
    info!(
        even_resets = outcome.even_resets,
        odd_resets = outcome.odd_resets,
        even_entries = outcome.even_stats.entries_held,
        odd_entries = outcome.odd_stats.entries_held,
        "windowed attribution replay finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RESIDUAL_ORIGIN;

    fn chain(n: usize) -> Vec<Interaction> {
        (0..n)
            .map(|i| Interaction::new((i % 3) as NodeId, 3, i as f64, 1.0))
            .collect()
    }

    #[test]
    fn zero_window_is_rejected() {
        assert_eq!(
            WindowedEngine::new(2, WindowConfig::new(0)).err(),
            Some(ProvenanceError::ZeroWindow)
        );
    }

    #[test]
    fn resets_alternate_between_states() {
        let outcome = run_windowed(&chain(9), 4, WindowConfig::new(2)).unwrap();
        // Boundaries at 2, 4, 6, 8: odd, even, odd, even.
        assert_eq!(outcome.even_resets, 2);
        assert_eq!(outcome.odd_resets, 2);
    }

    #[test]
    fn collapsed_state_keeps_only_recent_origins() {
        let log = vec![
            Interaction::new(0, 3, 0.0, 1.0),
            Interaction::new(1, 3, 1.0, 1.0),
            Interaction::new(2, 3, 2.0, 1.0),
        ];
        let mut engine = WindowedEngine::new(4, WindowConfig::new(2)).unwrap();
        replay(&mut engine, &log);
        // The odd state collapsed before step 2.
        let odd = &engine.odd().node(3).vector;
        assert_eq!(odd.get(RESIDUAL_ORIGIN), Some(2.0));
        assert_eq!(odd.get(2), Some(1.0));
        assert_eq!(odd.get(0), None);
        // The even state still resolves every origin.
        let even = &engine.even().node(3).vector;
        assert_eq!(even.len(), 3);
        assert!((engine.buffered(3) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn widest_tracks_the_older_reset_across_boundaries() {
        let log: Vec<Interaction> = (0..7)
            .map(|i| Interaction::new(i as NodeId, 7, i as f64, 1.0))
            .collect();
        let mut engine = WindowedEngine::new(8, WindowConfig::new(2)).unwrap();
        let mut widest_after = Vec::new();
        for ix in &log {
            engine.apply(ix);
            let even = std::ptr::eq(engine.widest(), engine.even());
            widest_after.push((engine.step(), even));
            if engine.step() >= 3 {
                // The widest state still resolves the interaction from two
                // steps back.
                let back = engine.step() as NodeId - 2;
                assert_eq!(engine.widest().node(7).vector.get(back), Some(1.0));
            }
        }
        assert_eq!(
            widest_after,
            vec![
                (1, false),
                (2, false), // odd boundary pending
                (3, true),  // odd collapsed
                (4, true),  // even boundary pending
                (5, false), // even collapsed
                (6, false),
                (7, true),
            ]
        );
        // Just after the even boundary the odd state spans origins 2..=4.
        let mut engine = WindowedEngine::new(8, WindowConfig::new(2)).unwrap();
        replay(&mut engine, &log[..5]);
        let widest = &engine.widest().node(7).vector;
        assert_eq!(widest.get(1), None);
        assert_eq!(widest.get(2), Some(1.0));
        assert_eq!(widest.get(RESIDUAL_ORIGIN), Some(2.0));
        assert_eq!(engine.even().node(7).vector.get(RESIDUAL_ORIGIN), Some(4.0));
    }

    #[test]
    fn both_states_agree_on_totals() {
        let outcome = run_windowed(&chain(20), 4, WindowConfig::new(3)).unwrap();
        for (e, o) in outcome.even.iter().zip(&outcome.odd) {
            assert!((e.buffered - o.buffered).abs() < 1e-9);
            assert!((e.vector.total() - o.vector.total()).abs() < 1e-9);
        }
    }
}
