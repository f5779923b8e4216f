//! Budget-bounded sparse attribution.
//!
//! A [`Compactor`] caps every node's vector at `budget` entries. When an
//! update leaves more, the vector keeps its `reduced_size` largest entries
//! and the rest is folded into a residual entry. Buffered totals are never
//! touched; only the resolution of their decomposition is lost.

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::attribution::{
    replay, SparseEngine, SparseNode, SparseStats, SparseVector, VectorBound,
};
use crate::error::{ProvenanceError, Result};
use crate::types::{Interaction, NodeId, RESIDUAL_ORIGIN};

/// Key that absorbs folded quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResidualKey {
    /// The shared [`RESIDUAL_ORIGIN`].
    #[default]
    Sentinel,
    /// The id of the node being shrunk.
    SelfNode,
}

impl ResidualKey {
    pub fn for_node(self, node: NodeId) -> NodeId {
        match self {
            Self::Sentinel => RESIDUAL_ORIGIN,
            Self::SelfNode => node,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum entries per vector.
    pub budget: usize,
    /// Entries kept by a shrink, before the residual is added.
    pub reduced_size: usize,
    pub residual: ResidualKey,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            budget: 100,
            reduced_size: 50,
            residual: ResidualKey::Sentinel,
        }
    }
}

impl BudgetConfig {
    pub fn new(budget: usize, reduced_size: usize) -> Self {
        Self { budget, reduced_size, residual: ResidualKey::Sentinel }
    }

    pub fn with_residual(mut self, residual: ResidualKey) -> Self {
        self.residual = residual;
        self
    }

    /// `budget >= 1` and `reduced_size < budget`, so a shrunk vector plus
    /// its residual entry always fits.
    pub fn validate(&self) -> Result<()> {
        if self.budget == 0 {
            return Err(ProvenanceError::ZeroBudget);
        }
        if self.reduced_size >= self.budget {
            return Err(ProvenanceError::ReducedSizeTooLarge {
                reduced: self.reduced_size,
                budget: self.budget,
            });
        }
        Ok(())
    }
}

/// Vector bound that shrinks over-budget vectors and counts every shrink.
#[derive(Debug, Clone)]
pub struct Compactor {
    config: BudgetConfig,
    num_buf_shrinks: Vec<u32>,
    last_buf_shrink: Vec<Option<u64>>,
    folded: f64,
}

impl Compactor {
    pub fn new(numnodes: usize, config: BudgetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            num_buf_shrinks: vec![0; numnodes],
            last_buf_shrink: vec![None; numnodes],
            folded: 0.0,
        })
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub fn num_buf_shrinks(&self, node: NodeId) -> u32 {
        self.num_buf_shrinks[node as usize]
    }

    pub fn last_buf_shrink(&self, node: NodeId) -> Option<u64> {
        self.last_buf_shrink[node as usize]
    }

    /// Total quantity moved into residual entries.
    pub fn folded(&self) -> f64 {
        self.folded
    }

    fn stats(&self, nodes: &[SparseNode]) -> ShrinkStats {
        let nonempty_buffers = nodes.iter().filter(|n| !n.vector.is_empty()).count();
        let total_shrinks: u64 = nodes
            .iter()
            .zip(&self.num_buf_shrinks)
            .filter(|(n, _)| !n.vector.is_empty())
            .map(|(_, &s)| u64::from(s))
            .sum();
        let mean_shrinks_nonempty = if nonempty_buffers == 0 {
            0.0
        } else {
            total_shrinks as f64 / nonempty_buffers as f64
        };
        ShrinkStats {
            num_buf_shrinks: self.num_buf_shrinks.clone(),
            last_buf_shrink: self.last_buf_shrink.clone(),
            nonempty_buffers,
            nodes_shrunk: self.num_buf_shrinks.iter().filter(|&&s| s > 0).count(),
            mean_shrinks_nonempty,
            folded: self.folded,
        }
    }
}

impl VectorBound for Compactor {
    fn enforce(&mut self, node: NodeId, step: u64, vector: &mut SparseVector) {
        if vector.len() <= self.config.budget {
            return;
        }
        let before = vector.len();
        let residual = self.config.residual.for_node(node);
        let folded = vector.shrink(self.config.reduced_size, residual);
        self.folded += folded;
        self.num_buf_shrinks[node as usize] += 1;
        self.last_buf_shrink[node as usize] = Some(step);
        trace!(node, step, before, after = vector.len(), folded, "vector shrunk");
    }
}

/// Information-loss summary of a budgeted run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShrinkStats {
    pub num_buf_shrinks: Vec<u32>,
    /// Interaction index of each node's latest shrink.
    pub last_buf_shrink: Vec<Option<u64>>,
    pub nonempty_buffers: usize,
    /// Nodes shrunk at least once.
    pub nodes_shrunk: usize,
    pub mean_shrinks_nonempty: f64,
    pub folded: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetOutcome {
    pub config: BudgetConfig,
    pub nodes: Vec<SparseNode>,
    pub stats: SparseStats,
    pub shrinks: ShrinkStats,
}

impl BudgetOutcome {
    pub fn total_buffered(&self) -> f64 {
        self.nodes.iter().map(|n| n.buffered).sum()
    }
}

pub fn run_budget(
    interactions: &[Interaction],
    numnodes: usize,
    config: BudgetConfig,
) -> Result<BudgetOutcome> {
    let compactor = Compactor::new(numnodes, config)?;
    info!(
        budget = config.budget,
        reduced_size = config.reduced_size,
        residual = ?config.residual,
        numnodes,
        interactions = interactions.len(),
        "budget attribution replay starts"
    );
    let mut engine = SparseEngine::with_bound(numnodes, compactor);
    replay(&mut engine, interactions);
    let (nodes, stats, compactor) = engine.into_parts();
    let shrinks = compactor.stats(&nodes);
    info!(
        nonempty = shrinks.nonempty_buffers,
        shrunk = shrinks.nodes_shrunk,
        mean_shrinks = shrinks.mean_shrinks_nonempty,
        "budget attribution replay finished"
    );
    Ok(BudgetOutcome { config, nodes, stats, shrinks })
}
