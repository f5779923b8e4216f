// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine

//! Provenance over a streaming flow graph.
//!
//! A time-ordered log of `(source, dest, timestamp, quantity)` transfers is
//! replayed over `numnodes` nodes, and the quantity left at each node is
//! traced back to the nodes that introduced it:
//!
//! * [`exact`] moves discrete lots in one of four eviction orders;
//! * [`attribution`] keeps proportional per-origin vectors (sparse, dense,
//!   selected or grouped);
//! * [`bounded`] bounds sparse attribution by windowing or by budget.

pub mod types;
pub mod error;
pub mod container;
pub mod exact;
pub mod attribution;
pub mod bounded;
pub mod baseline;
pub mod conservation;

pub use types::*;
pub use error::{ProvenanceError, Result};
pub use exact::{ExactConfig, ExactOutcome, ExactPolicy, ExactStats};
pub use attribution::{
    run_dense, run_grouped, run_selected, run_sparse, AttributionTracker, DenseOutcome,
    SparseOutcome,
};
pub use bounded::{
    run_budget, run_windowed, BudgetConfig, BudgetOutcome, ResidualKey, WindowConfig,
    WindowedOutcome,
};
pub use baseline::BaselineOutcome;
pub use conservation::{ConservationError, ConservationLedger};
