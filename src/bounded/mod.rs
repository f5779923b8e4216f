// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine - Bounded-Memory Controllers

//! Two ways of keeping sparse attribution bounded, both layered on
//! [`SparseEngine`](crate::attribution::SparseEngine):
//!
//! * [`window`]: two engines collapsed to a residual entry on alternating
//!   boundaries, so each view covers at most `2W` interactions;
//! * [`budget`]: every vector is capped at `budget` entries by folding its
//!   smallest entries into one residual entry.

pub mod budget;
pub mod window;

pub use budget::{run_budget, BudgetConfig, BudgetOutcome, Compactor, ResidualKey, ShrinkStats};
pub use window::{run_windowed, WindowConfig, WindowedEngine, WindowedOutcome};
