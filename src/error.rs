// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flow Provenance Engine - Parameter Errors

use crate::types::NodeId;

/// Policy parameters rejected before a replay starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvenanceError {
    #[error("window size must be positive")]
    ZeroWindow,

    #[error("budget must be at least 1")]
    ZeroBudget,

    #[error("reduced size {reduced} must be smaller than budget {budget}")]
    ReducedSizeTooLarge { reduced: usize, budget: usize },

    #[error("selected origin {origin} is outside 0..{numnodes}")]
    SelectedOriginOutOfRange { origin: NodeId, numnodes: usize },

    #[error("origin {0} selected more than once")]
    DuplicateSelectedOrigin(NodeId),

    #[error("group map covers {len} nodes, expected {numnodes}")]
    GroupMapLength { len: usize, numnodes: usize },

    #[error("node {node} mapped to group {group}, outside 0..{numgroups}")]
    GroupOutOfRange { node: NodeId, group: usize, numgroups: usize },

    #[error("at least one group is required")]
    NoGroups,
}

pub type Result<T> = std::result::Result<T, ProvenanceError>;
