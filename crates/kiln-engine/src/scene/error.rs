use thiserror::Error;

use super::NodeId;

/// Structural scene errors. A failing call leaves the graph unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("child index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("world transforms of {0:?} are stale; run compute_world_transforms first")]
    StaleTransforms(NodeId),

    #[error("invalid mesh: {0}")]
    InvalidMesh(&'static str),
}
