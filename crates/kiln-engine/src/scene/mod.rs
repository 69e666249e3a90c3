//! Scene graph: transform nodes, dirty tracking and flattening.
//!
//! Responsibilities:
//! - own the node tree (arena of [`Node`] addressed by [`NodeId`])
//! - recompute world transforms lazily, only under changed subtrees
//! - flatten a subtree into a paint-ordered [`DrawList`]

mod error;
mod graph;
mod list;
mod node;

pub use error::SceneError;
pub use graph::{SceneGraph, TransformStats};
pub use list::{DrawList, DrawPrimitive, Geometry};
pub use node::{LocalTransform, Mesh, Node, NodeKind, Sprite};

slotmap::new_key_type! {
    /// Handle of a node inside a [`SceneGraph`].
    pub struct NodeId;
}
