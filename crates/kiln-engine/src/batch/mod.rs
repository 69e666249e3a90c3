//! Draw-call batching.
//!
//! Turns a paint-ordered [`DrawList`](crate::scene::DrawList) into batches that
//! share one frame-wide vertex/index buffer; one draw call per batch.

mod builder;
mod vertex;

pub use builder::{Batch, BatchBuilder, BatchSet};
pub use vertex::Vertex;
