//! Coordinate and geometry types shared by the scene graph and both renderers.
//!
//! Canonical CPU space:
//! - Logical pixels (resolution-independent)
//! - Origin top-left
//! - +X right, +Y down
//!
//! Device pixels are logical pixels multiplied by the renderer resolution.
//! The hardware path converts logical pixels to clip space in the vertex shader.

mod affine;
mod rect;
mod vec2;
mod viewport;

pub use affine::Affine;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
