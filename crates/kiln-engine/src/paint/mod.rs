//! Paint model shared between the scene graph and both renderers.
//!
//! Scope:
//! - color representation (linear premultiplied alpha)
//! - blend modes
//!
//! Geometry types remain in `coords`.

pub mod blend;
pub mod color;

pub use blend::BlendMode;
pub use color::Color;
