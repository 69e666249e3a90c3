//! Kiln engine crate.
//!
//! Retained-mode 2D scene graph with two interchangeable renderers: a batched
//! wgpu backend and a tiny-skia software backend.
//!
//! A frame flows `scene` → `batch` → `program`/`texture` → `device`, driven by
//! a [`render::Renderer`]. The `window` runtime hosts a renderer in a winit window.

pub mod batch;
pub mod coords;
pub mod device;
pub mod logging;
pub mod paint;
pub mod program;
pub mod render;
pub mod scene;
pub mod texture;
pub mod window;
