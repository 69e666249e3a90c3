//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and one Window, autodetects a renderer for it and
//! drives an [`App`] once per redraw.

mod clock;
mod runtime;

pub use clock::FrameTime;
pub use runtime::{App, AppControl, FrameCtx, Runtime, RuntimeConfig};
