//! Renderer front-end.
//!
//! Two backends implement one [`Renderer`] contract:
//! - [`HardwareRenderer`] flattens the scene, batches it and drives a [`GpuDevice`].
//! - [`SoftwareRenderer`] paints the same paint-ordered list into a CPU pixmap.
//!
//! [`autodetect_renderer`] probes for a GPU once and returns an [`AutoRenderer`],
//! so callers never branch on the backend.
//!
//! Convention:
//! - Scene coordinates are logical pixels (top-left origin, +Y down).
//! - Device output is `logical × resolution`.
//!
//! [`GpuDevice`]: crate::device::GpuDevice

mod detect;
mod error;
mod hardware;
mod options;
mod present;
mod software;
mod stats;

pub use detect::{
    AutoRenderer, DeviceProvider, Platform, WgpuProvider, autodetect_recommended_renderer,
    autodetect_recommended_renderer_with, autodetect_renderer, autodetect_renderer_with,
};
pub use error::RenderError;
pub use hardware::HardwareRenderer;
pub use options::{ConfigError, MAX_DIMENSION, RendererOptions};
pub use software::SoftwareRenderer;
pub use stats::{FrameStats, RendererKind, RendererState};

use crate::coords::Viewport;
use crate::scene::{NodeId, SceneGraph};
use crate::texture::{ImageSource, ResourceManager, TextureFrame, TextureId};

/// What every backend can do.
pub trait Renderer {
    fn kind(&self) -> RendererKind;

    fn state(&self) -> RendererState;

    fn options(&self) -> &RendererOptions;

    fn viewport(&self) -> Viewport;

    /// Draws the subtree under `root`.
    ///
    /// Recomputes dirty world transforms first. Per-resource failures do not
    /// fail the frame; they are returned in [`FrameStats::errors`].
    fn render(&mut self, scene: &mut SceneGraph, root: NodeId) -> Result<FrameStats, RenderError>;

    /// New logical size. The resolution is kept.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    /// New device pixels per logical pixel. The logical size is kept.
    fn set_resolution(&mut self, resolution: f32) -> Result<(), RenderError>;

    /// Frees every resource. Terminal; later calls fail with [`RenderError::Destroyed`].
    fn destroy(&mut self);

    fn textures(&self) -> &ResourceManager;

    fn acquire_texture(&mut self, source: &ImageSource) -> Result<TextureId, RenderError>;

    fn acquire_texture_frame(
        &mut self,
        source: &ImageSource,
        frame: TextureFrame,
    ) -> Result<TextureId, RenderError>;

    fn release_texture(&mut self, id: TextureId) -> Result<(), RenderError>;
}

fn check_alive(state: RendererState) -> Result<(), RenderError> {
    match state {
        RendererState::Destroyed => Err(RenderError::Destroyed),
        _ => Ok(()),
    }
}

/// Fails fast on use after destroy or a frame left in flight.
fn check_renderable(state: RendererState) -> Result<(), RenderError> {
    match state {
        RendererState::Destroyed => Err(RenderError::Destroyed),
        RendererState::Rendering => Err(RenderError::Reentrant),
        _ => Ok(()),
    }
}
