use thiserror::Error;

use crate::device::DeviceError;
use crate::program::ProgramError;
use crate::scene::SceneError;
use crate::texture::TextureError;

use super::ConfigError;

/// Errors surfaced by a [`Renderer`](super::Renderer).
///
/// Per-resource failures (`Texture`, `Program`) usually do not fail a frame;
/// they are collected into [`FrameStats::errors`](super::FrameStats).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("renderer has been destroyed")]
    Destroyed,

    #[error("render called while a frame is already in flight")]
    Reentrant,

    #[error("failed to restore the lost device: {0}")]
    RestoreFailed(DeviceError),
}
