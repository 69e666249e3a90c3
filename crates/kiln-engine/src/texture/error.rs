use thiserror::Error;

use super::{BaseTextureId, TextureId};

/// Failures of the texture/resource layer.
///
/// Upload-side variants are reported per resource: the renderer drops the
/// affected batch and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextureError {
    #[error("image source `{key}` has zero size")]
    ZeroSize { key: String },

    #[error("image source `{key}` is {width}x{height} but holds {len} bytes (expected {expected})")]
    BadPixelData {
        key: String,
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },

    #[error("frame does not fit inside image source `{key}`")]
    FrameOutOfBounds { key: String },

    #[error("texture handle {0:?} is unknown or already released")]
    UnknownTexture(TextureId),

    #[error("physical texture {0:?} no longer exists")]
    UnknownBase(BaseTextureId),

    #[error("upload of texture `{key}` failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("texture `{key}` failed to upload earlier; not retried until the device is restored")]
    Failed { key: String },

    #[error("pixels of texture `{key}` were discarded after upload and cannot be restored")]
    SourceDiscarded { key: String },
}
