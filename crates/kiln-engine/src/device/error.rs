use thiserror::Error;

/// Failures reported by a [`GpuDevice`](super::GpuDevice).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),

    #[error("failed to create GPU device: {0}")]
    RequestDevice(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("target {width}x{height} exceeds the device maximum of {max}")]
    TargetTooLarge { width: u32, height: u32, max: u32 },

    #[error("texture upload failed: {0}")]
    Upload(String),

    #[error("shader compilation failed: {0}")]
    Compile(String),

    #[error("device lost")]
    Lost,

    #[error("device restore failed: {0}")]
    Restore(String),

    #[error("device has been destroyed")]
    Destroyed,
}

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM).
    Fatal,
}
