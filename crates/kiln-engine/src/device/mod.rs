//! GPU device abstraction.
//!
//! The batched renderer talks to a [`GpuDevice`]. Two implementations exist:
//! - [`WgpuDevice`]: wgpu on a window surface or an offscreen target
//! - [`HeadlessDevice`]: in-memory recorder for headless rendering and tests

mod error;
mod gpu;
mod headless;
mod traits;

pub use error::{DeviceError, SurfaceErrorAction};
pub use gpu::{WgpuDevice, WgpuInit};
pub use headless::{DrawRecord, HeadlessControl, HeadlessDevice};
pub use traits::{
    DeviceLimits, DrawCall, FrameStatus, GpuDevice, GpuProgram, GpuTexture, ProgramDevice,
    TextureDevice, TextureUpload,
};
