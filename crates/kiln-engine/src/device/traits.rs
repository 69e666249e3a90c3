use std::ops::Range;

use crate::batch::Vertex;
use crate::paint::{BlendMode, Color};
use crate::program::{FeatureSignature, ProgramUniforms};

use super::DeviceError;

/// Device-side texture handle. Only meaningful to the device that issued it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GpuTexture(pub u32);

/// Device-side compiled program handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GpuProgram(pub u32);

/// Pixels handed to the device for one physical texture.
#[derive(Debug, Copy, Clone)]
pub struct TextureUpload<'a> {
    pub key: &'a str,
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, `width * height * 4` bytes.
    pub pixels: &'a [u8],
}

/// Static capabilities the batcher and program cache plan around.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Textures one draw call may sample.
    pub max_texture_slots: u8,
    pub max_texture_size: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_slots: 8,
            max_texture_size: 8192,
        }
    }
}

/// Whether a frame could be started.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    Ready,
    /// Transient surface condition; nothing is drawn this frame.
    Skipped,
}

/// One indexed draw over the frame's geometry buffers.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub program: GpuProgram,
    pub blend: BlendMode,
    /// Slot `i` samples `textures[i]`.
    pub textures: &'a [GpuTexture],
    pub indices: Range<u32>,
}

/// Texture storage half of a device.
///
/// The software rasterizer implements only this half.
pub trait TextureDevice {
    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<GpuTexture, DeviceError>;

    fn destroy_texture(&mut self, texture: GpuTexture);
}

/// Program half of a device.
pub trait ProgramDevice {
    fn compile_program(&mut self, signature: FeatureSignature) -> Result<GpuProgram, DeviceError>;

    fn bind_program(&mut self, program: GpuProgram);

    fn set_uniforms(&mut self, program: GpuProgram, uniforms: &ProgramUniforms);
}

/// Hardware backend used by the batched renderer.
///
/// Frames are bracketed by `begin_frame`/`end_frame`; geometry is uploaded
/// once per frame and draws index into it.
pub trait GpuDevice: TextureDevice + ProgramDevice {
    fn limits(&self) -> DeviceLimits;

    /// Drawable size in physical pixels.
    fn surface_size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;

    /// Starts a frame. `clear` of `None` keeps the previous contents.
    fn begin_frame(&mut self, clear: Option<Color>) -> Result<FrameStatus, DeviceError>;

    fn upload_geometry(&mut self, vertices: &[Vertex], indices: &[u32]);

    fn draw(&mut self, call: &DrawCall<'_>);

    /// Submits and presents. `Err(DeviceError::Lost)` when the device went away mid-frame.
    fn end_frame(&mut self) -> Result<(), DeviceError>;

    /// Pending device-lost signal. Stays raised until `restore` succeeds.
    fn poll_device_lost(&mut self) -> bool;

    /// Recreates the device after a loss. Every previously issued handle is invalid afterwards.
    fn restore(&mut self) -> Result<(), DeviceError>;

    fn destroy(&mut self);
}
