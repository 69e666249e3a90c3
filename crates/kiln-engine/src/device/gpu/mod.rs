//! wgpu implementation of [`GpuDevice`](super::GpuDevice).
//!
//! - creates the wgpu Instance/Adapter/Device/Queue
//! - configures the window surface, or an offscreen target without a window
//! - compiles one pipeline per blend mode for every program signature
//! - records draws and replays them in a single render pass per frame

mod context;
mod device;
mod init;
mod shader;
mod surface;

pub use device::WgpuDevice;
pub use init::WgpuInit;
