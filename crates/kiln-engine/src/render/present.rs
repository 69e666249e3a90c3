use std::num::NonZeroU32;
use std::sync::Arc;

use softbuffer::{Context, Surface};
use tiny_skia::{Pixmap, PremultipliedColorU8};
use winit::window::Window;

use crate::device::DeviceError;

/// Copies software frames into a window through a `softbuffer` surface.
pub(super) struct WindowPresenter {
    window: Arc<Window>,
    surface: Surface<Arc<Window>, Arc<Window>>,
    size: (u32, u32),
}

impl WindowPresenter {
    pub fn new(window: Arc<Window>) -> Result<Self, DeviceError> {
        let context = Context::new(Arc::clone(&window)).map_err(surface_error)?;
        let surface = Surface::new(&context, Arc::clone(&window)).map_err(surface_error)?;
        Ok(Self {
            window,
            surface,
            size: (0, 0),
        })
    }

    /// Presents `pixmap`, sizing the window buffer to it first.
    pub fn present(&mut self, pixmap: &Pixmap) -> Result<(), DeviceError> {
        let size = (pixmap.width(), pixmap.height());
        let (Some(width), Some(height)) = (NonZeroU32::new(size.0), NonZeroU32::new(size.1)) else {
            return Ok(());
        };
        if self.size != size {
            self.surface.resize(width, height).map_err(surface_error)?;
            self.size = size;
        }

        let mut buffer = self.surface.buffer_mut().map_err(surface_error)?;
        for (dst, px) in buffer.iter_mut().zip(pixmap.pixels()) {
            *dst = xrgb(*px);
        }
        self.window.pre_present_notify();
        buffer.present().map_err(surface_error)
    }
}

/// Packs a premultiplied pixel as `0x00RRGGBB`, i.e. composited over black.
fn xrgb(px: PremultipliedColorU8) -> u32 {
    ((px.red() as u32) << 16) | ((px.green() as u32) << 8) | px.blue() as u32
}

fn surface_error(e: softbuffer::SoftBufferError) -> DeviceError {
    DeviceError::Surface(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_pack_over_black() {
        let opaque = PremultipliedColorU8::from_rgba(0x12, 0x34, 0x56, 0xff).unwrap();
        assert_eq!(xrgb(opaque), 0x0012_3456);

        let half = PremultipliedColorU8::from_rgba(0x40, 0, 0x20, 0x80).unwrap();
        assert_eq!(xrgb(half), 0x0040_0020);
        assert_eq!(xrgb(PremultipliedColorU8::TRANSPARENT), 0);
    }
}
