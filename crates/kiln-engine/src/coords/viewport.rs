/// Renderer viewport: logical size plus the device-pixel resolution factor.
///
/// Scene coordinates always live in logical pixels. The physical (device)
/// surface is `logical × resolution`, rounded to whole pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub resolution: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32, resolution: f32) -> Self {
        Self { width, height, resolution }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
            && self.resolution > 0.0
            && self.resolution.is_finite()
    }

    /// Device-pixel size of the backing surface. Never smaller than 1×1.
    #[inline]
    pub fn physical_size(self) -> (u32, u32) {
        let w = (self.width * self.resolution).round().max(1.0) as u32;
        let h = (self.height * self.resolution).round().max(1.0) as u32;
        (w, h)
    }

    /// Returns a copy with a new logical size and the same resolution.
    #[inline]
    pub fn resized(self, width: f32, height: f32) -> Self {
        Self { width, height, ..self }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0, 1.0)
    }
}
