use std::sync::Arc;

use thiserror::Error;
use winit::window::Window;

use crate::coords::Viewport;
use crate::paint::Color;

/// Largest edge a renderer accepts, both logical and in device pixels.
pub const MAX_DIMENSION: u32 = 16384;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("renderer size must be non-zero (got {width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    #[error("renderer size {width}x{height} exceeds the maximum of {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("device output {width}x{height} exceeds the maximum of {max}")]
    OutputTooLarge { width: u32, height: u32, max: u32 },

    #[error("resolution must be finite and positive (got {0})")]
    InvalidResolution(f32),

    #[error("background color must be opaque unless the renderer is transparent")]
    TranslucentBackground,
}

/// Construction options shared by both backends.
#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Clear to transparent instead of the background color.
    pub transparent: bool,
    /// 4x MSAA on hardware, edge anti-aliasing in software.
    pub antialias: bool,
    /// Keep the previous frame's pixels when `clear_before_render` is false.
    pub preserve_drawing_buffer: bool,
    /// Device pixels per logical pixel.
    pub resolution: f32,
    /// Window to present into. Without one, hardware renders offscreen.
    pub view: Option<Arc<Window>>,
    pub force_software: bool,
    pub clear_before_render: bool,
    /// Premultiplied.
    pub background_color: Color,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            transparent: false,
            antialias: false,
            preserve_drawing_buffer: false,
            resolution: 1.0,
            view: None,
            force_software: false,
            clear_before_render: true,
            background_color: Color::BLACK,
        }
    }
}

impl RendererOptions {
    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_view(mut self, window: Arc<Window>) -> Self {
        self.view = Some(window);
        self
    }

    pub fn validate(&self, width: u32, height: u32) -> Result<(), ConfigError> {
        validate_resolution(self.resolution)?;
        validate_size(width, height, self.resolution)?;
        if !self.transparent && !self.background_color.is_opaque() {
            return Err(ConfigError::TranslucentBackground);
        }
        Ok(())
    }

    /// Color a frame starts from. `None` keeps the previous frame.
    pub(crate) fn clear_color(&self) -> Option<Color> {
        match (self.clear_before_render, self.transparent) {
            (false, _) => None,
            (true, true) => Some(Color::TRANSPARENT),
            (true, false) => Some(self.background_color),
        }
    }
}

pub(crate) fn validate_resolution(resolution: f32) -> Result<(), ConfigError> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(ConfigError::InvalidResolution(resolution));
    }
    Ok(())
}

/// Checks a logical size and the device output it produces at `resolution`.
pub(crate) fn validate_size(width: u32, height: u32, resolution: f32) -> Result<Viewport, ConfigError> {
    if width == 0 || height == 0 {
        return Err(ConfigError::ZeroSize { width, height });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ConfigError::TooLarge {
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    let viewport = Viewport::new(width as f32, height as f32, resolution);
    validate_output(viewport, MAX_DIMENSION)?;
    Ok(viewport)
}

/// Fails when the device-pixel size of `viewport` has an edge above `max`.
pub(crate) fn validate_output(viewport: Viewport, max: u32) -> Result<(), ConfigError> {
    let (width, height) = viewport.physical_size();
    if width > max || height > max {
        return Err(ConfigError::OutputTooLarge { width, height, max });
    }
    Ok(())
}
