use std::sync::Arc;

use crate::paint::Color;

use super::TextureError;

/// What happens to CPU pixels once they reach the GPU.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SourceRetention {
    /// Pixels are kept for the texture's lifetime so a lost device can be refilled.
    #[default]
    Retain,
    /// Pixels are dropped after the first upload. Device-loss recovery then fails
    /// for this texture.
    DiscardAfterUpload,
}

/// Decoded RGBA8 pixels with premultiplied alpha.
///
/// The `key` identifies the image: acquiring two sources with the same key
/// yields handles onto one physical texture. Decoding from files is the
/// caller's concern.
#[derive(Debug, Clone)]
pub struct ImageSource {
    key: Arc<str>,
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
    retention: SourceRetention,
}

impl ImageSource {
    /// Wraps already premultiplied RGBA8 pixels.
    pub fn from_premultiplied(
        key: impl Into<Arc<str>>,
        width: u32,
        height: u32,
        pixels: impl Into<Arc<[u8]>>,
    ) -> Result<Self, TextureError> {
        let key = key.into();
        let pixels = pixels.into();

        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize { key: key.to_string() });
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));
        if expected != Some(pixels.len()) {
            return Err(TextureError::BadPixelData {
                key: key.to_string(),
                width,
                height,
                len: pixels.len(),
                expected: expected.unwrap_or(usize::MAX),
            });
        }

        Ok(Self {
            key,
            width,
            height,
            pixels,
            retention: SourceRetention::Retain,
        })
    }

    /// Premultiplies straight-alpha RGBA8 pixels in place, then wraps them.
    pub fn from_straight_rgba(
        key: impl Into<Arc<str>>,
        width: u32,
        height: u32,
        mut pixels: Vec<u8>,
    ) -> Result<Self, TextureError> {
        for px in pixels.chunks_exact_mut(4) {
            let a = px[3] as u16;
            for c in &mut px[..3] {
                *c = ((*c as u16 * a + 127) / 255) as u8;
            }
        }
        Self::from_premultiplied(key, width, height, pixels)
    }

    /// Single-color image.
    pub fn solid(
        key: impl Into<Arc<str>>,
        width: u32,
        height: u32,
        color: Color,
    ) -> Result<Self, TextureError> {
        let c = color.clamped();
        let texel = [c.r, c.g, c.b, c.a].map(|v| (v * 255.0 + 0.5) as u8);
        let count = (width as usize).saturating_mul(height as usize);
        let pixels: Vec<u8> = texel.iter().copied().cycle().take(count * 4).collect();
        Self::from_premultiplied(key, width, height, pixels)
    }

    pub fn with_retention(mut self, retention: SourceRetention) -> Self {
        self.retention = retention;
        self
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn retention(&self) -> SourceRetention {
        self.retention
    }

    pub(crate) fn shared_pixels(&self) -> Arc<[u8]> {
        Arc::clone(&self.pixels)
    }
}
