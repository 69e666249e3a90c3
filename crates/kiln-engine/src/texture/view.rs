use crate::coords::{Rect, Vec2};

use super::BaseTextureId;

/// Sub-rectangle request for a logical texture (an atlas frame).
///
/// `frame` is in source pixels. When `rotated` is set, the frame content is
/// stored turned 90° clockwise in the source, so the displayed size is the
/// frame size with width and height swapped.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureFrame {
    pub frame: Rect,
    /// Untrimmed display size. Defaults to the displayed frame size.
    pub orig: Option<Vec2>,
    /// Where the frame sits inside `orig` after transparent borders were cut.
    pub trim: Option<Rect>,
    pub rotated: bool,
}

impl TextureFrame {
    pub fn new(frame: Rect) -> Self {
        Self {
            frame,
            orig: None,
            trim: None,
            rotated: false,
        }
    }

    pub fn with_trim(mut self, orig: Vec2, trim: Rect) -> Self {
        self.orig = Some(orig);
        self.trim = Some(trim);
        self
    }

    pub fn rotated(mut self) -> Self {
        self.rotated = true;
        self
    }

    /// Displayed size of the frame content.
    #[inline]
    pub fn display_size(&self) -> Vec2 {
        if self.rotated {
            Vec2::new(self.frame.size.y, self.frame.size.x)
        } else {
            self.frame.size
        }
    }

    /// True when the frame lies in `[0, width] x [0, height]` and its trim
    /// fits inside the original size.
    pub(crate) fn fits(&self, width: u32, height: u32) -> bool {
        let f = self.frame;
        let in_source = f.is_finite()
            && !f.is_empty()
            && f.origin.x >= 0.0
            && f.origin.y >= 0.0
            && f.max().x <= width as f32
            && f.max().y <= height as f32;

        let orig = self.orig.unwrap_or_else(|| self.display_size());
        let trim_ok = match self.trim {
            None => true,
            Some(t) => Rect::from_origin_size(Vec2::ZERO, orig).contains_rect(t),
        };

        in_source && trim_ok
    }
}

/// Value-type view onto one physical texture.
///
/// Many views may share a physical texture; the resource manager counts them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureView {
    base: BaseTextureId,
    frame: Rect,
    orig: Vec2,
    trim: Option<Rect>,
    rotated: bool,
    /// Normalized UVs of the displayed corners: TL, TR, BR, BL.
    uvs: [Vec2; 4],
}

impl TextureView {
    pub(crate) fn new(base: BaseTextureId, frame: TextureFrame, width: u32, height: u32) -> Self {
        let orig = frame.orig.unwrap_or_else(|| frame.display_size());
        Self {
            base,
            frame: frame.frame,
            orig,
            trim: frame.trim,
            rotated: frame.rotated,
            uvs: compute_uvs(frame.frame, frame.rotated, width as f32, height as f32),
        }
    }

    #[inline]
    pub fn base(&self) -> BaseTextureId {
        self.base
    }

    #[inline]
    pub fn frame(&self) -> Rect {
        self.frame
    }

    #[inline]
    pub fn orig(&self) -> Vec2 {
        self.orig
    }

    #[inline]
    pub fn trim(&self) -> Option<Rect> {
        self.trim
    }

    #[inline]
    pub fn is_rotated(&self) -> bool {
        self.rotated
    }

    #[inline]
    pub fn uvs(&self) -> [Vec2; 4] {
        self.uvs
    }

    /// Maps a UV in frame space (`[0,1]²` over the displayed frame) into the
    /// physical texture.
    #[inline]
    pub fn map_uv(&self, uv: Vec2) -> Vec2 {
        let [tl, tr, _, bl] = self.uvs;
        tl + (tr - tl) * uv.x + (bl - tl) * uv.y
    }
}

fn compute_uvs(frame: Rect, rotated: bool, tw: f32, th: f32) -> [Vec2; 4] {
    let x0 = frame.origin.x / tw;
    let y0 = frame.origin.y / th;
    let x1 = frame.max().x / tw;
    let y1 = frame.max().y / th;

    if rotated {
        // Content turned clockwise: displayed TL sits at the source top-right.
        [
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
            Vec2::new(x0, y0),
        ]
    } else {
        [
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseTextureId {
        BaseTextureId::default()
    }

    #[test]
    fn full_frame_uvs_cover_unit_square() {
        let v = TextureView::new(base(), TextureFrame::new(Rect::new(0.0, 0.0, 64.0, 32.0)), 64, 32);
        assert_eq!(
            v.uvs(),
            [
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0)
            ]
        );
        assert_eq!(v.orig(), Vec2::new(64.0, 32.0));
    }

    #[test]
    fn sub_frame_uvs() {
        let v = TextureView::new(base(), TextureFrame::new(Rect::new(16.0, 0.0, 16.0, 16.0)), 64, 32);
        assert_eq!(v.uvs()[0], Vec2::new(0.25, 0.0));
        assert_eq!(v.uvs()[2], Vec2::new(0.5, 0.5));
    }

    #[test]
    fn rotated_frame_swaps_display_size_and_turns_uvs() {
        let f = TextureFrame::new(Rect::new(0.0, 0.0, 10.0, 20.0)).rotated();
        assert_eq!(f.display_size(), Vec2::new(20.0, 10.0));
        let v = TextureView::new(base(), f, 10, 20);
        assert_eq!(v.uvs()[0], Vec2::new(1.0, 0.0));
        assert_eq!(v.uvs()[3], Vec2::new(0.0, 0.0));
        // frame-space center maps to the source center either way
        assert!(v.map_uv(Vec2::new(0.5, 0.5)).approx_eq(Vec2::new(0.5, 0.5), 1e-6));
    }

    #[test]
    fn fits_checks_source_and_trim() {
        assert!(TextureFrame::new(Rect::new(0.0, 0.0, 8.0, 8.0)).fits(8, 8));
        assert!(!TextureFrame::new(Rect::new(4.0, 0.0, 8.0, 8.0)).fits(8, 8));
        let trimmed = TextureFrame::new(Rect::new(0.0, 0.0, 8.0, 8.0))
            .with_trim(Vec2::new(12.0, 12.0), Rect::new(2.0, 2.0, 8.0, 8.0));
        assert!(trimmed.fits(8, 8));
        let bad_trim = TextureFrame::new(Rect::new(0.0, 0.0, 8.0, 8.0))
            .with_trim(Vec2::new(8.0, 8.0), Rect::new(2.0, 2.0, 8.0, 8.0));
        assert!(!bad_trim.fits(8, 8));
    }
}
