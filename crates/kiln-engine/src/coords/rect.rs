use super::{Affine, Vec2};

/// Axis-aligned rectangle in logical pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Smallest rectangle containing every point. `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (lo, hi) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self::from_origin_size(lo, hi - lo))
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Corners in quad winding order: top-left, top-right, bottom-right, bottom-left.
    #[inline]
    pub fn corners(self) -> [Vec2; 4] {
        let lo = self.min();
        let hi = self.max();
        [
            lo,
            Vec2::new(hi.x, lo.y),
            hi,
            Vec2::new(lo.x, hi.y),
        ]
    }

    /// Normalizes the rectangle so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let lo = self.origin.min(self.origin + self.size);
        let hi = self.origin.max(self.origin + self.size);
        Self::from_origin_size(lo, hi - lo)
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        let r = self.normalized();
        p.x >= r.origin.x
            && p.y >= r.origin.y
            && p.x < (r.origin.x + r.size.x)
            && p.y < (r.origin.y + r.size.y)
    }

    /// True when `other` lies entirely inside `self` (edges inclusive).
    #[inline]
    pub fn contains_rect(self, other: Rect) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        b.origin.x >= a.origin.x
            && b.origin.y >= a.origin.y
            && b.max().x <= a.max().x
            && b.max().y <= a.max().y
    }

    #[inline]
    pub fn union(self, other: Rect) -> Rect {
        let a = self.normalized();
        let b = other.normalized();
        let lo = a.min().min(b.min());
        let hi = a.max().max(b.max());
        Rect::from_origin_size(lo, hi - lo)
    }

    /// Axis-aligned bounds of this rectangle after applying `m`.
    #[inline]
    pub fn transformed(self, m: &Affine) -> Rect {
        let [a, b, c, d] = self.corners();
        // Four corners never yield `None`.
        Rect::from_points([a, b, c, d].map(|p| m.transform_point(p))).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h)
    }

    // ── normalized ────────────────────────────────────────────────────────

    #[test]
    fn normalized_negative_extent() {
        let n = r(10.0, 10.0, -4.0, -3.0).normalized();
        assert_eq!(n, r(6.0, 7.0, 4.0, 3.0));
    }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_is_half_open() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Vec2::new(0.0, 0.0)));
        assert!(rect.contains(Vec2::new(5.0, 5.0)));
        assert!(!rect.contains(Vec2::new(10.0, 10.0)));
    }

    #[test]
    fn contains_rect_inclusive_edges() {
        let outer = r(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains_rect(r(0.0, 0.0, 10.0, 10.0)));
        assert!(outer.contains_rect(r(2.0, 2.0, 3.0, 3.0)));
        assert!(!outer.contains_rect(r(8.0, 8.0, 3.0, 3.0)));
    }

    // ── union / from_points ───────────────────────────────────────────────

    #[test]
    fn union_covers_both() {
        let u = r(0.0, 0.0, 5.0, 5.0).union(r(10.0, -2.0, 2.0, 2.0));
        assert_eq!(u, r(0.0, -2.0, 12.0, 7.0));
    }

    #[test]
    fn from_points_bounds() {
        let b = Rect::from_points([
            Vec2::new(3.0, 1.0),
            Vec2::new(-1.0, 4.0),
            Vec2::new(2.0, -2.0),
        ])
        .unwrap();
        assert_eq!(b, r(-1.0, -2.0, 4.0, 6.0));
        assert!(Rect::from_points(std::iter::empty()).is_none());
    }

    // ── transformed ───────────────────────────────────────────────────────

    #[test]
    fn transformed_by_quarter_turn() {
        let m = Affine::rotation(std::f32::consts::FRAC_PI_2);
        let t = r(0.0, 0.0, 10.0, 4.0).transformed(&m);
        assert!(t.origin.approx_eq(Vec2::new(-4.0, 0.0), 1e-4));
        assert!(t.size.approx_eq(Vec2::new(4.0, 10.0), 1e-4));
    }

    #[test]
    fn corners_winding() {
        let c = r(1.0, 2.0, 3.0, 4.0).corners();
        assert_eq!(c[0], Vec2::new(1.0, 2.0));
        assert_eq!(c[1], Vec2::new(4.0, 2.0));
        assert_eq!(c[2], Vec2::new(4.0, 6.0));
        assert_eq!(c[3], Vec2::new(1.0, 6.0));
    }
}
