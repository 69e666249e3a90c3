use core::ops::Mul;

use super::Vec2;

/// 2D affine transform.
///
/// Maps a point as:
///
/// ```text
/// x' = a·x + c·y + tx
/// y' = b·x + d·y + ty
/// ```
///
/// Composition follows column-vector convention: `(p * c)(v) == p(c(v))`, so a
/// world matrix is `parent_world * local`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Affine {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    #[inline]
    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    #[inline]
    pub const fn translation(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    #[inline]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation in radians. Positive angles turn +X towards +Y (clockwise on screen).
    #[inline]
    pub fn rotation(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Builds `translate(position) · rotate · scale · translate(-pivot)`.
    pub fn from_trs(position: Vec2, rotation: f32, scale: Vec2, pivot: Vec2) -> Self {
        let (sin, cos) = if rotation == 0.0 { (0.0, 1.0) } else { rotation.sin_cos() };
        let a = cos * scale.x;
        let b = sin * scale.x;
        let c = -sin * scale.y;
        let d = cos * scale.y;
        Self {
            a,
            b,
            c,
            d,
            tx: position.x - (pivot.x * a + pivot.y * c),
            ty: position.y - (pivot.x * b + pivot.y * d),
        }
    }

    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        })
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.tx, self.ty]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn approx_eq(&self, other: &Affine, eps: f32) -> bool {
        let lhs = [self.a, self.b, self.c, self.d, self.tx, self.ty];
        let rhs = [other.a, other.b, other.c, other.d, other.tx, other.ty];
        lhs.iter().zip(rhs.iter()).all(|(l, r)| (l - r).abs() <= eps)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Affine {
    type Output = Affine;

    #[inline]
    fn mul(self, r: Affine) -> Affine {
        Affine {
            a: self.a * r.a + self.c * r.b,
            b: self.b * r.a + self.d * r.b,
            c: self.a * r.c + self.c * r.d,
            d: self.b * r.c + self.d * r.d,
            tx: self.a * r.tx + self.c * r.ty + self.tx,
            ty: self.b * r.tx + self.d * r.ty + self.ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPS: f32 = 1e-5;

    #[test]
    fn identity_is_neutral() {
        let m = Affine::from_trs(Vec2::new(3.0, 4.0), 0.3, Vec2::new(2.0, 0.5), Vec2::ZERO);
        assert!((Affine::IDENTITY * m).approx_eq(&m, EPS));
        assert!((m * Affine::IDENTITY).approx_eq(&m, EPS));
    }

    #[test]
    fn composition_applies_right_first() {
        let t = Affine::translation(10.0, 0.0);
        let s = Affine::scale(2.0, 2.0);
        // scale, then translate
        let p = (t * s).transform_point(Vec2::new(1.0, 1.0));
        assert!(p.approx_eq(Vec2::new(12.0, 2.0), EPS));
        // translate, then scale
        let q = (s * t).transform_point(Vec2::new(1.0, 1.0));
        assert!(q.approx_eq(Vec2::new(22.0, 2.0), EPS));
    }

    #[test]
    fn rotation_turns_x_towards_y() {
        let p = Affine::rotation(FRAC_PI_2).transform_point(Vec2::new(1.0, 0.0));
        assert!(p.approx_eq(Vec2::new(0.0, 1.0), EPS));
    }

    #[test]
    fn trs_pivot_stays_at_position() {
        let pivot = Vec2::new(5.0, 5.0);
        let m = Affine::from_trs(Vec2::new(100.0, 50.0), 1.2, Vec2::new(3.0, 0.5), pivot);
        assert!(m.transform_point(pivot).approx_eq(Vec2::new(100.0, 50.0), 1e-4));
    }

    #[test]
    fn trs_matches_explicit_composition() {
        let pos = Vec2::new(7.0, -3.0);
        let pivot = Vec2::new(2.0, 1.0);
        let m = Affine::from_trs(pos, 0.7, Vec2::new(1.5, 2.0), pivot);
        let explicit = Affine::translation(pos.x, pos.y)
            * Affine::rotation(0.7)
            * Affine::scale(1.5, 2.0)
            * Affine::translation(-pivot.x, -pivot.y);
        assert!(m.approx_eq(&explicit, 1e-4));
    }

    #[test]
    fn inverse_round_trips() {
        let m = Affine::from_trs(Vec2::new(12.0, 8.0), -0.4, Vec2::new(2.0, 3.0), Vec2::ZERO);
        let inv = m.inverse().unwrap();
        assert!((m * inv).approx_eq(&Affine::IDENTITY, 1e-4));
        let p = Vec2::new(3.0, -9.0);
        assert!(inv.transform_point(m.transform_point(p)).approx_eq(p, 1e-3));
    }

    #[test]
    fn singular_has_no_inverse() {
        assert!(Affine::scale(0.0, 1.0).inverse().is_none());
    }
}
