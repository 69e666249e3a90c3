use std::sync::Arc;

use crate::coords::{Affine, Rect, Vec2};
use crate::paint::{BlendMode, Color};
use crate::texture::{TextureId, TextureView};

use super::{NodeId, SceneError};

/// Textured quad.
///
/// `size` is the untrimmed display size. With a trim rectangle only the trimmed
/// part is drawn, offset inside `size`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub texture: TextureId,
    /// Fraction of `size` placed at the node origin. `(0.5, 0.5)` centers the sprite.
    pub anchor: Vec2,
    pub size: Vec2,
    pub trim: Option<Rect>,
}

impl Sprite {
    pub fn new(texture: TextureId, size: Vec2) -> Self {
        Self {
            texture,
            anchor: Vec2::ZERO,
            size,
            trim: None,
        }
    }

    /// Sprite sized like the view's original frame, trim included.
    pub fn from_view(texture: TextureId, view: &TextureView) -> Self {
        Self {
            texture,
            anchor: Vec2::ZERO,
            size: view.orig(),
            trim: view.trim(),
        }
    }

    pub fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.anchor = anchor;
        self
    }

    /// Local quad corners: TL, TR, BR, BL.
    pub fn local_corners(&self) -> [Vec2; 4] {
        let offset = -self.anchor.scale(self.size);
        let area = match self.trim {
            Some(t) => Rect::from_origin_size(offset + t.origin, t.size),
            None => Rect::from_origin_size(offset, self.size),
        };
        area.corners()
    }

    pub(crate) fn is_drawable(&self) -> bool {
        let visible = self.trim.map_or(self.size, |t| t.size);
        visible.x > 0.0 && visible.y > 0.0
    }
}

/// Pre-tessellated triangles in local space.
///
/// Produced by an external tessellator. `uvs` are in frame space (`[0,1]²` over
/// the texture view) and are required when `texture` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Arc<[Vec2]>,
    pub indices: Arc<[u16]>,
    pub uvs: Option<Arc<[Vec2]>>,
    pub texture: Option<TextureId>,
    /// Fill color, multiplied with the node tint.
    pub color: Color,
}

impl Mesh {
    pub fn solid(vertices: impl Into<Arc<[Vec2]>>, indices: impl Into<Arc<[u16]>>, color: Color) -> Self {
        Self {
            vertices: vertices.into(),
            indices: indices.into(),
            uvs: None,
            texture: None,
            color,
        }
    }

    pub fn textured(
        vertices: impl Into<Arc<[Vec2]>>,
        uvs: impl Into<Arc<[Vec2]>>,
        indices: impl Into<Arc<[u16]>>,
        texture: TextureId,
    ) -> Self {
        Self {
            vertices: vertices.into(),
            indices: indices.into(),
            uvs: Some(uvs.into()),
            texture: Some(texture),
            color: Color::WHITE,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SceneError> {
        if self.indices.len() % 3 != 0 {
            return Err(SceneError::InvalidMesh("index count is not a multiple of 3"));
        }
        if self.indices.iter().any(|&i| i as usize >= self.vertices.len()) {
            return Err(SceneError::InvalidMesh("index out of vertex range"));
        }
        match (&self.uvs, self.texture) {
            (Some(uvs), _) if uvs.len() != self.vertices.len() => {
                Err(SceneError::InvalidMesh("uv count differs from vertex count"))
            }
            (None, Some(_)) => Err(SceneError::InvalidMesh("textured mesh without uvs")),
            _ => Ok(()),
        }
    }

    pub(crate) fn local_bounds(&self) -> Option<Rect> {
        Rect::from_points(self.vertices.iter().copied())
    }
}

/// What a node draws.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeKind {
    /// Groups children; draws nothing itself.
    #[default]
    Container,
    Sprite(Sprite),
    Mesh(Mesh),
}

impl NodeKind {
    pub(crate) fn local_bounds(&self) -> Option<Rect> {
        match self {
            NodeKind::Container => None,
            NodeKind::Sprite(s) => Rect::from_points(s.local_corners()),
            NodeKind::Mesh(m) => m.local_bounds(),
        }
    }

    pub(crate) fn texture(&self) -> Option<TextureId> {
        match self {
            NodeKind::Container => None,
            NodeKind::Sprite(s) => Some(s.texture),
            NodeKind::Mesh(m) => m.texture,
        }
    }
}

/// Local transform: either decomposed fields or an explicit matrix.
///
/// Setting any decomposed field leaves matrix mode.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalTransform {
    pub position: Vec2,
    /// Radians, clockwise on screen.
    pub rotation: f32,
    pub scale: Vec2,
    pub pivot: Vec2,
    pub matrix: Option<Affine>,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            pivot: Vec2::ZERO,
            matrix: None,
        }
    }
}

impl LocalTransform {
    pub fn matrix(&self) -> Affine {
        self.matrix.unwrap_or_else(|| {
            Affine::from_trs(self.position, self.rotation, self.scale, self.pivot)
        })
    }
}

/// One element of the scene tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    pub(crate) local: LocalTransform,
    pub(crate) world: Affine,
    pub(crate) world_alpha: f32,

    pub(crate) alpha: f32,
    pub(crate) visible: bool,
    pub(crate) renderable: bool,
    pub(crate) blend: BlendMode,
    pub(crate) tint: Color,
    pub(crate) kind: NodeKind,

    /// Local transform or alpha changed since the last transform pass.
    pub(crate) dirty: bool,
    /// This node or a descendant is dirty.
    pub(crate) subtree_dirty: bool,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            local: LocalTransform::default(),
            world: Affine::IDENTITY,
            world_alpha: 1.0,
            alpha: 1.0,
            visible: true,
            renderable: true,
            blend: BlendMode::Normal,
            tint: Color::WHITE,
            kind,
            dirty: true,
            subtree_dirty: true,
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn local(&self) -> &LocalTransform {
        &self.local
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn is_renderable(&self) -> bool {
        self.renderable
    }

    #[inline]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    #[inline]
    pub fn tint(&self) -> Color {
        self.tint
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex() -> TextureId {
        TextureId::default()
    }

    #[test]
    fn sprite_corners_follow_anchor() {
        let s = Sprite::new(tex(), Vec2::new(10.0, 20.0)).with_anchor(Vec2::new(0.5, 0.5));
        let c = s.local_corners();
        assert_eq!(c[0], Vec2::new(-5.0, -10.0));
        assert_eq!(c[2], Vec2::new(5.0, 10.0));
    }

    #[test]
    fn trimmed_sprite_draws_only_trim_area() {
        let mut s = Sprite::new(tex(), Vec2::new(10.0, 10.0));
        s.trim = Some(Rect::new(2.0, 3.0, 4.0, 5.0));
        let c = s.local_corners();
        assert_eq!(c[0], Vec2::new(2.0, 3.0));
        assert_eq!(c[2], Vec2::new(6.0, 8.0));
    }

    #[test]
    fn kind_reports_its_texture() {
        let tri = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        assert_eq!(NodeKind::Container.texture(), None);
        assert_eq!(NodeKind::Sprite(Sprite::new(tex(), Vec2::new(1.0, 1.0))).texture(), Some(tex()));
        let solid = Mesh::solid(tri.to_vec(), vec![0u16, 1, 2], Color::WHITE);
        assert_eq!(NodeKind::Mesh(solid).texture(), None);
        let textured = Mesh::textured(tri.to_vec(), tri.to_vec(), vec![0u16, 1, 2], tex());
        assert_eq!(NodeKind::Mesh(textured).texture(), Some(tex()));
    }

    #[test]
    fn mesh_validation() {
        let tri = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        assert!(Mesh::solid(tri.to_vec(), vec![0u16, 1, 2], Color::WHITE).validate().is_ok());
        assert!(Mesh::solid(tri.to_vec(), vec![0u16, 1, 3], Color::WHITE).validate().is_err());
        assert!(Mesh::solid(tri.to_vec(), vec![0u16, 1], Color::WHITE).validate().is_err());
        let mut textured = Mesh::textured(tri.to_vec(), tri.to_vec(), vec![0u16, 1, 2], tex());
        assert!(textured.validate().is_ok());
        textured.uvs = None;
        assert!(textured.validate().is_err());
    }

    #[test]
    fn matrix_mode_overrides_fields() {
        let mut t = LocalTransform {
            position: Vec2::new(5.0, 5.0),
            ..LocalTransform::default()
        };
        assert_eq!(t.matrix(), Affine::translation(5.0, 5.0));
        t.matrix = Some(Affine::scale(2.0, 2.0));
        assert_eq!(t.matrix(), Affine::scale(2.0, 2.0));
    }
}
