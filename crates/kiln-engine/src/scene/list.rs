use std::sync::Arc;

use crate::coords::Vec2;
use crate::paint::{BlendMode, Color};
use crate::program::ShaderFeatures;
use crate::texture::TextureId;

use super::NodeId;

/// World-space geometry of one primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Sprite corners: TL, TR, BR, BL.
    Quad { corners: [Vec2; 4] },
    /// Transformed mesh vertices. `uvs` are in frame space.
    Mesh {
        positions: Vec<Vec2>,
        uvs: Option<Arc<[Vec2]>>,
        indices: Arc<[u16]>,
    },
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Quad { .. } => 4,
            Geometry::Mesh { positions, .. } => positions.len(),
        }
    }

    pub fn index_count(&self) -> usize {
        match self {
            Geometry::Quad { .. } => 6,
            Geometry::Mesh { indices, .. } => indices.len(),
        }
    }
}

/// Render-ready flattened node. Rebuilt every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPrimitive {
    pub node: NodeId,
    pub geometry: Geometry,
    pub texture: Option<TextureId>,
    pub blend: BlendMode,
    /// Premultiplied, world alpha included.
    pub tint: Color,
    pub features: ShaderFeatures,
}

/// Paint-ordered primitives of one frame.
///
/// `clear()` keeps allocated capacity, so a warmed list does not allocate
/// per frame (mesh positions aside).
#[derive(Debug, Default)]
pub struct DrawList {
    items: Vec<DrawPrimitive>,
}

impl DrawList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[inline]
    pub fn push(&mut self, primitive: DrawPrimitive) {
        self.items.push(primitive);
    }

    /// Items in paint order (back to front).
    #[inline]
    pub fn items(&self) -> &[DrawPrimitive] {
        &self.items
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, DrawPrimitive> {
        self.items.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a DrawList {
    type Item = &'a DrawPrimitive;
    type IntoIter = std::slice::Iter<'a, DrawPrimitive>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
