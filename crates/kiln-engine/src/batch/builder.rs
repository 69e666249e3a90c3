use std::ops::Range;

use crate::coords::Vec2;
use crate::paint::BlendMode;
use crate::program::{FeatureSignature, ShaderFeatures};
use crate::scene::{DrawList, DrawPrimitive, Geometry};
use crate::texture::{BaseTextureId, ResourceManager, TextureId, TextureView};

use super::vertex::{Vertex, QUAD_INDICES};

/// One draw call worth of primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Run of draw-list indices. Skipped primitives inside the run are listed in
    /// [`BatchSet::skipped`].
    pub primitives: Range<usize>,
    pub blend: BlendMode,
    pub features: ShaderFeatures,
    /// Slot `i` samples `textures[i]`.
    pub textures: Vec<BaseTextureId>,
    pub vertices: Range<u32>,
    pub indices: Range<u32>,
}

impl Batch {
    pub fn signature(&self) -> FeatureSignature {
        FeatureSignature::new(self.features, self.textures.len() as u8)
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.end - self.indices.start
    }

    fn open(first: usize, primitive: &DrawPrimitive, vertex: u32, index: u32) -> Self {
        Self {
            primitives: first..first,
            blend: primitive.blend,
            features: primitive.features,
            textures: Vec::new(),
            vertices: vertex..vertex,
            indices: index..index,
        }
    }

    fn accepts(&self, primitive: &DrawPrimitive, base: Option<BaseTextureId>, max_slots: usize) -> bool {
        if self.blend != primitive.blend || self.features != primitive.features {
            return false;
        }
        match base {
            None => true,
            Some(base) => self.textures.contains(&base) || self.textures.len() < max_slots,
        }
    }

    fn slot_for(&mut self, base: BaseTextureId) -> u32 {
        match self.textures.iter().position(|&t| t == base) {
            Some(slot) => slot as u32,
            None => {
                self.textures.push(base);
                (self.textures.len() - 1) as u32
            }
        }
    }
}

/// Output of one [`BatchBuilder::build`] call.
///
/// All batches index into the same frame-wide vertex and index buffers.
#[derive(Debug, Default)]
pub struct BatchSet {
    pub batches: Vec<Batch>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Primitives dropped because their texture handle is unknown.
    pub skipped: Vec<(usize, TextureId)>,
}

impl BatchSet {
    fn clear(&mut self) {
        self.batches.clear();
        self.vertices.clear();
        self.indices.clear();
        self.skipped.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Batch> {
        self.batches.iter()
    }
}

/// Greedy, order-preserving batcher.
///
/// A primitive joins the open batch when blend mode and shader features match
/// and its physical texture already owns a slot or a slot is still free.
/// Otherwise the batch is closed and a new one starts with an empty slot table.
/// Storage is reused between frames.
#[derive(Debug)]
pub struct BatchBuilder {
    max_texture_slots: u8,
    set: BatchSet,
}

impl BatchBuilder {
    pub fn new(max_texture_slots: u8) -> Self {
        Self {
            max_texture_slots: max_texture_slots.max(1),
            set: BatchSet::default(),
        }
    }

    #[inline]
    pub fn max_texture_slots(&self) -> u8 {
        self.max_texture_slots
    }

    pub fn set_max_texture_slots(&mut self, slots: u8) {
        self.max_texture_slots = slots.max(1);
    }

    /// Result of the last build.
    #[inline]
    pub fn batches(&self) -> &BatchSet {
        &self.set
    }

    pub fn build(&mut self, list: &DrawList, textures: &ResourceManager) -> &BatchSet {
        self.set.clear();
        let max_slots = self.max_texture_slots as usize;
        let mut open: Option<Batch> = None;

        for (i, primitive) in list.iter().enumerate() {
            let view = match primitive.texture {
                None => None,
                Some(id) => match textures.view(id) {
                    Some(view) => Some(view),
                    None => {
                        log::debug!("primitive {i}: unknown texture {id:?}, skipped");
                        self.set.skipped.push((i, id));
                        continue;
                    }
                },
            };
            let base = view.map(TextureView::base);

            let joins = open
                .as_ref()
                .is_some_and(|b| b.accepts(primitive, base, max_slots));
            if !joins {
                if let Some(done) = open.take() {
                    self.set.batches.push(done);
                }
                open = Some(Batch::open(
                    i,
                    primitive,
                    self.set.vertices.len() as u32,
                    self.set.indices.len() as u32,
                ));
            }
            let Some(batch) = open.as_mut() else { continue };

            let slot = base.map_or(0, |b| batch.slot_for(b));
            emit(&mut self.set, primitive, view, slot);

            batch.primitives.end = i + 1;
            batch.vertices.end = self.set.vertices.len() as u32;
            batch.indices.end = self.set.indices.len() as u32;
        }

        if let Some(done) = open {
            self.set.batches.push(done);
        }

        log::trace!(
            "batched {} primitives into {} batches ({} skipped)",
            list.len(),
            self.set.batches.len(),
            self.set.skipped.len()
        );
        &self.set
    }
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new(crate::device::DeviceLimits::default().max_texture_slots)
    }
}

fn emit(set: &mut BatchSet, primitive: &DrawPrimitive, view: Option<&TextureView>, slot: u32) {
    let base = set.vertices.len() as u32;
    let color = primitive.tint.to_array();
    let vertex = |position: Vec2, uv: Vec2| Vertex {
        position: position.to_array(),
        uv: uv.to_array(),
        color,
        slot,
    };

    match &primitive.geometry {
        Geometry::Quad { corners } => {
            let uvs = view.map_or([Vec2::ZERO; 4], TextureView::uvs);
            set.vertices
                .extend(corners.iter().zip(uvs).map(|(&p, uv)| vertex(p, uv)));
            set.indices.extend(QUAD_INDICES.iter().map(|&i| base + i));
        }
        Geometry::Mesh {
            positions,
            uvs,
            indices,
        } => {
            set.vertices.extend(positions.iter().enumerate().map(|(k, &p)| {
                let uv = match (view, uvs) {
                    (Some(view), Some(uvs)) => view.map_uv(uvs.get(k).copied().unwrap_or(Vec2::ZERO)),
                    _ => Vec2::ZERO,
                };
                vertex(p, uv)
            }));
            set.indices.extend(indices.iter().map(|&i| base + i as u32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Rect;
    use crate::paint::Color;
    use crate::scene::NodeId;
    use crate::texture::{ImageSource, TextureFrame};
    use std::sync::Arc;

    fn source(key: &str) -> ImageSource {
        ImageSource::solid(key, 4, 4, Color::WHITE).unwrap()
    }

    fn quad(texture: TextureId, blend: BlendMode) -> DrawPrimitive {
        DrawPrimitive {
            node: NodeId::default(),
            geometry: Geometry::Quad {
                corners: Rect::new(0.0, 0.0, 4.0, 4.0).corners(),
            },
            texture: Some(texture),
            blend,
            tint: Color::WHITE,
            features: ShaderFeatures::TEXTURED,
        }
    }

    fn list(items: impl IntoIterator<Item = DrawPrimitive>) -> DrawList {
        let mut list = DrawList::new();
        for p in items {
            list.push(p);
        }
        list
    }

    // ── grouping ──────────────────────────────────────────────────────────

    #[test]
    fn empty_list_yields_no_batches() {
        let rm = ResourceManager::new();
        let mut b = BatchBuilder::new(4);
        let set = b.build(&DrawList::new(), &rm);
        assert!(set.is_empty());
        assert!(set.vertices.is_empty());
    }

    #[test]
    fn compatible_primitives_form_one_batch() {
        let mut rm = ResourceManager::new();
        let t = rm.acquire(&source("a"));
        let mut b = BatchBuilder::new(4);
        let set = b.build(&list([quad(t, BlendMode::Normal), quad(t, BlendMode::Normal)]), &rm);

        assert_eq!(set.len(), 1);
        let batch = &set.batches[0];
        assert_eq!(batch.primitives, 0..2);
        assert_eq!(batch.textures.len(), 1);
        assert_eq!(batch.vertices, 0..8);
        assert_eq!(batch.indices, 0..12);
        assert_eq!(&set.indices[6..], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn blend_change_forces_boundary() {
        let mut rm = ResourceManager::new();
        let t = rm.acquire(&source("a"));
        let mut b = BatchBuilder::new(4);
        let modes = [
            BlendMode::Normal,
            BlendMode::Add,
            BlendMode::Multiply,
            BlendMode::Screen,
        ];
        let set = b.build(&list(modes.map(|m| quad(t, m))), &rm);
        assert_eq!(set.len(), 4);
        for (batch, mode) in set.iter().zip(modes) {
            assert_eq!(batch.blend, mode);
        }
    }

    #[test]
    fn feature_change_forces_boundary() {
        let mut rm = ResourceManager::new();
        let t = rm.acquire(&source("a"));
        let mut tinted = quad(t, BlendMode::Normal);
        tinted.features = ShaderFeatures::TEXTURED | ShaderFeatures::TINTED;
        let mut b = BatchBuilder::new(4);
        let set = b.build(&list([quad(t, BlendMode::Normal), tinted]), &rm);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn slot_limit_splits_batches() {
        let mut rm = ResourceManager::new();
        let ids: Vec<TextureId> = ["a", "b", "c"].iter().map(|k| rm.acquire(&source(k))).collect();
        let mut b = BatchBuilder::new(2);
        let set = b.build(&list(ids.iter().map(|&t| quad(t, BlendMode::Normal))), &rm);

        assert_eq!(set.len(), 2);
        assert_eq!(set.batches[0].textures.len(), 2);
        assert_eq!(set.batches[1].textures.len(), 1);
        // new batch starts with an empty slot table
        assert!(set.vertices[8..12].iter().all(|v| v.slot == 0));
        assert!(set.vertices[4..8].iter().all(|v| v.slot == 1));
    }

    #[test]
    fn atlas_frames_share_a_slot() {
        let mut rm = ResourceManager::new();
        let src = source("atlas");
        let left = rm
            .acquire_frame(&src, TextureFrame::new(Rect::new(0.0, 0.0, 2.0, 4.0)))
            .unwrap();
        let right = rm
            .acquire_frame(&src, TextureFrame::new(Rect::new(2.0, 0.0, 2.0, 4.0)))
            .unwrap();
        let mut b = BatchBuilder::new(1);
        let set = b.build(
            &list([quad(left, BlendMode::Normal), quad(right, BlendMode::Normal)]),
            &rm,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.vertices[0].uv, [0.0, 0.0]);
        assert_eq!(set.vertices[4].uv, [0.5, 0.0]);
        assert_eq!(set.vertices[6].uv, [1.0, 1.0]);
    }

    #[test]
    fn batches_preserve_input_order() {
        let mut rm = ResourceManager::new();
        let t = rm.acquire(&source("a"));
        let u = rm.acquire(&source("b"));
        let items = [
            quad(t, BlendMode::Normal),
            quad(u, BlendMode::Normal),
            quad(t, BlendMode::Add),
            quad(t, BlendMode::Normal),
            quad(u, BlendMode::Screen),
        ];
        let mut b = BatchBuilder::new(1);
        let set = b.build(&list(items), &rm);

        let order: Vec<usize> = set.iter().flat_map(|b| b.primitives.clone()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        let mut cursor = 0;
        for batch in set.iter() {
            assert_eq!(batch.indices.start, cursor);
            cursor = batch.indices.end;
        }
        assert_eq!(cursor as usize, set.indices.len());
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn mesh_uvs_are_mapped_into_the_frame() {
        let mut rm = ResourceManager::new();
        let t = rm
            .acquire_frame(&source("a"), TextureFrame::new(Rect::new(2.0, 2.0, 2.0, 2.0)))
            .unwrap();
        let mesh = DrawPrimitive {
            node: NodeId::default(),
            geometry: Geometry::Mesh {
                positions: vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
                uvs: Some(Arc::from(vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)])),
                indices: Arc::from(vec![0u16, 1, 2]),
            },
            texture: Some(t),
            blend: BlendMode::Normal,
            tint: Color::WHITE,
            features: ShaderFeatures::TEXTURED,
        };
        let mut b = BatchBuilder::new(4);
        let set = b.build(&list([quad(t, BlendMode::Normal), mesh]), &rm);

        assert_eq!(set.len(), 1);
        assert_eq!(set.vertices[4].uv, [0.5, 0.5]);
        assert_eq!(set.vertices[5].uv, [1.0, 0.5]);
        assert_eq!(set.vertices[6].uv, [0.5, 1.0]);
        assert_eq!(&set.indices[6..], &[4, 5, 6]);
    }

    #[test]
    fn untextured_mesh_uses_tint_only() {
        let rm = ResourceManager::new();
        let tint = Color::from_premul(0.5, 0.0, 0.0, 0.5);
        let mesh = DrawPrimitive {
            node: NodeId::default(),
            geometry: Geometry::Mesh {
                positions: vec![Vec2::ZERO; 3],
                uvs: None,
                indices: Arc::from(vec![0u16, 1, 2]),
            },
            texture: None,
            blend: BlendMode::Normal,
            tint,
            features: ShaderFeatures::TINTED,
        };
        let mut b = BatchBuilder::new(4);
        let set = b.build(&list([mesh]), &rm);
        assert_eq!(set.batches[0].signature().texture_slots, 0);
        assert!(set.vertices.iter().all(|v| v.color == tint.to_array()));
    }

    #[test]
    fn unknown_texture_is_skipped_and_reported() {
        let mut rm = ResourceManager::new();
        let t = rm.acquire(&source("a"));
        let mut other = ResourceManager::new();
        other.acquire(&source("x"));
        let stale = other.acquire(&source("y"));

        let mut b = BatchBuilder::new(4);
        let set = b.build(
            &list([quad(t, BlendMode::Normal), quad(stale, BlendMode::Normal)]),
            &rm,
        );
        assert_eq!(set.skipped, vec![(1, stale)]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.vertices.len(), 4);
    }

    #[test]
    fn storage_is_reused_between_builds() {
        let mut rm = ResourceManager::new();
        let t = rm.acquire(&source("a"));
        let mut b = BatchBuilder::new(4);
        b.build(&list([quad(t, BlendMode::Normal), quad(t, BlendMode::Normal)]), &rm);
        let set = b.build(&list([quad(t, BlendMode::Add)]), &rm);
        assert_eq!(set.len(), 1);
        assert_eq!(set.vertices.len(), 4);
        assert_eq!(set.batches[0].blend, BlendMode::Add);
    }
}
