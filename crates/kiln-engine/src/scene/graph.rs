use slotmap::SlotMap;

use crate::coords::{Affine, Rect, Vec2};
use crate::paint::{BlendMode, Color};
use crate::program::ShaderFeatures;

use super::{
    DrawList, DrawPrimitive, Geometry, Mesh, Node, NodeId, NodeKind, SceneError, Sprite,
};

/// Work done by one transform pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub visited: usize,
    pub recomputed: usize,
}

/// Arena-backed node tree.
///
/// The graph owns every node; parents hold child ids and children a
/// non-owning parent id. World transforms are recomputed lazily by
/// [`compute_world_transforms`](Self::compute_world_transforms): every mutation
/// marks the node dirty and raises `subtree_dirty` on its ancestors, so a pass
/// only descends into subtrees that changed.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    stack: Vec<(NodeId, bool)>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── creation ──────────────────────────────────────────────────────────

    pub fn create(&mut self, kind: NodeKind) -> Result<NodeId, SceneError> {
        if let NodeKind::Mesh(mesh) = &kind {
            mesh.validate()?;
        }
        Ok(self.nodes.insert(Node::new(kind)))
    }

    pub fn create_container(&mut self) -> NodeId {
        self.nodes.insert(Node::new(NodeKind::Container))
    }

    pub fn create_sprite(&mut self, sprite: Sprite) -> NodeId {
        self.nodes.insert(Node::new(NodeKind::Sprite(sprite)))
    }

    pub fn create_mesh(&mut self, mesh: Mesh) -> Result<NodeId, SceneError> {
        self.create(NodeKind::Mesh(mesh))
    }

    /// Removes `id` and its whole subtree. Returns the number of nodes removed.
    pub fn destroy(&mut self, id: NodeId) -> Result<usize, SceneError> {
        let parent = self.get(id)?.parent;
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }

        let mut removed = 0;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                pending.extend(node.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ── hierarchy ─────────────────────────────────────────────────────────

    /// Appends `child` to `parent`, detaching it from its previous parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.attach(parent, child, None)
    }

    /// Inserts `child` at `index` in `parent`'s child list.
    pub fn add_child_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
    ) -> Result<(), SceneError> {
        self.attach(parent, child, Some(index))
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.get(parent)?;
        if self.get(child)?.parent != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }
        self.detach(child);
        self.mark_dirty(child);
        Ok(())
    }

    fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: Option<usize>,
    ) -> Result<(), SceneError> {
        self.get(child)?;
        let siblings = self.get(parent)?.children.len();

        if parent == child || self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }

        let already_child = self.nodes.get(child).and_then(|c| c.parent) == Some(parent);
        let len = siblings - already_child as usize;
        let index = index.unwrap_or(len);
        if index > len {
            return Err(SceneError::IndexOutOfBounds { index, len });
        }

        self.detach(child);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.insert(index, child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        self.mark_dirty(child);
        Ok(())
    }

    fn detach(&mut self, child: NodeId) {
        let Some(old) = self.nodes.get_mut(child).and_then(|c| c.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(old) {
            p.children.retain(|&c| c != child);
        }
    }

    /// True when `ancestor` lies on the parent chain of `node` (exclusive).
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.get(id)?.children)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.get(id)?.parent)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ── mutation ──────────────────────────────────────────────────────────

    pub fn set_position(&mut self, id: NodeId, position: Vec2) -> Result<(), SceneError> {
        self.update_local(id, |n| n.local.position = position)
    }

    pub fn set_rotation(&mut self, id: NodeId, radians: f32) -> Result<(), SceneError> {
        self.update_local(id, |n| n.local.rotation = radians)
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec2) -> Result<(), SceneError> {
        self.update_local(id, |n| n.local.scale = scale)
    }

    pub fn set_pivot(&mut self, id: NodeId, pivot: Vec2) -> Result<(), SceneError> {
        self.update_local(id, |n| n.local.pivot = pivot)
    }

    /// Replaces the decomposed transform with an explicit matrix.
    pub fn set_local_matrix(&mut self, id: NodeId, matrix: Affine) -> Result<(), SceneError> {
        self.get_mut(id)?.local.matrix = Some(matrix);
        self.mark_dirty(id);
        Ok(())
    }

    pub fn set_alpha(&mut self, id: NodeId, alpha: f32) -> Result<(), SceneError> {
        self.get_mut(id)?.alpha = alpha.clamp(0.0, 1.0);
        self.mark_dirty(id);
        Ok(())
    }

    /// Invisible nodes and their subtrees are not drawn. Transforms still update.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), SceneError> {
        self.get_mut(id)?.visible = visible;
        Ok(())
    }

    /// A non-renderable node is skipped itself; its children are still drawn.
    pub fn set_renderable(&mut self, id: NodeId, renderable: bool) -> Result<(), SceneError> {
        self.get_mut(id)?.renderable = renderable;
        Ok(())
    }

    pub fn set_blend_mode(&mut self, id: NodeId, blend: BlendMode) -> Result<(), SceneError> {
        self.get_mut(id)?.blend = blend;
        Ok(())
    }

    pub fn set_tint(&mut self, id: NodeId, tint: Color) -> Result<(), SceneError> {
        self.get_mut(id)?.tint = tint.clamped();
        Ok(())
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) -> Result<(), SceneError> {
        if let NodeKind::Mesh(mesh) = &kind {
            mesh.validate()?;
        }
        self.get_mut(id)?.kind = kind;
        Ok(())
    }

    fn update_local(&mut self, id: NodeId, f: impl FnOnce(&mut Node)) -> Result<(), SceneError> {
        let node = self.get_mut(id)?;
        f(node);
        node.local.matrix = None;
        self.mark_dirty(id);
        Ok(())
    }

    fn mark_dirty(&mut self, id: NodeId) {
        let mut cursor = match self.nodes.get_mut(id) {
            Some(node) => {
                node.dirty = true;
                node.subtree_dirty = true;
                node.parent
            }
            None => return,
        };

        // Stops at the first ancestor already marked; its own chain is marked.
        while let Some(pid) = cursor {
            let Some(p) = self.nodes.get_mut(pid) else { break };
            if p.subtree_dirty {
                break;
            }
            p.subtree_dirty = true;
            cursor = p.parent;
        }
    }

    // ── transforms ────────────────────────────────────────────────────────

    /// Recomputes world transforms and world alpha below `root`.
    ///
    /// A node is recomputed when it or an ancestor inside the pass is dirty.
    /// Subtrees without changes are not entered. The world of `root`'s parent is
    /// taken as it currently is.
    pub fn compute_world_transforms(&mut self, root: NodeId) -> Result<TransformStats, SceneError> {
        self.get(root)?;

        let mut stats = TransformStats::default();
        let mut stack = std::mem::take(&mut self.stack);
        stack.clear();
        stack.push((root, false));

        while let Some((id, forced)) = stack.pop() {
            let Some(parent) = self.nodes.get(id).map(|n| n.parent) else {
                continue;
            };
            let (parent_world, parent_alpha) = parent
                .and_then(|p| self.nodes.get(p))
                .map(|p| (p.world, p.world_alpha))
                .unwrap_or((Affine::IDENTITY, 1.0));

            let Some(node) = self.nodes.get_mut(id) else { continue };
            stats.visited += 1;

            let recompute = forced || node.dirty;
            if recompute {
                node.world = parent_world * node.local.matrix();
                node.world_alpha = parent_alpha * node.alpha;
                node.dirty = false;
                stats.recomputed += 1;
            }
            let descend = recompute || node.subtree_dirty;
            node.subtree_dirty = false;

            if !descend {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                for &child in node.children.iter().rev() {
                    let wanted =
                        recompute || self.nodes.get(child).is_some_and(|c| c.subtree_dirty);
                    if wanted {
                        stack.push((child, recompute));
                    }
                }
            }
        }

        self.stack = stack;
        log::trace!(
            "transform pass: visited {} recomputed {}",
            stats.visited,
            stats.recomputed
        );
        Ok(stats)
    }

    /// True when the node's world transform is out of date.
    pub fn is_stale(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            match self.nodes.get(cur) {
                Some(n) if n.dirty => return true,
                Some(n) => cursor = n.parent,
                None => return false,
            }
        }
        false
    }

    pub fn world_transform(&self, id: NodeId) -> Result<Affine, SceneError> {
        Ok(self.fresh(id)?.world)
    }

    pub fn world_alpha(&self, id: NodeId) -> Result<f32, SceneError> {
        Ok(self.fresh(id)?.world_alpha)
    }

    /// Bounds of the node's own content in local space. `None` for containers.
    pub fn local_bounds(&self, id: NodeId) -> Result<Option<Rect>, SceneError> {
        Ok(self.get(id)?.kind.local_bounds())
    }

    /// World-space bounds of the node's content and its visible descendants.
    pub fn world_bounds(&self, id: NodeId) -> Result<Option<Rect>, SceneError> {
        self.fresh_subtree(id)?;

        let mut bounds: Option<Rect> = None;
        let mut pending = vec![id];
        while let Some(cur) = pending.pop() {
            let Some(node) = self.nodes.get(cur) else { continue };
            if cur != id && !node.visible {
                continue;
            }
            if let Some(own) = world_content_bounds(node) {
                bounds = Some(bounds.map_or(own, |b| b.union(own)));
            }
            pending.extend(node.children.iter().copied());
        }
        Ok(bounds)
    }

    // ── flattening ────────────────────────────────────────────────────────

    /// Appends the subtree's primitives to `list` in paint order.
    ///
    /// Parents paint before children; siblings paint in child-list order.
    pub fn flatten_into(&self, root: NodeId, list: &mut DrawList) -> Result<(), SceneError> {
        self.fresh_subtree(root)?;

        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let Some(node) = self.nodes.get(id) else { continue };
            if !node.visible || node.world_alpha <= 0.0 {
                continue;
            }
            if node.renderable {
                if let Some(primitive) = primitive_for(id, node) {
                    list.push(primitive);
                }
            }
            pending.extend(node.children.iter().rev().copied());
        }
        Ok(())
    }

    pub fn flatten(&self, root: NodeId) -> Result<DrawList, SceneError> {
        let mut list = DrawList::new();
        self.flatten_into(root, &mut list)?;
        Ok(list)
    }

    // ── lookup helpers ────────────────────────────────────────────────────

    fn get(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::UnknownNode(id))
    }

    fn fresh(&self, id: NodeId) -> Result<&Node, SceneError> {
        let node = self.get(id)?;
        if self.is_stale(id) {
            return Err(SceneError::StaleTransforms(id));
        }
        Ok(node)
    }

    fn fresh_subtree(&self, id: NodeId) -> Result<&Node, SceneError> {
        let node = self.fresh(id)?;
        if node.subtree_dirty {
            return Err(SceneError::StaleTransforms(id));
        }
        Ok(node)
    }
}

fn world_content_bounds(node: &Node) -> Option<Rect> {
    match &node.kind {
        NodeKind::Container => None,
        NodeKind::Sprite(s) => {
            Rect::from_points(s.local_corners().map(|p| node.world.transform_point(p)))
        }
        NodeKind::Mesh(m) => {
            Rect::from_points(m.vertices.iter().map(|&p| node.world.transform_point(p)))
        }
    }
}

fn primitive_for(id: NodeId, node: &Node) -> Option<DrawPrimitive> {
    match &node.kind {
        NodeKind::Container => None,
        NodeKind::Sprite(sprite) => {
            if !sprite.is_drawable() {
                return None;
            }
            let tint = node.tint.with_alpha_factor(node.world_alpha);
            Some(DrawPrimitive {
                node: id,
                geometry: Geometry::Quad {
                    corners: sprite.local_corners().map(|p| node.world.transform_point(p)),
                },
                texture: node.kind.texture(),
                blend: node.blend,
                tint,
                features: features_for(true, tint),
            })
        }
        NodeKind::Mesh(mesh) => {
            if mesh.indices.is_empty() {
                return None;
            }
            let texture = node.kind.texture();
            let textured = texture.is_some();
            let tint = mesh
                .color
                .modulate(node.tint)
                .with_alpha_factor(node.world_alpha);
            Some(DrawPrimitive {
                node: id,
                geometry: Geometry::Mesh {
                    positions: mesh
                        .vertices
                        .iter()
                        .map(|&p| node.world.transform_point(p))
                        .collect(),
                    uvs: if textured { mesh.uvs.clone() } else { None },
                    indices: mesh.indices.clone(),
                },
                texture,
                blend: node.blend,
                tint,
                features: features_for(textured, tint),
            })
        }
    }
}

fn features_for(textured: bool, tint: Color) -> ShaderFeatures {
    match (textured, tint.is_white()) {
        (false, _) => ShaderFeatures::TINTED,
        (true, true) => ShaderFeatures::TEXTURED,
        (true, false) => ShaderFeatures::TEXTURED | ShaderFeatures::TINTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TextureId;
    use std::f32::consts::FRAC_PI_2;

    fn sprite(w: f32, h: f32) -> Sprite {
        Sprite::new(TextureId::default(), Vec2::new(w, h))
    }

    /// root → a → b, each translated by (10, 0).
    fn chain() -> (SceneGraph, NodeId, NodeId, NodeId) {
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let a = g.create_container();
        let b = g.create_sprite(sprite(4.0, 4.0));
        g.add_child(root, a).unwrap();
        g.add_child(a, b).unwrap();
        for id in [root, a, b] {
            g.set_position(id, Vec2::new(10.0, 0.0)).unwrap();
        }
        (g, root, a, b)
    }

    // ── hierarchy ─────────────────────────────────────────────────────────

    #[test]
    fn cycle_is_rejected_and_graph_unchanged() {
        let (mut g, root, a, b) = chain();
        assert_eq!(
            g.add_child(b, root),
            Err(SceneError::Cycle { parent: b, child: root })
        );
        assert_eq!(g.add_child(a, a), Err(SceneError::Cycle { parent: a, child: a }));
        assert_eq!(g.children(root).unwrap(), &[a]);
        assert_eq!(g.children(b).unwrap(), &[] as &[NodeId]);
        assert_eq!(g.parent(root).unwrap(), None);
    }

    #[test]
    fn reparenting_severs_old_link() {
        let (mut g, root, a, b) = chain();
        g.add_child(root, b).unwrap();
        assert_eq!(g.children(a).unwrap(), &[] as &[NodeId]);
        assert_eq!(g.children(root).unwrap(), &[a, b]);
        assert_eq!(g.parent(b).unwrap(), Some(root));
        assert!(g.is_stale(b));
    }

    #[test]
    fn add_child_at_checks_index() {
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let x = g.create_container();
        let y = g.create_container();
        g.add_child(root, x).unwrap();
        assert_eq!(
            g.add_child_at(root, y, 2),
            Err(SceneError::IndexOutOfBounds { index: 2, len: 1 })
        );
        g.add_child_at(root, y, 0).unwrap();
        assert_eq!(g.children(root).unwrap(), &[y, x]);
    }

    #[test]
    fn remove_child_requires_parentage() {
        let (mut g, root, a, b) = chain();
        assert_eq!(
            g.remove_child(root, b),
            Err(SceneError::NotAChild { parent: root, child: b })
        );
        g.remove_child(a, b).unwrap();
        assert_eq!(g.parent(b).unwrap(), None);
    }

    #[test]
    fn destroy_removes_subtree() {
        let (mut g, root, a, b) = chain();
        assert_eq!(g.destroy(a).unwrap(), 2);
        assert!(!g.contains(a) && !g.contains(b));
        assert_eq!(g.children(root).unwrap(), &[] as &[NodeId]);
        assert_eq!(g.set_alpha(b, 0.5), Err(SceneError::UnknownNode(b)));
    }

    // ── transforms ────────────────────────────────────────────────────────

    #[test]
    fn world_is_root_to_leaf_composition() {
        let (mut g, root, a, b) = chain();
        g.set_rotation(a, FRAC_PI_2).unwrap();
        g.set_scale(b, Vec2::new(2.0, 3.0)).unwrap();
        g.compute_world_transforms(root).unwrap();

        let expected = g.node(root).unwrap().local().matrix()
            * g.node(a).unwrap().local().matrix()
            * g.node(b).unwrap().local().matrix();
        assert!(g.world_transform(b).unwrap().approx_eq(&expected, 1e-5));

        let origin = g.world_transform(b).unwrap().transform_point(Vec2::ZERO);
        assert!(origin.approx_eq(Vec2::new(20.0, 10.0), 1e-4));
    }

    #[test]
    fn pass_only_enters_changed_subtrees() {
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let left = g.create_container();
        let right = g.create_container();
        let leaf = g.create_container();
        g.add_child(root, left).unwrap();
        g.add_child(root, right).unwrap();
        g.add_child(right, leaf).unwrap();

        let first = g.compute_world_transforms(root).unwrap();
        assert_eq!(first, TransformStats { visited: 4, recomputed: 4 });

        let idle = g.compute_world_transforms(root).unwrap();
        assert_eq!(idle, TransformStats { visited: 1, recomputed: 0 });

        g.set_position(leaf, Vec2::new(1.0, 1.0)).unwrap();
        let partial = g.compute_world_transforms(root).unwrap();
        assert_eq!(partial, TransformStats { visited: 3, recomputed: 1 });
    }

    #[test]
    fn dirty_parent_forces_children() {
        let (mut g, root, a, b) = chain();
        g.compute_world_transforms(root).unwrap();
        g.set_position(a, Vec2::new(50.0, 0.0)).unwrap();
        let stats = g.compute_world_transforms(root).unwrap();
        assert_eq!(stats.recomputed, 2);
        let p = g.world_transform(b).unwrap().transform_point(Vec2::ZERO);
        assert!(p.approx_eq(Vec2::new(70.0, 0.0), 1e-5));
    }

    #[test]
    fn world_alpha_multiplies_down() {
        let (mut g, root, a, b) = chain();
        g.set_alpha(root, 0.5).unwrap();
        g.set_alpha(a, 0.5).unwrap();
        g.compute_world_transforms(root).unwrap();
        assert_eq!(g.world_alpha(b).unwrap(), 0.25);
    }

    #[test]
    fn explicit_matrix_is_used() {
        let (mut g, root, _, b) = chain();
        g.set_local_matrix(b, Affine::scale(2.0, 2.0)).unwrap();
        g.compute_world_transforms(root).unwrap();
        let p = g.world_transform(b).unwrap().transform_point(Vec2::new(1.0, 1.0));
        assert!(p.approx_eq(Vec2::new(22.0, 2.0), 1e-5));
    }

    #[test]
    fn stale_queries_fail() {
        let (mut g, root, a, b) = chain();
        assert_eq!(g.world_transform(b), Err(SceneError::StaleTransforms(b)));
        g.compute_world_transforms(root).unwrap();
        assert!(g.world_transform(b).is_ok());

        g.set_rotation(a, 1.0).unwrap();
        assert_eq!(g.world_transform(b), Err(SceneError::StaleTransforms(b)));
        assert_eq!(g.world_bounds(root), Err(SceneError::StaleTransforms(root)));
        // root's own world is still valid
        assert!(g.world_transform(root).is_ok());
    }

    #[test]
    fn invisible_nodes_still_get_transforms() {
        let (mut g, root, a, b) = chain();
        g.set_visible(a, false).unwrap();
        g.compute_world_transforms(root).unwrap();
        assert!(!g.is_stale(b));
        assert!(g.flatten(root).unwrap().is_empty());
    }

    // ── bounds ────────────────────────────────────────────────────────────

    #[test]
    fn world_bounds_union_visible_descendants() {
        let mut g = SceneGraph::new();
        let root = g.create_sprite(sprite(10.0, 10.0));
        let child = g.create_sprite(sprite(5.0, 5.0));
        let hidden = g.create_sprite(sprite(100.0, 100.0));
        g.add_child(root, child).unwrap();
        g.add_child(root, hidden).unwrap();
        g.set_position(child, Vec2::new(20.0, 0.0)).unwrap();
        g.set_visible(hidden, false).unwrap();
        g.compute_world_transforms(root).unwrap();

        assert_eq!(
            g.world_bounds(root).unwrap(),
            Some(Rect::new(0.0, 0.0, 25.0, 10.0))
        );
        assert_eq!(
            g.local_bounds(child).unwrap(),
            Some(Rect::new(0.0, 0.0, 5.0, 5.0))
        );
    }

    #[test]
    fn rotated_bounds_are_axis_aligned() {
        let mut g = SceneGraph::new();
        let s = g.create_sprite(sprite(10.0, 4.0));
        g.set_rotation(s, FRAC_PI_2).unwrap();
        g.compute_world_transforms(s).unwrap();
        let b = g.world_bounds(s).unwrap().unwrap();
        assert!(b.origin.approx_eq(Vec2::new(-4.0, 0.0), 1e-4));
        assert!(b.size.approx_eq(Vec2::new(4.0, 10.0), 1e-4));
    }

    // ── flatten ───────────────────────────────────────────────────────────

    #[test]
    fn flatten_is_preorder_paint_order() {
        let mut g = SceneGraph::new();
        let root = g.create_sprite(sprite(1.0, 1.0));
        let a = g.create_sprite(sprite(1.0, 1.0));
        let a1 = g.create_sprite(sprite(1.0, 1.0));
        let b = g.create_sprite(sprite(1.0, 1.0));
        g.add_child(root, a).unwrap();
        g.add_child(a, a1).unwrap();
        g.add_child(root, b).unwrap();
        g.compute_world_transforms(root).unwrap();

        let order: Vec<NodeId> = g.flatten(root).unwrap().iter().map(|p| p.node).collect();
        assert_eq!(order, vec![root, a, a1, b]);
    }

    #[test]
    fn flatten_skip_rules() {
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let hidden = g.create_sprite(sprite(1.0, 1.0));
        let hidden_child = g.create_sprite(sprite(1.0, 1.0));
        let faded = g.create_sprite(sprite(1.0, 1.0));
        let skipped = g.create_sprite(sprite(1.0, 1.0));
        let kept = g.create_sprite(sprite(1.0, 1.0));
        g.add_child(root, hidden).unwrap();
        g.add_child(hidden, hidden_child).unwrap();
        g.add_child(root, faded).unwrap();
        g.add_child(root, skipped).unwrap();
        g.add_child(skipped, kept).unwrap();
        g.set_visible(hidden, false).unwrap();
        g.set_alpha(faded, 0.0).unwrap();
        g.set_renderable(skipped, false).unwrap();
        g.compute_world_transforms(root).unwrap();

        let order: Vec<NodeId> = g.flatten(root).unwrap().iter().map(|p| p.node).collect();
        assert_eq!(order, vec![kept]);
    }

    #[test]
    fn flatten_stale_tree_fails() {
        let (g, root, _, _) = chain();
        assert!(matches!(g.flatten(root), Err(SceneError::StaleTransforms(_))));
    }

    #[test]
    fn primitive_carries_premultiplied_tint_and_features() {
        let mut g = SceneGraph::new();
        let s = g.create_sprite(sprite(2.0, 2.0));
        let m = g
            .create_mesh(Mesh::solid(
                vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
                vec![0u16, 1, 2],
                Color::from_premul(0.0, 0.0, 1.0, 1.0),
            ))
            .unwrap();
        g.add_child(s, m).unwrap();
        g.set_alpha(s, 0.5).unwrap();
        g.set_blend_mode(m, BlendMode::Add).unwrap();
        g.compute_world_transforms(s).unwrap();

        let list = g.flatten(s).unwrap();
        assert_eq!(list.len(), 2);
        let sp = &list.items()[0];
        assert_eq!(sp.tint, Color::from_premul(0.5, 0.5, 0.5, 0.5));
        assert_eq!(sp.features, ShaderFeatures::TEXTURED | ShaderFeatures::TINTED);

        let mp = &list.items()[1];
        assert_eq!(mp.tint, Color::from_premul(0.0, 0.0, 0.5, 0.5));
        assert_eq!(mp.features, ShaderFeatures::TINTED);
        assert_eq!(mp.blend, BlendMode::Add);
        assert!(mp.texture.is_none());
    }

    #[test]
    fn invalid_mesh_is_rejected() {
        let mut g = SceneGraph::new();
        let bad = Mesh::solid(vec![Vec2::ZERO], vec![0u16, 0, 1], Color::WHITE);
        assert!(matches!(g.create_mesh(bad), Err(SceneError::InvalidMesh(_))));
        assert!(g.is_empty());
    }
}
