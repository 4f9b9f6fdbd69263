// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The update traversal: drain-recompute passes over the dirty channels.
//!
//! Update follows a drain-recompute pattern for each channel:
//!
//! 1. **TRANSFORM** — Drain dirty indices in parent-before-child order and
//!    recompute each item's `ctm` from its effective parent (tree parent, or
//!    clip/mask owner). Every recomputed item gains a BBOX mark, since a
//!    moved transform moves the bounds.
//! 2. **BBOX** — Drain dirty indices in child-before-parent order and
//!    recompute item-local bounds, device-space geometric bounds, and
//!    device-space visual bounds (stroke expansion, clip/mask
//!    intersection).
//! 3. **Unit rederivation** — Owners whose local geometric bounds changed
//!    rederive the unit-square mapping of attached bbox-unit clip/mask
//!    items, which marks those subtrees TRANSFORM-dirty; when that happens
//!    the pass runs again (bounded — the derived transform reaches a fixed
//!    point because clip bounds do not feed back into owner geometry).
//! 4. **STYLE** / **CONTENT** — Drain into change lists.
//! 5. **TOPOLOGY** — Drain and discard (the traversal order was already
//!    rebuilt at the start if needed).
//!
//! Damage is tracked at mutation granularity, not recompute granularity:
//! each mutator captured the item's pre-update bounds, and the update's
//! final step adds the post-update bounds for the same anchors (see
//! [`ItemDamage`]). A box that moved only because an ancestor moved
//! produces no damage of its own; the ancestor's entry covers it, and the
//! renderer re-projects caches through [`CtmMove`] rather than repainting.
//!
//! After update returns, every bounding box in the tree is valid until the
//! next mutation, and calling update again without intervening mutations
//! reports no changes (idempotence). Degenerate geometry produces `None`
//! bounds, never an error.
//!
//! [`UpdateChanges`] uses raw slot indices (`u32`) rather than
//! [`ItemId`](super::ItemId) handles so the renderer can index the store's
//! SoA arrays via the `*_at()` accessors without paying for generation
//! checks on every access.

use alloc::vec::Vec;

use kurbo::{Affine, Rect};
use understory_dirty::EagerPolicy;

use crate::dirty;
use crate::geom::IntRect;

use super::id::INVALID;
use super::kind::ItemKind;
use super::store::{DrawingStore, ItemFlags};

/// Iteration guard for the rederivation loop; two passes settle every
/// realistic tree, deeper nesting of bbox-unit clips converges one level
/// per pass.
const MAX_UPDATE_PASSES: u32 = 8;

bitflags::bitflags! {
    /// What an external notification says changed about an item.
    ///
    /// Most invalidation happens automatically through the store's
    /// mutators; `UpdateFlags` exists for changes the store cannot see,
    /// such as externally owned image pixels being rewritten, and for
    /// embedders that batch their own change tracking.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct UpdateFlags: u8 {
        /// The item's transform-relevant state changed.
        const TRANSFORM = 1 << 0;
        /// The item's geometry changed; bounds must be recomputed.
        const GEOMETRY = 1 << 1;
        /// Only paint changed; geometry may be reused.
        const STYLE = 1 << 2;
    }
}

/// A cached item whose device transform changed during update.
///
/// The renderer uses the old transform to re-project the item's cache
/// instead of discarding it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CtmMove {
    /// Raw slot index.
    pub idx: u32,
    /// Device transform before this update.
    pub old_ctm: Affine,
}

/// A device-space area that must repaint because of one item's change.
///
/// `idx` anchors cache invalidation: the renderer dirties the anchor's own
/// cache and every ancestor's. Transform mutations anchor at the moved
/// item's parent — the item's own cached pixels stay valid and are
/// re-projected instead (see [`CtmMove`]). [`INVALID`] means repaint only,
/// no cache to blame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemDamage {
    /// Raw anchor slot, or [`INVALID`].
    pub idx: u32,
    /// Old ∪ new visual bounds, rounded out to pixels.
    pub area: IntRect,
}

/// The set of changes produced by a single [`DrawingStore::update`] call.
///
/// Each index list contains the raw slot indices of items that changed in
/// the corresponding category. The renderer uses these to maintain caches
/// and schedule repaints.
#[derive(Clone, Debug, Default)]
pub struct UpdateChanges {
    /// Items whose device transform was recomputed.
    pub transforms: Vec<u32>,
    /// Cached items whose device transform actually moved, with the prior
    /// transform for cache re-projection.
    pub ctm_moves: Vec<CtmMove>,
    /// Items whose bounding boxes were recomputed.
    pub bboxes: Vec<u32>,
    /// Items whose style changed (repaint without geometry change).
    pub styles: Vec<u32>,
    /// Items whose shape path or image source was replaced.
    pub content: Vec<u32>,
    /// Per-item repaint areas (old ∪ new visual bounds), including the
    /// final bounds of destroyed items.
    pub damage: Vec<ItemDamage>,
    /// Items added since the last update.
    pub added: Vec<u32>,
    /// Items removed since the last update.
    pub removed: Vec<u32>,
    /// Whether the tree topology changed (traversal order was rebuilt).
    pub topology_changed: bool,
}

impl UpdateChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.transforms.clear();
        self.ctm_moves.clear();
        self.bboxes.clear();
        self.styles.clear();
        self.content.clear();
        self.damage.clear();
        self.added.clear();
        self.removed.clear();
        self.topology_changed = false;
    }

    /// Whether this update produced no observable change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
            && self.bboxes.is_empty()
            && self.styles.is_empty()
            && self.content.is_empty()
            && self.damage.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && !self.topology_changed
    }
}

impl DrawingStore {
    /// Updates the tree, recomputing dirty transforms and bounding boxes and
    /// returning the set of changes.
    pub fn update(&mut self) -> UpdateChanges {
        let mut changes = UpdateChanges::default();
        self.update_into(&mut changes);
        changes
    }

    /// Like [`update`](Self::update), but reuses a caller-provided buffer to
    /// avoid allocation.
    pub fn update_into(&mut self, changes: &mut UpdateChanges) {
        changes.clear();

        // Rebuild traversal order if needed.
        if self.traversal_dirty {
            self.rebuild_traversal_order();
            changes.topology_changed = true;
            self.traversal_dirty = false;
        }

        let mut pass = 0;
        loop {
            pass += 1;
            self.drain_transforms(changes);
            self.drain_bboxes(changes);
            // Rederiving a unit mapping marks TRANSFORM again; run another
            // pass to settle it.
            if !self.rederive_unit_transforms() {
                break;
            }
            debug_assert!(pass < MAX_UPDATE_PASSES, "update failed to settle");
            if pass >= MAX_UPDATE_PASSES {
                break;
            }
        }

        // Drain STYLE.
        changes.styles = self
            .dirty
            .drain(dirty::STYLE)
            .deterministic()
            .run()
            .collect();

        // Drain CONTENT — geometric consequences arrived via BBOX marks.
        changes.content = self
            .dirty
            .drain(dirty::CONTENT)
            .deterministic()
            .run()
            .collect();

        // Drain TOPOLOGY (just consume, changes are structural).
        let _: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();

        // Mutated items damage their post-update bounds too (the pre-update
        // bounds were captured at mutation time).
        let mutations = core::mem::take(&mut self.pending_mutations);
        for (item, anchor) in mutations {
            if self.free_list.contains(&item) {
                // Destroyed before this update; its final bounds were
                // captured at destroy time.
                continue;
            }
            let anchor = if anchor != INVALID && self.free_list.contains(&anchor) {
                INVALID
            } else {
                anchor
            };
            if let Some(area) = self.visual_bbox[item as usize].and_then(IntRect::round_out) {
                changes.damage.push(ItemDamage { idx: anchor, area });
            }
        }

        // Move lifecycle lists and mutation-time damage.
        core::mem::swap(&mut self.pending_added, &mut changes.added);
        core::mem::swap(&mut self.pending_removed, &mut changes.removed);
        changes.damage.append(&mut self.pending_damage);
    }

    /// Schedules recomputation for an externally observed change.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn request_update(&mut self, id: super::ItemId, flags: UpdateFlags) {
        self.validate(id);
        if flags.contains(UpdateFlags::TRANSFORM) {
            self.note_mutation(id.idx, self.effective_parent(id.idx));
            self.dirty.mark_with(id.idx, dirty::TRANSFORM, &EagerPolicy);
        }
        if flags.contains(UpdateFlags::GEOMETRY) {
            self.note_mutation(id.idx, id.idx);
            self.dirty.mark(id.idx, dirty::CONTENT);
            self.dirty.mark_with(id.idx, dirty::BBOX, &EagerPolicy);
        }
        if flags.contains(UpdateFlags::STYLE) {
            self.note_mutation(id.idx, id.idx);
            self.dirty.mark(id.idx, dirty::STYLE);
        }
    }

    /// Returns the current traversal order (depth-first pre-order, clip and
    /// mask subtrees visited directly after their owner).
    ///
    /// Only valid after [`update`](Self::update) has been called at least
    /// once.
    #[must_use]
    pub fn traversal_order(&self) -> &[u32] {
        &self.traversal_order
    }

    // -- Transform pass --

    /// Drains the TRANSFORM channel and recomputes ctms parent-first.
    fn drain_transforms(&mut self, changes: &mut UpdateChanges) {
        let mut dirty_transforms: Vec<u32> = self
            .dirty
            .drain(dirty::TRANSFORM)
            .affected()
            .deterministic()
            .run()
            .collect();
        if dirty_transforms.is_empty() {
            return;
        }
        // Parents must settle before children read their ctm.
        dirty_transforms.sort_unstable_by_key(|&i| self.traversal_position[i as usize]);

        for &idx in &dirty_transforms {
            let old = self.ctm[idx as usize];
            let new = self.compose_ctm(idx);
            self.ctm[idx as usize] = new;

            if new != old && self.flags[idx as usize].contains(ItemFlags::CACHED) {
                let already = changes.ctm_moves.iter().any(|m| m.idx == idx);
                if !already {
                    changes.ctm_moves.push(CtmMove { idx, old_ctm: old });
                }
            }
            // A moved transform moves the bounds.
            self.dirty.mark_with(idx, dirty::BBOX, &EagerPolicy);
        }
        changes.transforms.append(&mut dirty_transforms);
    }

    /// Composes the device transform for slot `idx` from its effective
    /// parent.
    fn compose_ctm(&self, idx: u32) -> Affine {
        let local = self.local_transform[idx as usize];
        let owner = self.attached_to[idx as usize];
        if owner != INVALID {
            // Clip/mask geometry lives in the owner's user space, optionally
            // remapped through the derived unit transform.
            return self.ctm[owner as usize] * self.attach_transform[idx as usize] * local;
        }
        let parent = self.parent[idx as usize];
        if parent == INVALID {
            return local;
        }
        let mut base = self.ctm[parent as usize];
        if let Some(group) = self.group_data(parent)
            && let Some(child_transform) = group.child_transform
        {
            base = base * child_transform;
        }
        base * local
    }

    // -- Bbox pass --

    /// Drains the BBOX channel and recomputes bounds child-first.
    fn drain_bboxes(&mut self, changes: &mut UpdateChanges) {
        let mut dirty_bboxes: Vec<u32> = self
            .dirty
            .drain(dirty::BBOX)
            .affected()
            .deterministic()
            .run()
            .collect();
        if dirty_bboxes.is_empty() {
            return;
        }
        // Children must settle before parents union them.
        dirty_bboxes.sort_unstable_by_key(|&i| core::cmp::Reverse(self.traversal_position[i as usize]));

        // Damage is tracked at mutation granularity, not here: a recomputed
        // box is not damage unless some mutation moved it, and that mutation
        // already noted both its old and new bounds.
        for &idx in &dirty_bboxes {
            self.recompute_bounds(idx);
        }
        changes.bboxes.append(&mut dirty_bboxes);
    }

    /// Recomputes item-local, geometric, and visual bounds for slot `idx`.
    ///
    /// Children (and attached clip/mask items) must already be up to date.
    fn recompute_bounds(&mut self, idx: u32) {
        let own_local = self.kind[idx as usize].local_bounds();

        // Item-local bounds including descendants (pre-transform).
        let mut local = own_local;
        // Device-space fill extent and rendered extent.
        let (mut geometric, mut visual) = match &self.kind[idx as usize] {
            ItemKind::Group(group) => {
                let child_transform = group.child_transform.unwrap_or(Affine::IDENTITY);
                let mut geometric = None;
                let mut visual = None;
                let mut child = self.first_child[idx as usize];
                while child != INVALID {
                    let c = child as usize;
                    if let Some(b) = self.item_bounds[c] {
                        let in_parent =
                            (child_transform * self.local_transform[c]).transform_rect_bbox(b);
                        local = union_rects(local, Some(in_parent));
                    }
                    geometric = union_rects(geometric, self.geometric_bbox[c]);
                    visual = union_rects(visual, self.visual_bbox[c]);
                    child = self.next_sibling[c];
                }
                (geometric, visual)
            }
            ItemKind::Shape(_) => {
                let ctm = self.ctm[idx as usize];
                let geometric = own_local.map(|b| ctm.transform_rect_bbox(b));
                let stroke = self.style[idx as usize].stroke;
                let visual = own_local.map(|b| {
                    let expanded = match stroke {
                        Some(s) if s.width > 0.0 => b.inflate(s.width / 2.0, s.width / 2.0),
                        _ => b,
                    };
                    ctm.transform_rect_bbox(expanded)
                });
                (geometric, visual)
            }
            ItemKind::Image(_) => {
                let ctm = self.ctm[idx as usize];
                let device = own_local.map(|b| ctm.transform_rect_bbox(b));
                (device, device)
            }
        };

        // Clip restricts to its fill extent; a mask restricts to its own
        // rendered extent. Both affect visual, never geometric, bounds.
        let clip = self.clip_item[idx as usize];
        if clip != INVALID {
            visual = intersect_rects(visual, self.geometric_bbox[clip as usize]);
        }
        let mask = self.mask_item[idx as usize];
        if mask != INVALID {
            visual = intersect_rects(visual, self.visual_bbox[mask as usize]);
        }

        geometric = geometric.filter(|r| r.is_finite());
        visual = visual.filter(|r| r.is_finite() && r.width() > 0.0 && r.height() > 0.0);

        self.item_bounds[idx as usize] = local.filter(|r| r.is_finite());
        self.geometric_bbox[idx as usize] = geometric;
        self.visual_bbox[idx as usize] = visual;
    }

    // -- Unit rederivation pass --

    /// Rederives the unit-square mapping of bbox-unit clip/mask items from
    /// their owner's current local geometric bounds.
    ///
    /// Returns whether any attached transform changed (which scheduled
    /// another transform/bbox pass).
    fn rederive_unit_transforms(&mut self) -> bool {
        let mut rederived = false;
        for idx in 0..self.len as usize {
            if !self.bbox_units[idx] {
                continue;
            }
            let owner = self.attached_to[idx];
            if owner == INVALID {
                continue;
            }
            let desired = match self.item_bounds[owner as usize] {
                Some(b) if b.width() > 0.0 && b.height() > 0.0 => {
                    Affine::translate(b.origin().to_vec2())
                        * Affine::scale_non_uniform(b.width(), b.height())
                }
                _ => Affine::IDENTITY,
            };
            if self.attach_transform[idx] != desired {
                self.attach_transform[idx] = desired;
                #[allow(clippy::cast_possible_truncation, reason = "idx < self.len: u32")]
                self.dirty
                    .mark_with(idx as u32, dirty::TRANSFORM, &EagerPolicy);
                rederived = true;
            }
        }
        rederived
    }

    /// Rebuilds the depth-first pre-order traversal of all live items.
    ///
    /// Attached clip/mask subtrees are visited directly after their owner so
    /// that position sorting keeps owner-before-clip for transforms and
    /// clip-before-owner for bboxes.
    fn rebuild_traversal_order(&mut self) {
        self.traversal_order.clear();
        self.traversal_position.clear();
        self.traversal_position.resize(self.len as usize, 0);
        for idx in 0..self.len {
            if self.parent[idx as usize] == INVALID
                && self.attached_to[idx as usize] == INVALID
                && !self.free_list.contains(&idx)
            {
                self.dfs_collect(idx);
            }
        }
    }

    /// Depth-first pre-order collection starting from `idx`.
    fn dfs_collect(&mut self, idx: u32) {
        #[allow(clippy::cast_possible_truncation, reason = "tree size is u32-bounded")]
        {
            self.traversal_position[idx as usize] = self.traversal_order.len() as u32;
        }
        self.traversal_order.push(idx);
        if self.clip_item[idx as usize] != INVALID {
            self.dfs_collect(self.clip_item[idx as usize]);
        }
        if self.mask_item[idx as usize] != INVALID {
            self.dfs_collect(self.mask_item[idx as usize]);
        }
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.dfs_collect(child);
            child = self.next_sibling[child as usize];
        }
    }
}

fn union_rects(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn intersect_rects(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    let (a, b) = (a?, b?);
    let r = a.intersect(b);
    (r.width() > 0.0 && r.height() > 0.0).then_some(r)
}

#[cfg(test)]
mod tests {
    use kurbo::Shape as _;

    use crate::style::{ItemStyle, Paint, Rgba, StrokeStyle};

    use super::*;

    fn rect_shape(r: Rect) -> ItemKind {
        ItemKind::shape(r.to_path(0.1))
    }

    #[test]
    fn update_computes_ctms() {
        let mut store = DrawingStore::new();
        let parent = store.create_item(ItemKind::group());
        let child = store.create_item(ItemKind::group());

        let parent_xf = Affine::translate((10.0, 0.0));
        let child_xf = Affine::translate((0.0, 5.0));

        store.set_transform(parent, parent_xf);
        store.set_transform(child, child_xf);
        store.add_child(parent, child);

        let _changes = store.update();

        assert_eq!(store.ctm(parent), parent_xf);
        assert_eq!(store.ctm(child), parent_xf * child_xf);
    }

    #[test]
    fn child_transform_composes_between_group_and_children() {
        let mut store = DrawingStore::new();
        let group = store.create_item(ItemKind::group());
        let child = store.create_item(ItemKind::group());
        store.add_child(group, child);

        store.set_transform(group, Affine::translate((100.0, 0.0)));
        store.set_child_transform(group, Some(Affine::scale(2.0)));
        store.set_transform(child, Affine::translate((3.0, 0.0)));

        let _ = store.update();

        // group ctm is unaffected by its child transform.
        assert_eq!(store.ctm(group), Affine::translate((100.0, 0.0)));
        let expected =
            Affine::translate((100.0, 0.0)) * Affine::scale(2.0) * Affine::translate((3.0, 0.0));
        assert_eq!(store.ctm(child), expected);
    }

    #[test]
    fn update_is_idempotent() {
        let mut store = DrawingStore::new();
        let group = store.create_item(ItemKind::group());
        let shape = store.create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        store.add_child(group, shape);
        store.set_transform(group, Affine::translate((5.0, 5.0)));

        let _ = store.update();
        let bbox_first = store.geometric_bbox(group);

        let changes = store.update();
        assert!(changes.is_empty(), "second update must be a no-op");
        assert_eq!(store.geometric_bbox(group), bbox_first);
    }

    #[test]
    fn group_bbox_is_union_of_children() {
        let mut store = DrawingStore::new();
        let group = store.create_item(ItemKind::group());
        let r1 = store.create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let r2 = store.create_item(rect_shape(Rect::new(5.0, 5.0, 15.0, 15.0)));
        store.add_child(group, r1);
        store.add_child(group, r2);

        let _ = store.update();

        let bbox = store.geometric_bbox(group).expect("group has extent");
        assert!((bbox.x0 - 0.0).abs() < 1e-9);
        assert!((bbox.y0 - 0.0).abs() < 1e-9);
        assert!((bbox.x1 - 15.0).abs() < 1e-9);
        assert!((bbox.y1 - 15.0).abs() < 1e-9);
    }

    #[test]
    fn stroke_expands_visual_but_not_geometric_bbox() {
        let mut store = DrawingStore::new();
        let shape = store.create_item(rect_shape(Rect::new(10.0, 10.0, 20.0, 20.0)));
        store.set_style(
            shape,
            ItemStyle {
                opacity: 1.0,
                fill: Some(Paint::Solid(Rgba::BLACK)),
                stroke: Some(StrokeStyle {
                    paint: Paint::Solid(Rgba::BLACK),
                    width: 4.0,
                }),
            },
        );
        let _ = store.update();

        let geometric = store.geometric_bbox(shape).unwrap();
        let visual = store.visual_bbox(shape).unwrap();
        assert!((geometric.x0 - 10.0).abs() < 1e-9);
        assert!((visual.x0 - 8.0).abs() < 1e-9);
        assert!((visual.x1 - 22.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_geometry_yields_empty_bbox() {
        let mut store = DrawingStore::new();
        let empty = store.create_item(ItemKind::shape(kurbo::BezPath::new()));
        let group = store.create_item(ItemKind::group());
        let _ = store.update();

        assert_eq!(store.geometric_bbox(empty), None);
        assert_eq!(store.visual_bbox(empty), None);
        assert_eq!(store.geometric_bbox(group), None);
    }

    #[test]
    fn clip_restricts_visual_bbox_only() {
        let mut store = DrawingStore::new();
        let shape = store.create_item(rect_shape(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let clip = store.create_item(rect_shape(Rect::new(0.0, 0.0, 30.0, 30.0)));
        store.set_clip_item(shape, Some(clip));

        let _ = store.update();

        let geometric = store.geometric_bbox(shape).unwrap();
        let visual = store.visual_bbox(shape).unwrap();
        assert!((geometric.x1 - 100.0).abs() < 1e-9);
        assert!((visual.x1 - 30.0).abs() < 1e-9);
    }

    #[test]
    fn clip_inherits_owner_ctm() {
        let mut store = DrawingStore::new();
        let owner = store.create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let clip = store.create_item(rect_shape(Rect::new(0.0, 0.0, 5.0, 5.0)));
        store.set_transform(owner, Affine::translate((50.0, 0.0)));
        store.set_clip_item(owner, Some(clip));

        let _ = store.update();

        assert_eq!(store.ctm(clip), Affine::translate((50.0, 0.0)));
        let clip_bbox = store.geometric_bbox(clip).unwrap();
        assert!((clip_bbox.x0 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn bbox_unit_clip_tracks_owner_bounds() {
        let mut store = DrawingStore::new();
        let owner = store.create_item(rect_shape(Rect::new(0.0, 0.0, 40.0, 20.0)));
        // Clip covering the left half of the owner, in unit coordinates.
        let clip = store.create_item(rect_shape(Rect::new(0.0, 0.0, 0.5, 1.0)));
        store.set_clip_item(owner, Some(clip));
        store.set_bbox_units(clip, true);

        let _ = store.update();

        let visual = store.visual_bbox(owner).unwrap();
        assert!((visual.x1 - 20.0).abs() < 1e-9, "clip at half width");
        assert!((visual.y1 - 20.0).abs() < 1e-9);

        // Growing the owner re-derives the unit mapping.
        store.set_shape(
            owner,
            match rect_shape(Rect::new(0.0, 0.0, 80.0, 20.0)) {
                ItemKind::Shape(s) => s,
                _ => unreachable!(),
            },
        );
        let _ = store.update();
        let visual = store.visual_bbox(owner).unwrap();
        assert!((visual.x1 - 40.0).abs() < 1e-9, "clip follows new bounds");
    }

    #[test]
    fn damage_covers_old_and_new_position() {
        let mut store = DrawingStore::new();
        let shape = store.create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let _ = store.update();

        store.set_transform(shape, Affine::translate((100.0, 0.0)));
        let changes = store.update();

        let covered = |r: IntRect| changes.damage.iter().any(|d| d.area.contains_rect(r));
        assert!(covered(IntRect::new(0, 0, 10, 10).unwrap()), "old position");
        assert!(covered(IntRect::new(100, 0, 110, 10).unwrap()), "new position");
    }

    #[test]
    fn moving_a_child_anchors_damage_at_the_parent() {
        let mut store = DrawingStore::new();
        let group = store.create_item(ItemKind::group());
        let shape = store.create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        store.add_child(group, shape);
        let _ = store.update();

        store.set_transform(shape, Affine::translate((30.0, 0.0)));
        let changes = store.update();

        // Both the vacated and the occupied area blame the parent, so the
        // parent's cache repaints while the child's own cache could ride.
        assert!(!changes.damage.is_empty());
        assert!(changes.damage.iter().all(|d| d.idx == group.index()));
    }

    #[test]
    fn destroyed_item_reports_final_damage() {
        let mut store = DrawingStore::new();
        let shape = store.create_item(rect_shape(Rect::new(3.0, 3.0, 9.0, 9.0)));
        let _ = store.update();

        store.destroy_item(shape);
        let changes = store.update();

        assert!(changes.removed.contains(&shape.index()));
        assert!(
            changes
                .damage
                .iter()
                .any(|d| d.area == IntRect::new(3, 3, 9, 9).unwrap()),
            "vacated area must repaint"
        );
    }

    #[test]
    fn lifecycle_added_and_removed() {
        let mut store = DrawingStore::new();
        let id = store.create_item(ItemKind::group());

        let changes = store.update();
        assert!(changes.added.contains(&id.index()));
        assert!(changes.removed.is_empty());

        let changes = store.update();
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());

        store.destroy_item(id);
        let changes = store.update();
        assert!(changes.removed.contains(&id.index()));
        assert!(changes.added.is_empty());
    }

    #[test]
    fn ctm_move_reported_for_cached_items_only() {
        let mut store = DrawingStore::new();
        let plain = store.create_item(rect_shape(Rect::new(0.0, 0.0, 4.0, 4.0)));
        let cached = store.create_item(rect_shape(Rect::new(0.0, 0.0, 4.0, 4.0)));
        store.set_flags(cached, ItemFlags::default() | ItemFlags::CACHED);
        let _ = store.update();

        store.set_transform(plain, Affine::translate((1.0, 0.0)));
        store.set_transform(cached, Affine::translate((2.0, 0.0)));
        let changes = store.update();

        assert_eq!(changes.ctm_moves.len(), 1);
        assert_eq!(changes.ctm_moves[0].idx, cached.index());
        assert_eq!(changes.ctm_moves[0].old_ctm, Affine::IDENTITY);
    }

    #[test]
    fn style_change_damages_current_bounds() {
        let mut store = DrawingStore::new();
        let shape = store.create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let _ = store.update();

        store.set_style(
            shape,
            ItemStyle {
                fill: Some(Paint::Solid(Rgba::new(255, 0, 0, 255))),
                ..ItemStyle::default()
            },
        );
        let changes = store.update();

        assert!(changes.styles.contains(&shape.index()));
        assert!(
            changes
                .damage
                .iter()
                .any(|d| d.idx == shape.index()
                    && d.area == IntRect::new(0, 0, 10, 10).unwrap())
        );
    }

    #[test]
    fn request_update_schedules_repaint_for_external_changes() {
        let mut store = DrawingStore::new();
        let image = store.create_item(ItemKind::image(
            crate::item::SourceId(1),
            Rect::new(0.0, 0.0, 16.0, 16.0),
        ));
        let _ = store.update();

        // The image's pixels were rewritten outside the store.
        store.request_update(image, UpdateFlags::STYLE);
        let changes = store.update();
        assert!(changes.styles.contains(&image.index()));
        assert!(
            changes
                .damage
                .iter()
                .any(|d| d.idx == image.index()
                    && d.area == IntRect::new(0, 0, 16, 16).unwrap())
        );

        store.request_update(image, UpdateFlags::GEOMETRY);
        let changes = store.update();
        assert!(changes.content.contains(&image.index()));
        assert!(changes.bboxes.contains(&image.index()));
    }

    #[test]
    fn traversal_order_visits_clip_after_owner() {
        let mut store = DrawingStore::new();
        let root = store.create_item(ItemKind::group());
        let child = store.create_item(ItemKind::group());
        let clip = store.create_item(rect_shape(Rect::new(0.0, 0.0, 1.0, 1.0)));
        store.add_child(root, child);
        store.set_clip_item(root, Some(clip));

        let _ = store.update();

        let order = store.traversal_order();
        assert_eq!(order, &[root.index(), clip.index(), child.index()]);
    }
}
