// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays item storage with allocation, topology, and property
//! management.

use alloc::vec::Vec;

use kurbo::{Affine, Rect};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::dirty;
use crate::style::ItemStyle;

use super::id::{INVALID, ItemId};
use super::kind::{GroupData, ItemKind, ShapeData};
use super::traverse::Children;

bitflags::bitflags! {
    /// Per-item boolean flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        /// The item (and its subtree) contributes to rendering.
        const VISIBLE = 1 << 0;
        /// The item participates in hit-testing.
        const SENSITIVE = 1 << 1;
        /// The renderer keeps a pixel cache for this item.
        const CACHED = 1 << 2;
    }
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::SENSITIVE
    }
}

/// Struct-of-arrays storage for all items of one drawing.
///
/// Items are addressed by [`ItemId`] handles. Internally, each item occupies
/// a slot in parallel arrays. Destroyed items are recycled via a free list,
/// and generation counters prevent stale handle access.
///
/// Clip and mask subtrees are *attached* rather than parented: they hang off
/// an owner through dedicated slots, never appear in the ordered child list,
/// and inherit the owner's device transform.
#[derive(Debug)]
pub struct DrawingStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Clip/mask attachment --
    pub(crate) clip_item: Vec<u32>,
    pub(crate) mask_item: Vec<u32>,
    /// Owner slot for items attached as clip or mask, else `INVALID`.
    pub(crate) attached_to: Vec<u32>,
    /// objectBoundingBox-unit scaling requested for this attached item.
    pub(crate) bbox_units: Vec<bool>,
    /// Derived unit-scaling transform for attached items (identity unless
    /// `bbox_units` is set and the owner has a bbox).
    pub(crate) attach_transform: Vec<Affine>,

    // -- Local properties (set by callers) --
    pub(crate) kind: Vec<ItemKind>,
    pub(crate) local_transform: Vec<Affine>,
    pub(crate) style: Vec<ItemStyle>,
    pub(crate) flags: Vec<ItemFlags>,

    // -- Computed properties (written by update) --
    pub(crate) ctm: Vec<Affine>,
    /// Item-local geometric bounds including descendants (pre-transform).
    pub(crate) item_bounds: Vec<Option<Rect>>,
    /// Device-space fill extent.
    pub(crate) geometric_bbox: Vec<Option<Rect>>,
    /// Device-space rendered extent (stroke included, clip/mask applied).
    pub(crate) visual_bbox: Vec<Option<Rect>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Traversal cache --
    pub(crate) traversal_order: Vec<u32>,
    pub(crate) traversal_position: Vec<u32>,
    pub(crate) traversal_dirty: bool,

    // -- Lifecycle tracking --
    pub(crate) pending_added: Vec<u32>,
    pub(crate) pending_removed: Vec<u32>,
    /// Damage captured at mutation time (pre-update bounds of mutated
    /// items, final bounds of destroyed ones).
    pub(crate) pending_damage: Vec<super::update::ItemDamage>,
    /// Mutated items whose post-update bounds must also become damage:
    /// `(item, cache anchor)`.
    pub(crate) pending_mutations: Vec<(u32, u32)>,
}

impl Default for DrawingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            clip_item: Vec::new(),
            mask_item: Vec::new(),
            attached_to: Vec::new(),
            bbox_units: Vec::new(),
            attach_transform: Vec::new(),
            kind: Vec::new(),
            local_transform: Vec::new(),
            style: Vec::new(),
            flags: Vec::new(),
            ctm: Vec::new(),
            item_bounds: Vec::new(),
            geometric_bbox: Vec::new(),
            visual_bbox: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            traversal_order: Vec::new(),
            traversal_position: Vec::new(),
            traversal_dirty: true,
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
            pending_damage: Vec::new(),
            pending_mutations: Vec::new(),
        }
    }

    // -- Allocation API --

    /// Creates a new item of the given kind and returns its handle.
    ///
    /// The item starts with an identity transform, default style, default
    /// flags, no clip, no mask, and no parent.
    pub fn create_item(&mut self, kind: ItemKind) -> ItemId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            self.generation[idx as usize] += 1;
            self.parent[idx as usize] = INVALID;
            self.first_child[idx as usize] = INVALID;
            self.next_sibling[idx as usize] = INVALID;
            self.prev_sibling[idx as usize] = INVALID;
            self.clip_item[idx as usize] = INVALID;
            self.mask_item[idx as usize] = INVALID;
            self.attached_to[idx as usize] = INVALID;
            self.bbox_units[idx as usize] = false;
            self.attach_transform[idx as usize] = Affine::IDENTITY;
            self.kind[idx as usize] = kind;
            self.local_transform[idx as usize] = Affine::IDENTITY;
            self.style[idx as usize] = ItemStyle::default();
            self.flags[idx as usize] = ItemFlags::default();
            self.ctm[idx as usize] = Affine::IDENTITY;
            self.item_bounds[idx as usize] = None;
            self.geometric_bbox[idx as usize] = None;
            self.visual_bbox[idx as usize] = None;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.clip_item.push(INVALID);
            self.mask_item.push(INVALID);
            self.attached_to.push(INVALID);
            self.bbox_units.push(false);
            self.attach_transform.push(Affine::IDENTITY);
            self.kind.push(kind);
            self.local_transform.push(Affine::IDENTITY);
            self.style.push(ItemStyle::default());
            self.flags.push(ItemFlags::default());
            self.ctm.push(Affine::IDENTITY);
            self.item_bounds.push(None);
            self.geometric_bbox.push(None);
            self.visual_bbox.push(None);
            self.generation.push(0);
            idx
        };

        self.traversal_dirty = true;
        self.pending_added.push(idx);
        // The realized bounds become damage once the first update computes
        // them.
        self.note_mutation(idx, idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        // First update must realize the transform and bbox.
        self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
        self.dirty.mark_with(idx, dirty::BBOX, &EagerPolicy);

        ItemId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys an item, freeing its slot for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the item has children or owns a clip/mask item (use
    /// [`destroy_subtree`](Self::destroy_subtree)), or if the handle is
    /// stale.
    pub fn destroy_item(&mut self, id: ItemId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy item with children"
        );
        assert!(
            self.clip_item[idx as usize] == INVALID && self.mask_item[idx as usize] == INVALID,
            "cannot destroy item that owns a clip or mask"
        );

        // The vacated area must repaint; anchor the damage at the parent so
        // ancestor caches see it after the slot is gone.
        let damage_anchor = self.effective_parent(idx);
        if let Some(area) =
            self.visual_bbox[idx as usize].and_then(crate::geom::IntRect::round_out)
        {
            self.pending_damage.push(super::update::ItemDamage {
                idx: damage_anchor,
                area,
            });
        }

        // Remove from parent's child list if attached.
        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.dirty.remove_dependency(idx, p, dirty::TRANSFORM);
            self.dirty.remove_dependency(p, idx, dirty::BBOX);
            self.dirty.mark_with(p, dirty::BBOX, &EagerPolicy);
        }

        // Detach from a clip/mask owner if used as one.
        if self.attached_to[idx as usize] != INVALID {
            let owner = self.attached_to[idx as usize];
            if self.clip_item[owner as usize] == idx {
                self.clip_item[owner as usize] = INVALID;
            }
            if self.mask_item[owner as usize] == idx {
                self.mask_item[owner as usize] = INVALID;
            }
            self.dirty.remove_dependency(idx, owner, dirty::TRANSFORM);
            self.dirty.remove_dependency(owner, idx, dirty::BBOX);
            self.dirty.mark_with(owner, dirty::BBOX, &EagerPolicy);
            self.attached_to[idx as usize] = INVALID;
        }

        // Remove dirty tracking dependencies.
        self.dirty.remove_key(idx);

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;

        self.free_list.push(idx);
        self.traversal_dirty = true;
        self.pending_removed.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);
    }

    /// Destroys an item together with its children and attached clip/mask
    /// subtrees, bottom-up.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_subtree(&mut self, id: ItemId) {
        self.validate(id);
        let idx = id.idx;

        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            let next = self.next_sibling[child as usize];
            self.destroy_subtree(self.id_at(child));
            child = next;
        }
        if self.clip_item[idx as usize] != INVALID {
            self.destroy_subtree(self.id_at(self.clip_item[idx as usize]));
        }
        if self.mask_item[idx as usize] != INVALID {
            self.destroy_subtree(self.id_at(self.mask_item[idx as usize]));
        }
        self.destroy_item(self.id_at(idx));
    }

    /// Returns whether the given handle refers to a live item.
    #[must_use]
    pub fn is_alive(&self, id: ItemId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent` (topmost in paint order).
    ///
    /// Marks the child's subtree for transform recomputation and the new
    /// ancestry for bbox recomputation.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, if `child` already has a parent, or
    /// if `child` is attached as a clip/mask.
    pub fn add_child(&mut self, parent: ItemId, child: ItemId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        assert!(
            self.attached_to[c as usize] == INVALID,
            "clip/mask items cannot be parented"
        );

        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            // Walk to last child.
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        self.link_dirty_edges(c, p);
        self.note_mutation(c, p);
        self.mark_subtree_inherited_dirty(c);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Removes `child` from its current parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the item has no parent.
    pub fn remove_from_parent(&mut self, child: ItemId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "item has no parent");

        let p = self.parent[c as usize];
        self.note_mutation(c, p);
        self.unlink_from_parent(c);
        self.unlink_dirty_edges(c, p);

        self.mark_subtree_inherited_dirty(c);
        // The old parent's union shrinks.
        self.dirty.mark_with(p, dirty::BBOX, &EagerPolicy);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Moves `child` to be the last child of `new_parent`.
    ///
    /// If `child` already has a parent, it is removed first.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or `child` is attached as a
    /// clip/mask.
    pub fn reparent(&mut self, child: ItemId, new_parent: ItemId) {
        self.validate(child);
        self.validate(new_parent);
        assert!(
            self.attached_to[child.idx as usize] == INVALID,
            "clip/mask items cannot be parented"
        );

        if self.parent[child.idx as usize] != INVALID {
            let old_p = self.parent[child.idx as usize];
            self.note_mutation(child.idx, old_p);
            self.unlink_from_parent(child.idx);
            self.unlink_dirty_edges(child.idx, old_p);
            self.dirty.mark_with(old_p, dirty::BBOX, &EagerPolicy);
            self.dirty.mark(old_p, dirty::TOPOLOGY);
        }

        // Now add as child of new parent (inline the logic to avoid
        // double-validate).
        let p = new_parent.idx;
        let c = child.idx;
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        self.link_dirty_edges(c, p);
        self.note_mutation(c, p);
        self.mark_subtree_inherited_dirty(c);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Inserts `child` before `sibling` in the sibling list (painting just
    /// below it).
    ///
    /// `child` must not already have a parent. `sibling` must have a parent.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent or is
    /// attached as a clip/mask, or `sibling` has no parent.
    pub fn insert_before(&mut self, child: ItemId, sibling: ItemId) {
        self.validate(child);
        self.validate(sibling);
        let c = child.idx;
        let s = sibling.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        assert!(
            self.attached_to[c as usize] == INVALID,
            "clip/mask items cannot be parented"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];

        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            // `sibling` was the first child.
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        self.link_dirty_edges(c, p);
        self.note_mutation(c, p);
        self.mark_subtree_inherited_dirty(c);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Returns the parent of an item, if any.
    #[must_use]
    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children of an item in paint
    /// order (bottom to top).
    #[must_use]
    pub fn children(&self, id: ItemId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the root items: those with no parent and no clip/mask owner.
    #[must_use]
    pub fn roots(&self) -> Vec<ItemId> {
        let mut roots = Vec::new();
        for idx in 0..self.len {
            if self.parent[idx as usize] == INVALID
                && self.attached_to[idx as usize] == INVALID
                && !self.free_list.contains(&idx)
            {
                roots.push(self.id_at(idx));
            }
        }
        roots
    }

    // -- Clip/mask attachment --

    /// Installs (or removes) the clip subtree of `owner`.
    ///
    /// The clip item is owned exclusively: it must have no parent and no
    /// other owner. Its device transform derives from `owner`'s.
    ///
    /// # Panics
    ///
    /// Panics on stale handles or when the clip item is already in use.
    pub fn set_clip_item(&mut self, owner: ItemId, clip: Option<ItemId>) {
        self.validate(owner);
        let old = self.clip_item[owner.idx as usize];
        if old != INVALID {
            self.detach(owner.idx, old);
        }
        if let Some(clip) = clip {
            self.attach(owner.idx, clip);
            self.clip_item[owner.idx as usize] = clip.idx;
        }
        self.note_mutation(owner.idx, owner.idx);
        self.dirty.mark_with(owner.idx, dirty::BBOX, &EagerPolicy);
        self.traversal_dirty = true;
        self.dirty.mark(owner.idx, dirty::TOPOLOGY);
    }

    /// Installs (or removes) the mask subtree of `owner`.
    ///
    /// # Panics
    ///
    /// Panics on stale handles or when the mask item is already in use.
    pub fn set_mask_item(&mut self, owner: ItemId, mask: Option<ItemId>) {
        self.validate(owner);
        let old = self.mask_item[owner.idx as usize];
        if old != INVALID {
            self.detach(owner.idx, old);
        }
        if let Some(mask) = mask {
            self.attach(owner.idx, mask);
            self.mask_item[owner.idx as usize] = mask.idx;
        }
        self.note_mutation(owner.idx, owner.idx);
        self.dirty.mark_with(owner.idx, dirty::BBOX, &EagerPolicy);
        self.traversal_dirty = true;
        self.dirty.mark(owner.idx, dirty::TOPOLOGY);
    }

    /// Requests (or cancels) objectBoundingBox-unit scaling for an attached
    /// clip/mask item: its geometry is then interpreted in a unit square
    /// mapped onto the owner's geometric bounds, rederived whenever those
    /// bounds change.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the item is not attached as a
    /// clip/mask.
    pub fn set_bbox_units(&mut self, id: ItemId, enabled: bool) {
        self.validate(id);
        assert!(
            self.attached_to[id.idx as usize] != INVALID,
            "bbox units only apply to attached clip/mask items"
        );
        self.bbox_units[id.idx as usize] = enabled;
        if !enabled {
            self.attach_transform[id.idx as usize] = Affine::IDENTITY;
        }
        let owner = self.attached_to[id.idx as usize];
        self.note_mutation(owner, owner);
        self.dirty.mark_with(id.idx, dirty::TRANSFORM, &EagerPolicy);
    }

    /// Returns the clip item of `id`, if any.
    #[must_use]
    pub fn clip_item(&self, id: ItemId) -> Option<ItemId> {
        self.validate(id);
        let c = self.clip_item[id.idx as usize];
        (c != INVALID).then(|| self.id_at(c))
    }

    /// Returns the mask item of `id`, if any.
    #[must_use]
    pub fn mask_item(&self, id: ItemId) -> Option<ItemId> {
        self.validate(id);
        let m = self.mask_item[id.idx as usize];
        (m != INVALID).then(|| self.id_at(m))
    }

    // -- Property getters (read-only, no dirty marking) --

    /// Returns the local transform of an item.
    #[must_use]
    pub fn transform(&self, id: ItemId) -> Affine {
        self.validate(id);
        self.local_transform[id.idx as usize]
    }

    /// Returns the style of an item.
    #[must_use]
    pub fn style(&self, id: ItemId) -> &ItemStyle {
        self.validate(id);
        &self.style[id.idx as usize]
    }

    /// Returns the flags of an item.
    #[must_use]
    pub fn flags(&self, id: ItemId) -> ItemFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Returns the kind payload of an item.
    #[must_use]
    pub fn kind(&self, id: ItemId) -> &ItemKind {
        self.validate(id);
        &self.kind[id.idx as usize]
    }

    /// Returns the computed item → device transform.
    ///
    /// Only valid after [`update`](Self::update) has been called.
    #[must_use]
    pub fn ctm(&self, id: ItemId) -> Affine {
        self.validate(id);
        self.ctm[id.idx as usize]
    }

    /// Returns the computed device-space fill extent, or `None` when
    /// degenerate.
    ///
    /// Only valid after [`update`](Self::update) has been called.
    #[must_use]
    pub fn geometric_bbox(&self, id: ItemId) -> Option<Rect> {
        self.validate(id);
        self.geometric_bbox[id.idx as usize]
    }

    /// Returns the computed device-space rendered extent (stroke included,
    /// clip/mask applied), or `None` when nothing would be painted.
    ///
    /// Only valid after [`update`](Self::update) has been called.
    #[must_use]
    pub fn visual_bbox(&self, id: ItemId) -> Option<Rect> {
        self.validate(id);
        self.visual_bbox[id.idx as usize]
    }

    // -- Mutation API (auto-marks dirty) --

    /// Sets the local transform of an item.
    ///
    /// Marks the TRANSFORM channel dirty with eager propagation to
    /// descendants; bounding-box consequences are derived during update.
    pub fn set_transform(&mut self, id: ItemId, transform: Affine) {
        self.validate(id);
        self.local_transform[id.idx as usize] = transform;
        // The moved item's caches ride along; ancestors repaint.
        self.note_mutation(id.idx, self.effective_parent(id.idx));
        self.dirty.mark_with(id.idx, dirty::TRANSFORM, &EagerPolicy);
    }

    /// Replaces the style of an item.
    ///
    /// Style changes repaint; stroke width also moves the visual bounds, so
    /// the BBOX channel is marked as well.
    pub fn set_style(&mut self, id: ItemId, style: ItemStyle) {
        self.validate(id);
        self.style[id.idx as usize] = style;
        self.note_mutation(id.idx, id.idx);
        self.dirty.mark(id.idx, dirty::STYLE);
        self.dirty.mark_with(id.idx, dirty::BBOX, &EagerPolicy);
    }

    /// Sets the flags of an item.
    pub fn set_flags(&mut self, id: ItemId, flags: ItemFlags) {
        self.validate(id);
        self.flags[id.idx as usize] = flags;
        self.note_mutation(id.idx, id.idx);
        self.dirty.mark(id.idx, dirty::STYLE);
    }

    /// Replaces the path of a shape item.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the item is not a shape.
    pub fn set_shape(&mut self, id: ItemId, shape: ShapeData) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            ItemKind::Shape(data) => *data = shape,
            _ => panic!("set_shape on non-shape item"),
        }
        self.note_mutation(id.idx, id.idx);
        self.dirty.mark(id.idx, dirty::CONTENT);
        self.dirty.mark_with(id.idx, dirty::BBOX, &EagerPolicy);
    }

    /// Replaces the source and destination rect of an image item.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the item is not an image.
    pub fn set_image(&mut self, id: ItemId, image: super::kind::ImageData) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            ItemKind::Image(data) => *data = image,
            _ => panic!("set_image on non-image item"),
        }
        self.note_mutation(id.idx, id.idx);
        self.dirty.mark(id.idx, dirty::CONTENT);
        self.dirty.mark_with(id.idx, dirty::BBOX, &EagerPolicy);
    }

    /// Installs an extra transform applied to a group's children only,
    /// composed between the group's own transform and the children's
    /// transforms.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the item is not a group.
    pub fn set_child_transform(&mut self, id: ItemId, transform: Option<Affine>) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            ItemKind::Group(data) => data.child_transform = transform,
            _ => panic!("set_child_transform on non-group item"),
        }
        // Children move relative to the group, so the group's own cached
        // pixels are stale too.
        self.note_mutation(id.idx, id.idx);
        // The group's own ctm is unaffected but every descendant's is.
        self.dirty.mark_with(id.idx, dirty::TRANSFORM, &EagerPolicy);
    }

    /// Controls whether hit-testing descends into a group's children or the
    /// group picks as a unit.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the item is not a group.
    pub fn set_pick_children(&mut self, id: ItemId, pick_children: bool) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            ItemKind::Group(data) => data.pick_children = pick_children,
            _ => panic!("set_pick_children on non-group item"),
        }
    }

    // -- Raw-index accessors for renderer consumption --
    //
    // These accept raw slot indices (as found in `UpdateChanges`) rather
    // than `ItemId` handles, skipping generation validation. Only use with
    // indices that came from `UpdateChanges` or `traversal_order()`.

    /// Returns the device transform at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn ctm_at(&self, idx: u32) -> Affine {
        self.check_slot(idx);
        self.ctm[idx as usize]
    }

    /// Returns the visual bbox at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn visual_bbox_at(&self, idx: u32) -> Option<Rect> {
        self.check_slot(idx);
        self.visual_bbox[idx as usize]
    }

    /// Returns the geometric bbox at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn geometric_bbox_at(&self, idx: u32) -> Option<Rect> {
        self.check_slot(idx);
        self.geometric_bbox[idx as usize]
    }

    /// Returns the style at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn style_at(&self, idx: u32) -> &ItemStyle {
        self.check_slot(idx);
        &self.style[idx as usize]
    }

    /// Returns the flags at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn flags_at(&self, idx: u32) -> ItemFlags {
        self.check_slot(idx);
        self.flags[idx as usize]
    }

    /// Returns the kind payload at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn kind_at(&self, idx: u32) -> &ItemKind {
        self.check_slot(idx);
        &self.kind[idx as usize]
    }

    /// Returns the parent slot at raw slot `idx` (`INVALID` for roots).
    ///
    /// Attached clip/mask items report their owner, so ancestor walks cover
    /// the full damage chain.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn parent_at(&self, idx: u32) -> u32 {
        self.check_slot(idx);
        if self.parent[idx as usize] != INVALID {
            self.parent[idx as usize]
        } else {
            self.attached_to[idx as usize]
        }
    }

    /// Reconstructs the current handle for raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn id_at(&self, idx: u32) -> ItemId {
        self.check_slot(idx);
        ItemId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: ItemId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale ItemId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    fn check_slot(&self, idx: u32) {
        assert!(
            idx < self.len,
            "slot index {idx} out of range (len {})",
            self.len
        );
    }

    /// Removes `idx` from its parent's child list without touching dirty
    /// state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    /// Adds the dirty dependency edges for a child-of-parent (or
    /// attached-to-owner) relation: transforms flow down, bboxes flow up.
    fn link_dirty_edges(&mut self, child: u32, parent: u32) {
        let _ = self.dirty.add_dependency(child, parent, dirty::TRANSFORM);
        let _ = self.dirty.add_dependency(parent, child, dirty::BBOX);
    }

    fn unlink_dirty_edges(&mut self, child: u32, parent: u32) {
        self.dirty.remove_dependency(child, parent, dirty::TRANSFORM);
        self.dirty.remove_dependency(parent, child, dirty::BBOX);
    }

    /// Marks the subtree rooted at `idx` dirty for inherited channels.
    fn mark_subtree_inherited_dirty(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::TRANSFORM, &EagerPolicy);
        self.dirty.mark_with(idx, dirty::BBOX, &EagerPolicy);
    }

    /// The slot whose ctm this item composes against: tree parent, clip/mask
    /// owner, or `INVALID` for roots.
    pub(crate) fn effective_parent(&self, idx: u32) -> u32 {
        if self.parent[idx as usize] != INVALID {
            self.parent[idx as usize]
        } else {
            self.attached_to[idx as usize]
        }
    }

    /// Records repaint damage for a mutation of `item`: its pre-update
    /// bounds now, its post-update bounds when the next update settles.
    ///
    /// `anchor` names the slot whose cache — and whose ancestors' caches —
    /// the damage invalidates. A transform mutation anchors at the parent
    /// (the moved item's own cache content rides along through a scheduled
    /// re-projection); paint and structural mutations anchor at the item
    /// itself. `INVALID` means repaint only.
    pub(crate) fn note_mutation(&mut self, item: u32, anchor: u32) {
        if let Some(area) =
            self.visual_bbox[item as usize].and_then(crate::geom::IntRect::round_out)
        {
            self.pending_damage
                .push(super::update::ItemDamage { idx: anchor, area });
        }
        self.pending_mutations.push((item, anchor));
    }

    fn attach(&mut self, owner: u32, item: ItemId) {
        self.validate(item);
        assert!(
            self.parent[item.idx as usize] == INVALID,
            "clip/mask item must not have a parent"
        );
        assert!(
            self.attached_to[item.idx as usize] == INVALID,
            "clip/mask item already attached"
        );
        self.attached_to[item.idx as usize] = owner;
        self.link_dirty_edges(item.idx, owner);
        self.dirty
            .mark_with(item.idx, dirty::TRANSFORM, &EagerPolicy);
        self.dirty.mark_with(item.idx, dirty::BBOX, &EagerPolicy);
    }

    fn detach(&mut self, owner: u32, item: u32) {
        self.clip_item[owner as usize] = if self.clip_item[owner as usize] == item {
            INVALID
        } else {
            self.clip_item[owner as usize]
        };
        self.mask_item[owner as usize] = if self.mask_item[owner as usize] == item {
            INVALID
        } else {
            self.mask_item[owner as usize]
        };
        self.attached_to[item as usize] = INVALID;
        self.bbox_units[item as usize] = false;
        self.attach_transform[item as usize] = Affine::IDENTITY;
        self.unlink_dirty_edges(item, owner);
        self.dirty.mark_with(item, dirty::TRANSFORM, &EagerPolicy);
    }

    /// Group data accessor used by the traversals.
    pub(crate) fn group_data(&self, idx: u32) -> Option<&GroupData> {
        match &self.kind[idx as usize] {
            ItemKind::Group(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn create_and_destroy() {
        let mut store = DrawingStore::new();
        let id = store.create_item(ItemKind::group());
        assert!(store.is_alive(id));
        store.destroy_item(id);
        assert!(!store.is_alive(id));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = DrawingStore::new();
        let id1 = store.create_item(ItemKind::group());
        store.destroy_item(id1);
        let id2 = store.create_item(ItemKind::group());
        // id2 reuses the same slot but has a different generation.
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn add_child_and_query() {
        let mut store = DrawingStore::new();
        let parent = store.create_item(ItemKind::group());
        let child1 = store.create_item(ItemKind::group());
        let child2 = store.create_item(ItemKind::group());

        store.add_child(parent, child1);
        store.add_child(parent, child2);

        assert_eq!(store.parent(child1), Some(parent));
        assert_eq!(store.parent(child2), Some(parent));

        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, vec![child1, child2]);
    }

    #[test]
    fn insert_before_works() {
        let mut store = DrawingStore::new();
        let parent = store.create_item(ItemKind::group());
        let a = store.create_item(ItemKind::group());
        let b = store.create_item(ItemKind::group());
        let c = store.create_item(ItemKind::group());

        store.add_child(parent, a);
        store.add_child(parent, c);
        store.insert_before(b, c);

        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, vec![a, b, c]);
    }

    #[test]
    fn reparent_works() {
        let mut store = DrawingStore::new();
        let p1 = store.create_item(ItemKind::group());
        let p2 = store.create_item(ItemKind::group());
        let child = store.create_item(ItemKind::group());

        store.add_child(p1, child);
        assert_eq!(store.parent(child), Some(p1));

        store.reparent(child, p2);
        assert_eq!(store.parent(child), Some(p2));
        assert!(store.children(p1).next().is_none());
    }

    #[test]
    fn roots_excludes_children_and_attached_items() {
        let mut store = DrawingStore::new();
        let a = store.create_item(ItemKind::group());
        let b = store.create_item(ItemKind::group());
        let c = store.create_item(ItemKind::group());
        let clip = store.create_item(ItemKind::shape(kurbo::BezPath::new()));

        store.add_child(a, c);
        store.set_clip_item(b, Some(clip));

        let roots = store.roots();
        assert!(roots.contains(&a));
        assert!(roots.contains(&b));
        assert!(!roots.contains(&c));
        assert!(!roots.contains(&clip));
    }

    #[test]
    #[should_panic(expected = "cannot destroy item with children")]
    fn destroy_with_children_panics() {
        let mut store = DrawingStore::new();
        let parent = store.create_item(ItemKind::group());
        let child = store.create_item(ItemKind::group());
        store.add_child(parent, child);
        store.destroy_item(parent);
    }

    #[test]
    fn destroy_subtree_tears_down_clip_and_mask() {
        let mut store = DrawingStore::new();
        let group = store.create_item(ItemKind::group());
        let child = store.create_item(ItemKind::shape(kurbo::BezPath::new()));
        let clip = store.create_item(ItemKind::shape(kurbo::BezPath::new()));
        store.add_child(group, child);
        store.set_clip_item(group, Some(clip));

        store.destroy_subtree(group);
        assert!(!store.is_alive(group));
        assert!(!store.is_alive(child));
        assert!(!store.is_alive(clip));
    }

    #[test]
    #[should_panic(expected = "stale ItemId")]
    fn destroyed_handle_panics_on_set_transform() {
        let mut store = DrawingStore::new();
        let id = store.create_item(ItemKind::group());
        store.destroy_item(id);
        store.set_transform(id, Affine::IDENTITY);
    }

    #[test]
    #[should_panic(expected = "clip/mask item already attached")]
    fn clip_item_cannot_serve_two_owners() {
        let mut store = DrawingStore::new();
        let a = store.create_item(ItemKind::group());
        let b = store.create_item(ItemKind::group());
        let clip = store.create_item(ItemKind::shape(kurbo::BezPath::new()));
        store.set_clip_item(a, Some(clip));
        store.set_mask_item(b, Some(clip));
    }

    #[test]
    fn replacing_clip_detaches_old_one() {
        let mut store = DrawingStore::new();
        let owner = store.create_item(ItemKind::group());
        let clip1 = store.create_item(ItemKind::shape(kurbo::BezPath::new()));
        let clip2 = store.create_item(ItemKind::shape(kurbo::BezPath::new()));

        store.set_clip_item(owner, Some(clip1));
        store.set_clip_item(owner, Some(clip2));
        assert_eq!(store.clip_item(owner), Some(clip2));

        // clip1 is free again and can be attached elsewhere.
        let other = store.create_item(ItemKind::group());
        store.set_clip_item(other, Some(clip1));
        assert_eq!(store.clip_item(other), Some(clip1));
    }

    #[test]
    #[should_panic(expected = "clip/mask items cannot be parented")]
    fn attached_item_cannot_be_added_as_child() {
        let mut store = DrawingStore::new();
        let owner = store.create_item(ItemKind::group());
        let clip = store.create_item(ItemKind::shape(kurbo::BezPath::new()));
        store.set_clip_item(owner, Some(clip));
        store.add_child(owner, clip);
    }

    #[test]
    #[should_panic(expected = "set_shape on non-shape item")]
    fn set_shape_on_group_panics() {
        let mut store = DrawingStore::new();
        let id = store.create_item(ItemKind::group());
        store.set_shape(
            id,
            ShapeData {
                path: kurbo::BezPath::new(),
                fill_rule: crate::style::FillRule::NonZero,
            },
        );
    }
}
