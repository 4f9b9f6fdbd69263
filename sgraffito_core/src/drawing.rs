// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The arena root: view keys, per-view roots, and redraw dispatch.
//!
//! A [`Drawing`] owns one [`DrawingStore`] and the bookkeeping that sits
//! above it:
//!
//! - **View keys** — each independent display of the document (canvas,
//!   thumbnail, export) reserves a block of keys via
//!   [`new_display_keys`](Drawing::new_display_keys) and realizes one item
//!   subtree per key. Elements that need several parallel per-view states
//!   (the item itself, its clip, its mask) reserve a span of consecutive
//!   keys.
//! - **Redraw accumulation** — update damage and explicit
//!   [`request_render`](Drawing::request_render) calls collect into a rect
//!   list the embedding drains with [`take_redraw`](Drawing::take_redraw)
//!   and turns into expose/repaint events. There is no callback wiring; the
//!   caller polls after each mutation batch.
//! - **Cache-keep rectangle** — [`set_cache_limit`](Drawing::set_cache_limit)
//!   pads the visible viewport so that small scrolls do not immediately
//!   evict item caches.
//! - **Pick hysteresis** — [`pick`](Drawing::pick) with `sticky` keeps
//!   returning the previous hit while it still tests positive, so hover
//!   targets do not flicker on boundaries. Diffing consecutive results into
//!   enter/leave events is the caller's job.

use alloc::vec::Vec;

use kurbo::Point;

use crate::geom::IntRect;
use crate::item::{DrawingStore, ItemId, UpdateChanges, ViewKey};
use crate::trace::{Tracer, UpdateSummary};

/// Fraction of the viewport extent added on each side of the cache-keep
/// rectangle, trading memory for scroll smoothness: caches survive scrolls
/// up to half a viewport before eviction.
pub const CACHE_PAD_FRACTION: f64 = 0.5;

/// The root container owning the item tree and per-view bookkeeping.
#[derive(Debug)]
pub struct Drawing {
    store: DrawingStore,
    next_key: u32,
    view_roots: Vec<(ViewKey, ItemId)>,
    cache_limit: Option<IntRect>,
    redraw: Vec<IntRect>,
    last_pick: Option<ItemId>,
}

impl Default for Drawing {
    fn default() -> Self {
        Self::new()
    }
}

impl Drawing {
    /// Creates an empty drawing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DrawingStore::new(),
            next_key: 0,
            view_roots: Vec::new(),
            cache_limit: None,
            redraw: Vec::new(),
            last_pick: None,
        }
    }

    /// Read access to the item store.
    #[must_use]
    pub fn store(&self) -> &DrawingStore {
        &self.store
    }

    /// Mutable access to the item store (building and mutating the tree).
    #[must_use]
    pub fn store_mut(&mut self) -> &mut DrawingStore {
        &mut self.store
    }

    // -- View keys --

    /// Reserves a block of `span` consecutive view keys and returns the
    /// first one.
    ///
    /// # Panics
    ///
    /// Panics if `span` is zero.
    pub fn new_display_keys(&mut self, span: u32) -> ViewKey {
        assert!(span > 0, "key span must be positive");
        let base = self.next_key;
        self.next_key += span;
        ViewKey(base)
    }

    /// Registers (or replaces) the root item realized for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn set_view_root(&mut self, key: ViewKey, root: ItemId) {
        self.store.validate(root);
        if let Some(entry) = self.view_roots.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = root;
        } else {
            self.view_roots.push((key, root));
        }
    }

    /// Returns the root item realized for `key`, if any.
    #[must_use]
    pub fn view_root(&self, key: ViewKey) -> Option<ItemId> {
        self.view_roots
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, root)| *root)
    }

    /// Tears down the view realized for `key`, destroying its subtree.
    ///
    /// The vacated area lands in the redraw region on the next
    /// [`update`](Self::update).
    pub fn hide_view(&mut self, key: ViewKey) {
        if let Some(pos) = self.view_roots.iter().position(|(k, _)| *k == key) {
            let (_, root) = self.view_roots.swap_remove(pos);
            if self.store.is_alive(root) {
                self.store.destroy_subtree(root);
            }
            if self.last_pick.is_some_and(|p| !self.store.is_alive(p)) {
                self.last_pick = None;
            }
        }
    }

    // -- Update and redraw dispatch --

    /// Updates the tree and folds the resulting damage into the redraw
    /// region.
    pub fn update(&mut self) -> UpdateChanges {
        self.update_traced(&mut Tracer::none())
    }

    /// Like [`update`](Self::update), with traversal instrumentation.
    pub fn update_traced(&mut self, tracer: &mut Tracer<'_>) -> UpdateChanges {
        tracer.update_begin();
        let changes = self.store.update();
        for damage in &changes.damage {
            self.push_redraw(damage.area);
        }
        tracer.update_end(&UpdateSummary::of(&changes));
        #[cfg(feature = "trace-rich")]
        tracer.damage_rects(&changes.damage);
        changes
    }

    /// Schedules an explicit repaint of a device-space area (style flashes,
    /// overlay invalidation).
    pub fn request_render(&mut self, area: IntRect) {
        self.push_redraw(area);
    }

    /// Drains the accumulated redraw region.
    pub fn take_redraw(&mut self) -> Vec<IntRect> {
        core::mem::take(&mut self.redraw)
    }

    fn push_redraw(&mut self, area: IntRect) {
        // Coalesce trivially contained rects; the renderer tiles anyway.
        if let Some(last) = self.redraw.last_mut() {
            if last.contains_rect(area) {
                return;
            }
            if area.contains_rect(*last) {
                *last = area;
                return;
            }
        }
        self.redraw.push(area);
    }

    // -- Cache limit --

    /// Sets the visible viewport, from which the cache-keep rectangle is
    /// derived by padding each side with [`CACHE_PAD_FRACTION`] of the
    /// extent. `None` disables caching entirely.
    pub fn set_cache_limit(&mut self, viewport: Option<IntRect>) {
        self.cache_limit = viewport.map(|v| {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "half of an i32 extent fits in i32"
            )]
            let pad_x = (f64::from(v.width()) * CACHE_PAD_FRACTION) as i32;
            #[allow(
                clippy::cast_possible_truncation,
                reason = "half of an i32 extent fits in i32"
            )]
            let pad_y = (f64::from(v.height()) * CACHE_PAD_FRACTION) as i32;
            IntRect {
                x0: v.x0.saturating_sub(pad_x),
                y0: v.y0.saturating_sub(pad_y),
                x1: v.x1.saturating_add(pad_x),
                y1: v.y1.saturating_add(pad_y),
            }
        });
    }

    /// The current cache-keep rectangle (padded viewport), if any.
    #[must_use]
    pub fn cache_limit(&self) -> Option<IntRect> {
        self.cache_limit
    }

    // -- Picking --

    /// Finds the topmost item at `point` for the view rooted at `key`,
    /// within `delta` device pixels.
    ///
    /// With `sticky`, the previous hit is retained while it still tests
    /// positive at `point` (hover hysteresis). The update-before-pick
    /// protocol applies.
    pub fn pick(
        &mut self,
        key: ViewKey,
        point: Point,
        delta: f64,
        sticky: bool,
    ) -> Option<ItemId> {
        self.pick_traced(key, point, delta, sticky, &mut Tracer::none())
    }

    /// Like [`pick`](Self::pick), with traversal instrumentation.
    pub fn pick_traced(
        &mut self,
        key: ViewKey,
        point: Point,
        delta: f64,
        sticky: bool,
        tracer: &mut Tracer<'_>,
    ) -> Option<ItemId> {
        let hit = if sticky
            && let Some(previous) = self.last_pick
            && self.store.still_hits(previous, point, delta)
        {
            Some(previous)
        } else {
            self.view_root(key)
                .and_then(|root| self.store.pick_from(root, point, delta))
        };
        self.last_pick = hit;
        tracer.pick(point, delta, hit.map(ItemId::index));
        hit
    }
}
