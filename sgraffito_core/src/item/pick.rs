// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The pick traversal: point → topmost item, within a tolerance.
//!
//! Picking walks the tree in reverse paint order (topmost child first) and
//! returns the deepest item whose actual paint — not just its bounding
//! box — covers the query point. Bounding boxes (inflated by the tolerance)
//! serve only as a fast reject. Groups configured to pick as a unit report
//! themselves instead of a descendant.
//!
//! Precise leaf tests run in item-local coordinates: the query point is
//! pulled back through the item's device transform and tested against fill
//! containment (by fill rule) and stroke distance, with the tolerance
//! rescaled into local units.
//!
//! The update-before-pick protocol applies: bounding boxes and device
//! transforms must be current, or picking sees stale geometry.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{ParamCurveNearest as _, Point, Shape as _};

use crate::style::FillRule;

use super::id::{INVALID, ItemId};
use super::kind::{ItemKind, ShapeData};
use super::store::{DrawingStore, ItemFlags};
use super::traverse::ChildrenRev;

/// Accuracy for nearest-point queries against path segments.
const NEAREST_ACCURACY: f64 = 1e-6;

impl DrawingStore {
    /// Finds the topmost item at `point` (device space) in the subtree
    /// rooted at `root`, within `delta` device pixels.
    ///
    /// Returns `None` when nothing is hit. Invisible and insensitive items
    /// (and their subtrees) never hit.
    #[must_use]
    pub fn pick_from(&self, root: ItemId, point: Point, delta: f64) -> Option<ItemId> {
        self.validate(root);
        self.pick_item(root.idx, point, delta).map(|idx| self.id_at(idx))
    }

    /// Re-tests whether a previously picked item still hits at `point`.
    ///
    /// Used for pick hysteresis; unlike [`pick_from`](Self::pick_from) this
    /// does not descend below `id`.
    #[must_use]
    pub(crate) fn still_hits(&self, id: ItemId, point: Point, delta: f64) -> bool {
        self.is_alive(id) && self.pick_item(id.idx, point, delta).is_some()
    }

    fn pick_item(&self, idx: u32, point: Point, delta: f64) -> Option<u32> {
        let flags = self.flags[idx as usize];
        if !flags.contains(ItemFlags::VISIBLE) || !flags.contains(ItemFlags::SENSITIVE) {
            return None;
        }

        // Bbox fast reject.
        let bbox = self.visual_bbox[idx as usize]?;
        if !bbox.inflate(delta, delta).contains(point) {
            return None;
        }

        // A point outside the clip shape cannot hit the clipped item.
        let clip = self.clip_item[idx as usize];
        if clip != INVALID && !self.clip_contains(clip, point) {
            return None;
        }

        match &self.kind[idx as usize] {
            ItemKind::Group(group) => {
                for child in ChildrenRev::new(self, idx) {
                    if let Some(hit) = self.pick_item(child, point, delta) {
                        // Non-pick-through groups report the whole group.
                        return Some(if group.pick_children { hit } else { idx });
                    }
                }
                None
            }
            ItemKind::Shape(shape) => {
                let (local, tolerance) = self.to_local(idx, point, delta)?;
                self.shape_hit(idx, shape, local, tolerance).then_some(idx)
            }
            ItemKind::Image(image) => {
                let (local, tolerance) = self.to_local(idx, point, delta)?;
                image
                    .rect
                    .inflate(tolerance, tolerance)
                    .contains(local)
                    .then_some(idx)
            }
        }
    }

    /// Pulls a device point and tolerance back into item-local space.
    ///
    /// Returns `None` for non-invertible transforms (collapsed items are
    /// unpickable).
    fn to_local(&self, idx: u32, point: Point, delta: f64) -> Option<(Point, f64)> {
        let ctm = self.ctm[idx as usize];
        let det = ctm.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let local = ctm.inverse() * point;
        let scale = det.abs().sqrt();
        Some((local, delta / scale))
    }

    fn shape_hit(&self, idx: u32, shape: &ShapeData, local: Point, tolerance: f64) -> bool {
        let style = &self.style[idx as usize];

        if style.fill.is_some() {
            let winding = shape.path.winding(local);
            let inside = match shape.fill_rule {
                FillRule::NonZero => winding != 0,
                FillRule::EvenOdd => winding % 2 != 0,
            };
            if inside {
                return true;
            }
        }

        // Near-miss fills and stroked outlines both reduce to a distance
        // test against the path.
        let stroke_reach = style.stroke.map(|s| s.width / 2.0);
        let fill_reach = style.fill.is_some().then_some(0.0);
        let reach = match (stroke_reach, fill_reach) {
            (Some(s), Some(f)) => s.max(f),
            (Some(s), None) => s,
            (None, Some(f)) => f,
            (None, None) => return false,
        } + tolerance;
        if reach <= 0.0 {
            return false;
        }
        path_distance(&shape.path, local).is_some_and(|d| d <= reach)
    }

    /// Fill-containment test for a clip subtree (strokes and styles are
    /// ignored; clips always test their geometry).
    fn clip_contains(&self, idx: u32, point: Point) -> bool {
        match &self.kind[idx as usize] {
            ItemKind::Group(_) => {
                let mut child = self.first_child[idx as usize];
                while child != INVALID {
                    if self.clip_contains(child, point) {
                        return true;
                    }
                    child = self.next_sibling[child as usize];
                }
                false
            }
            ItemKind::Shape(shape) => {
                let ctm = self.ctm[idx as usize];
                let det = ctm.determinant();
                if det.abs() < 1e-12 || !det.is_finite() {
                    return false;
                }
                let local = ctm.inverse() * point;
                let winding = shape.path.winding(local);
                match shape.fill_rule {
                    FillRule::NonZero => winding != 0,
                    FillRule::EvenOdd => winding % 2 != 0,
                }
            }
            ItemKind::Image(image) => {
                let ctm = self.ctm[idx as usize];
                let det = ctm.determinant();
                if det.abs() < 1e-12 || !det.is_finite() {
                    return false;
                }
                image.rect.contains(ctm.inverse() * point)
            }
        }
    }
}

/// Shortest distance from `point` to the outline of `path`.
fn path_distance(path: &kurbo::BezPath, point: Point) -> Option<f64> {
    let mut best: Option<f64> = None;
    for seg in path.segments() {
        let nearest = seg.nearest(point, NEAREST_ACCURACY);
        let d = nearest.distance_sq;
        best = Some(best.map_or(d, |b: f64| b.min(d)));
    }
    best.map(|d| d.sqrt())
}
