// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disjoint-rectangle region arithmetic in pixel space.
//!
//! [`PixelRegion`] is the clean-region tracker behind
//! [`DrawingCache`](crate::cache::DrawingCache): a set of points represented
//! as non-overlapping rectangles, supporting subtraction (mark dirty), union
//! (mark clean), intersection (clamp to a buffer), whole-region translation
//! (scroll), and full-containment queries. The rectangle count stays small
//! in practice — damage arrives as a handful of rects per frame — so the
//! representation favors simplicity over banding.

use sgraffito_core::geom::IntRect;

/// A set of pixels stored as disjoint rectangles.
#[derive(Clone, Debug, Default)]
pub struct PixelRegion {
    rects: Vec<IntRect>,
}

impl PixelRegion {
    /// Creates an empty region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region covering one rectangle.
    #[must_use]
    pub fn from_rect(rect: IntRect) -> Self {
        Self { rects: vec![rect] }
    }

    /// Whether the region contains no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Removes every pixel.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// The disjoint rectangles making up the region, in no particular order.
    #[must_use]
    pub fn rects(&self) -> &[IntRect] {
        &self.rects
    }

    /// Total number of pixels covered.
    #[must_use]
    pub fn area(&self) -> u64 {
        self.rects
            .iter()
            .map(|r| u64::from(r.width().unsigned_abs()) * u64::from(r.height().unsigned_abs()))
            .sum()
    }

    /// Removes `rect` from the region.
    pub fn subtract_rect(&mut self, rect: IntRect) {
        let mut out = Vec::with_capacity(self.rects.len() + 3);
        for &r in &self.rects {
            subtract_into(r, rect, &mut out);
        }
        self.rects = out;
    }

    /// Adds `rect` to the region.
    pub fn union_rect(&mut self, rect: IntRect) {
        // Keep disjointness: insert only the parts of `rect` not already
        // covered.
        let mut fresh = vec![rect];
        for &existing in &self.rects {
            let mut next = Vec::with_capacity(fresh.len() + 3);
            for piece in fresh {
                subtract_into(piece, existing, &mut next);
            }
            fresh = next;
            if fresh.is_empty() {
                return;
            }
        }
        self.rects.extend(fresh);
    }

    /// Clamps the region to `rect`.
    pub fn intersect_rect(&mut self, rect: IntRect) {
        self.rects = self
            .rects
            .iter()
            .filter_map(|r| r.intersect(rect))
            .collect();
    }

    /// Moves every pixel by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for r in &mut self.rects {
            *r = r.translated(dx, dy);
        }
    }

    /// Whether `rect` is entirely covered by the region.
    ///
    /// Partial overlap counts as not contained.
    #[must_use]
    pub fn contains_rect(&self, rect: IntRect) -> bool {
        let mut uncovered = vec![rect];
        for &r in &self.rects {
            let mut next = Vec::with_capacity(uncovered.len() + 3);
            for piece in uncovered {
                subtract_into(piece, r, &mut next);
            }
            uncovered = next;
            if uncovered.is_empty() {
                return true;
            }
        }
        false
    }

    /// Whether the pixel at `(x, y)` is in the region.
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }
}

/// Pushes `a − b` (up to four rectangles) into `out`.
fn subtract_into(a: IntRect, b: IntRect, out: &mut Vec<IntRect>) {
    let Some(overlap) = a.intersect(b) else {
        out.push(a);
        return;
    };
    // Bands above and below the overlap, full width of `a`.
    if let Some(top) = IntRect::new(a.x0, a.y0, a.x1, overlap.y0) {
        out.push(top);
    }
    if let Some(bottom) = IntRect::new(a.x0, overlap.y1, a.x1, a.y1) {
        out.push(bottom);
    }
    // Side slivers limited to the overlap's vertical extent.
    if let Some(left) = IntRect::new(a.x0, overlap.y0, overlap.x0, overlap.y1) {
        out.push(left);
    }
    if let Some(right) = IntRect::new(overlap.x1, overlap.y0, a.x1, overlap.y1) {
        out.push(right);
    }
}
