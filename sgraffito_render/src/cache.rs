// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clean-region pixel cache with scheduled remapping.
//!
//! A [`DrawingCache`] wraps a [`DrawingSurface`] with a tracker of which
//! pixels accurately reflect current scene content. Rendering consults it
//! through [`paint_from_cache`](DrawingCache::paint_from_cache); a miss
//! falls back to a normal render that refills the missing area.
//!
//! Viewport changes go through a two-phase protocol matching the update →
//! render split: [`schedule_transform`](DrawingCache::schedule_transform)
//! during update records where the cached area is headed, and
//! [`prepare`](DrawingCache::prepare) during render (before painting)
//! applies it with a three-tier strategy:
//!
//! 1. identity transform, unchanged area — nothing to do;
//! 2. whole-pixel translation onto the requested area — translate the clean
//!    region and shift the stored origin, no pixels touched (the common
//!    scroll case);
//! 3. anything else — re-project the old buffer through the transform in
//!    one composite; a translation keeps the (re-aligned, clamped) clean
//!    region, while scaling or rotation discards it entirely, since
//!    resampling breaks pixel-exact correspondence.

use kurbo::{Affine, Point};
use tiny_skia::{BlendMode, FilterQuality, Pixmap, PixmapPaint};

use sgraffito_core::geom::IntRect;
use sgraffito_core::trace::RemapKind;

use crate::context::{DrawingContext, to_ts_transform};
use crate::error::Result;
use crate::region::PixelRegion;
use crate::surface::DrawingSurface;

/// Maximum deviation from a whole-pixel step for a pending translation to
/// take the metadata-only remap path. Translations farther from the pixel
/// grid re-project pixels and keep only a conservatively clamped clean
/// region.
pub const INTEGER_TRANSLATION_EPSILON: f64 = 1e-6;

/// A pixel cache for one item: surface, clean region, and pending remap.
#[derive(Debug)]
pub struct DrawingCache {
    surface: DrawingSurface,
    clean: PixelRegion,
    pending_area: IntRect,
    pending_transform: Affine,
}

impl DrawingCache {
    /// Creates a cache covering `area` (device pixels), fully dirty.
    #[must_use]
    pub fn new(area: IntRect) -> Self {
        Self {
            surface: DrawingSurface::new(area),
            clean: PixelRegion::new(),
            pending_area: area,
            pending_transform: Affine::IDENTITY,
        }
    }

    /// The device pixel area currently covered.
    #[must_use]
    pub fn pixel_area(&self) -> IntRect {
        self.surface.pixel_area()
    }

    /// The underlying surface.
    #[must_use]
    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    // -- Clean-region tracking --

    /// Subtracts `area` from the clean region.
    pub fn mark_dirty(&mut self, area: IntRect) {
        self.clean.subtract_rect(area);
    }

    /// Marks the whole cache dirty.
    pub fn mark_all_dirty(&mut self) {
        self.clean.clear();
    }

    /// Unions `area` (clamped to the buffer) into the clean region.
    pub fn mark_clean(&mut self, area: IntRect) {
        let Some(clamped) = area.intersect(self.pixel_area()) else {
            return;
        };
        self.clean.union_rect(clamped);
    }

    /// Whether `area` is fully covered by clean pixels.
    ///
    /// Partial coverage counts as not clean; callers fall back to a full
    /// repaint of the area.
    #[must_use]
    pub fn is_clean(&self, area: IntRect) -> bool {
        self.clean.contains_rect(area)
    }

    /// The clean region (test and diagnostics access).
    #[must_use]
    pub fn clean_region(&self) -> &PixelRegion {
        &self.clean
    }

    // -- Scheduled remap --

    /// Schedules a remap: the cache should end up covering `new_area`, with
    /// existing content moved through `trans`. Called during the update
    /// phase; nothing touches the pixel buffer until
    /// [`prepare`](Self::prepare).
    ///
    /// Consecutive schedules compose.
    pub fn schedule_transform(&mut self, new_area: IntRect, trans: Affine) {
        self.pending_area = new_area;
        self.pending_transform = trans * self.pending_transform;
    }

    /// Applies the scheduled transform. Call during the render phase,
    /// before painting.
    pub fn prepare(&mut self) -> Result<RemapKind> {
        let old_area = self.pixel_area();
        let is_identity = self.pending_transform == Affine::IDENTITY;
        if is_identity && self.pending_area == old_area {
            return Ok(RemapKind::Noop);
        }

        let coeffs = self.pending_transform.as_coeffs();
        let is_translation = (coeffs[0] - 1.0).abs() <= INTEGER_TRANSLATION_EPSILON
            && coeffs[1].abs() <= INTEGER_TRANSLATION_EPSILON
            && coeffs[2].abs() <= INTEGER_TRANSLATION_EPSILON
            && (coeffs[3] - 1.0).abs() <= INTEGER_TRANSLATION_EPSILON;

        if is_translation {
            #[allow(clippy::cast_possible_truncation, reason = "pixel offsets are small")]
            let (dx, dy) = (coeffs[4].round() as i32, coeffs[5].round() as i32);
            let is_integer = (coeffs[4] - f64::from(dx)).abs() <= INTEGER_TRANSLATION_EPSILON
                && (coeffs[5] - f64::from(dy)).abs() <= INTEGER_TRANSLATION_EPSILON;

            // The clean region rides along with the content in both the
            // cheap and the re-projecting translation paths.
            self.clean.translate(dx, dy);

            if is_integer && old_area.translated(dx, dy) == self.pending_area {
                // Whole-pixel scroll onto the requested area: shift the
                // stored origin, clamp the clean region, done. No pixels
                // are read or written.
                let origin = self.surface.origin();
                self.surface
                    .replace_origin(Point::new(origin.x + f64::from(dx), origin.y + f64::from(dy)));
                self.clean.intersect_rect(self.pending_area);
                self.pending_transform = Affine::IDENTITY;
                return Ok(RemapKind::Translation);
            }
        }

        // Re-project the old buffer into a fresh one through the pending
        // transform.
        let old_origin = old_area.origin().to_point();
        let old_pixmap = self.surface.take_allocated();
        let trans = self.pending_transform;
        self.surface.reset_to(self.pending_area);

        if let Some(old) = old_pixmap {
            let new_origin = self.pending_area.origin().to_point();
            // new pixel = trans(old_origin + old pixel) − new_origin
            let placement = Affine::translate(-new_origin.to_vec2())
                * trans
                * Affine::translate(old_origin.to_vec2());
            let target = self.surface.ensure_pixmap()?;
            target.draw_pixmap(
                0,
                0,
                old.as_ref(),
                &PixmapPaint {
                    opacity: 1.0,
                    blend_mode: BlendMode::Source,
                    quality: FilterQuality::Bilinear,
                },
                to_ts_transform(placement),
                None,
            );
        }

        if is_translation {
            self.clean.intersect_rect(self.pending_area);
        } else {
            // Resampling destroys pixel-exact correspondence.
            self.clean.clear();
        }
        self.pending_transform = Affine::IDENTITY;
        Ok(RemapKind::Repaint)
    }

    // -- Painting --

    /// Composites the cached pixels for `area` into `ctx`.
    ///
    /// Returns `Ok(false)` — without touching `ctx` — when `area` is not
    /// fully clean; the caller renders normally and refills the cache.
    pub fn paint_from_cache(&self, ctx: &mut DrawingContext<'_>, area: IntRect) -> Result<bool> {
        if !self.is_clean(area) {
            return Ok(false);
        }
        let Some(pixmap) = self.surface.pixmap() else {
            // Clean claims require stored pixels.
            debug_assert!(self.clean.is_empty(), "clean region without a buffer");
            return Ok(false);
        };

        // Only the requested sub-rectangle leaves the cache.
        let cache_area = self.pixel_area();
        let Some(wanted) = area.intersect(cache_area) else {
            return Ok(false);
        };
        let rel = wanted.translated(-cache_area.x0, -cache_area.y0);
        let Some(ts_rect) = tiny_skia::IntRect::from_ltrb(rel.x0, rel.y0, rel.x1, rel.y1) else {
            return Ok(false);
        };
        let Some(sub) = pixmap.clone_rect(ts_rect) else {
            return Ok(false);
        };
        ctx.draw_device_pixels(
            sub.as_ref(),
            wanted.origin().to_point(),
            &PixmapPaint::default(),
            None,
        );
        Ok(true)
    }

    /// Replaces the cached pixels under `area` with `src` (which covers
    /// exactly `area`) and leaves the clean bookkeeping to the caller.
    pub fn store_pixels(&mut self, area: IntRect, src: &Pixmap) -> Result<()> {
        let cache_area = self.pixel_area();
        let offset = (area.x0 - cache_area.x0, area.y0 - cache_area.y0);
        let target = self.surface.ensure_pixmap()?;
        target.draw_pixmap(
            offset.0,
            offset.1,
            src.as_ref(),
            &PixmapPaint {
                opacity: 1.0,
                blend_mode: BlendMode::Source,
                quality: FilterQuality::Nearest,
            },
            tiny_skia::Transform::identity(),
            None,
        );
        Ok(())
    }
}
