// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transform-aware paint target.
//!
//! A [`DrawingContext`] couples a pixmap with the device→pixel transform of
//! the surface it belongs to. Draw calls take geometry in item-local
//! coordinates plus the item's device transform; the context composes the
//! surface mapping so callers never touch pixel coordinates directly.

use kurbo::{Affine, BezPath, PathEl, Point, Rect};
use tiny_skia::{Paint, Path, PathBuilder, Pixmap, PixmapPaint, PixmapRef, Stroke, Transform};

use sgraffito_core::style::{FillRule, Rgba};

use crate::error::Result;
use crate::surface::DrawingSurface;

/// A paint target: pixmap plus device→pixel mapping.
#[derive(Debug)]
pub struct DrawingContext<'a> {
    pixmap: &'a mut Pixmap,
    transform: Affine,
    device_area: Rect,
}

impl<'a> DrawingContext<'a> {
    /// Creates a context over a raw pixmap with an explicit device→pixel
    /// transform and the device-space area the pixmap covers.
    #[must_use]
    pub fn new(pixmap: &'a mut Pixmap, transform: Affine, device_area: Rect) -> Self {
        Self {
            pixmap,
            transform,
            device_area,
        }
    }

    /// Creates a context for a surface, allocating its backing pixmap if
    /// needed.
    pub fn from_surface(surface: &'a mut DrawingSurface) -> Result<Self> {
        let transform = surface.drawing_transform();
        let device_area = surface.area();
        let pixmap = surface.ensure_pixmap()?;
        Ok(Self {
            pixmap,
            transform,
            device_area,
        })
    }

    /// The device→pixel transform.
    #[must_use]
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// The device-space area this target covers.
    #[must_use]
    pub fn device_area(&self) -> Rect {
        self.device_area
    }

    /// The target pixmap.
    #[must_use]
    pub fn pixmap(&mut self) -> &mut Pixmap {
        self.pixmap
    }

    /// Fills `path` (item-local coordinates, `ctm` into device space).
    pub fn fill_path(
        &mut self,
        path: &BezPath,
        ctm: Affine,
        rule: FillRule,
        paint: &Paint<'_>,
        mask: Option<&tiny_skia::Mask>,
    ) {
        let Some(ts_path) = to_ts_path(path) else {
            return;
        };
        self.pixmap.fill_path(
            &ts_path,
            paint,
            to_ts_fill_rule(rule),
            to_ts_transform(self.transform * ctm),
            mask,
        );
    }

    /// Strokes `path` (item-local coordinates, `ctm` into device space).
    pub fn stroke_path(
        &mut self,
        path: &BezPath,
        ctm: Affine,
        stroke: &Stroke,
        paint: &Paint<'_>,
        mask: Option<&tiny_skia::Mask>,
    ) {
        let Some(ts_path) = to_ts_path(path) else {
            return;
        };
        self.pixmap.stroke_path(
            &ts_path,
            paint,
            stroke,
            to_ts_transform(self.transform * ctm),
            mask,
        );
    }

    /// Draws `src`, whose top-left pixel sits at `src_origin` in device
    /// space at scale 1 (intermediate layers, cache blits).
    pub fn draw_device_pixels(
        &mut self,
        src: PixmapRef<'_>,
        src_origin: Point,
        paint: &PixmapPaint,
        mask: Option<&tiny_skia::Mask>,
    ) {
        let placement = self.transform * Affine::translate(src_origin.to_vec2());
        self.pixmap
            .draw_pixmap(0, 0, src, paint, to_ts_transform(placement), mask);
    }

    /// Draws `src` stretched into the item-local rectangle `dest`.
    pub fn draw_image(
        &mut self,
        src: PixmapRef<'_>,
        ctm: Affine,
        dest: Rect,
        paint: &PixmapPaint,
        mask: Option<&tiny_skia::Mask>,
    ) {
        if src.width() == 0 || src.height() == 0 {
            return;
        }
        let fit = Affine::translate(dest.origin().to_vec2())
            * Affine::scale_non_uniform(
                dest.width() / f64::from(src.width()),
                dest.height() / f64::from(src.height()),
            );
        let placement = self.transform * ctm * fit;
        self.pixmap
            .draw_pixmap(0, 0, src, paint, to_ts_transform(placement), mask);
    }
}

/// Converts a kurbo affine into a tiny-skia transform.
#[must_use]
#[allow(clippy::cast_possible_truncation, reason = "raster math is f32")]
pub(crate) fn to_ts_transform(affine: Affine) -> Transform {
    let c = affine.as_coeffs();
    Transform::from_row(
        c[0] as f32,
        c[1] as f32,
        c[2] as f32,
        c[3] as f32,
        c[4] as f32,
        c[5] as f32,
    )
}

/// Converts a kurbo path into a tiny-skia path; `None` when degenerate.
#[must_use]
#[allow(clippy::cast_possible_truncation, reason = "raster math is f32")]
pub(crate) fn to_ts_path(path: &BezPath) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => {
                builder.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32);
            }
            PathEl::CurveTo(p1, p2, p3) => builder.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

/// Converts a core fill rule into a tiny-skia fill rule.
#[must_use]
pub(crate) fn to_ts_fill_rule(rule: FillRule) -> tiny_skia::FillRule {
    match rule {
        FillRule::NonZero => tiny_skia::FillRule::Winding,
        FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
    }
}

/// Converts a core color into a tiny-skia color.
#[must_use]
pub(crate) fn to_ts_color(color: Rgba) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

#[cfg(test)]
mod tests {
    use kurbo::Shape as _;
    use sgraffito_core::geom::IntRect;

    use super::*;

    fn solid_paint(color: Rgba) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(to_ts_color(color));
        paint.anti_alias = false;
        paint
    }

    #[test]
    fn fill_lands_under_the_surface_transform() {
        let mut surface = DrawingSurface::new(IntRect::new(10, 10, 20, 20).unwrap());
        let mut ctx = DrawingContext::from_surface(&mut surface).unwrap();

        // Device rect (12,12)-(14,14) → pixels (2,2)-(4,4).
        let path = Rect::new(12.0, 12.0, 14.0, 14.0).to_path(0.01);
        ctx.fill_path(
            &path,
            Affine::IDENTITY,
            FillRule::NonZero,
            &solid_paint(Rgba::new(255, 0, 0, 255)),
            None,
        );

        let pixmap = surface.pixmap().unwrap();
        assert!(pixmap.pixel(2, 2).unwrap().alpha() > 0);
        assert!(pixmap.pixel(3, 3).unwrap().alpha() > 0);
        assert_eq!(pixmap.pixel(0, 0).unwrap().alpha(), 0);
        assert_eq!(pixmap.pixel(5, 5).unwrap().alpha(), 0);
    }

    #[test]
    fn ctm_composes_with_surface_transform() {
        let mut surface = DrawingSurface::new(IntRect::new(0, 0, 10, 10).unwrap());
        let mut ctx = DrawingContext::from_surface(&mut surface).unwrap();

        // Local unit square scaled ×4 and moved to (4,4).
        let path = Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.01);
        let ctm = Affine::translate((4.0, 4.0)) * Affine::scale(4.0);
        ctx.fill_path(
            &path,
            ctm,
            FillRule::NonZero,
            &solid_paint(Rgba::new(0, 255, 0, 255)),
            None,
        );

        let pixmap = surface.pixmap().unwrap();
        assert!(pixmap.pixel(5, 5).unwrap().alpha() > 0);
        assert_eq!(pixmap.pixel(2, 2).unwrap().alpha(), 0);
    }

    #[test]
    fn device_pixel_blit_respects_origin() {
        let mut src = Pixmap::new(2, 2).unwrap();
        src.fill(tiny_skia::Color::from_rgba8(0, 0, 255, 255));

        let mut surface = DrawingSurface::new(IntRect::new(100, 100, 110, 110).unwrap());
        let mut ctx = DrawingContext::from_surface(&mut surface).unwrap();
        ctx.draw_device_pixels(
            src.as_ref(),
            Point::new(104.0, 104.0),
            &PixmapPaint::default(),
            None,
        );

        let pixmap = surface.pixmap().unwrap();
        assert!(pixmap.pixel(4, 4).unwrap().alpha() > 0);
        assert_eq!(pixmap.pixel(0, 0).unwrap().alpha(), 0);
        assert_eq!(pixmap.pixel(7, 7).unwrap().alpha(), 0);
    }

    #[test]
    fn degenerate_paths_are_skipped() {
        let mut surface = DrawingSurface::new(IntRect::new(0, 0, 4, 4).unwrap());
        let mut ctx = DrawingContext::from_surface(&mut surface).unwrap();
        ctx.fill_path(
            &BezPath::new(),
            Affine::IDENTITY,
            FillRule::NonZero,
            &solid_paint(Rgba::BLACK),
            None,
        );
        let pixmap = surface.pixmap().unwrap();
        assert_eq!(pixmap.pixel(1, 1).unwrap().alpha(), 0);
    }
}
