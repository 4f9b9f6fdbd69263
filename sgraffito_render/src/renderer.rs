// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render traversal.
//!
//! [`Renderer`] walks an updated [`DrawingStore`] subtree and paints it into
//! a [`DrawingContext`], clipped to a device-space area. It owns the
//! per-item [`DrawingCache`] table and consumes [`UpdateChanges`] to keep it
//! honest: damage dirties caches along the ancestor chain, transform moves
//! schedule cache re-projection, removals drop caches.
//!
//! Compositing shape:
//!
//! - Items needing isolation (group opacity below one, clip, mask) render
//!   their content into an intermediate pixmap sized to exactly the painted
//!   area, get the clip mask (alpha) and mask (luminance) applied, and
//!   composite back in one blit. Nothing outside the requested area is ever
//!   touched — intermediate buffers cover exactly that area.
//! - Single-shape clips rasterize the clip path straight into a mask,
//!   skipping the subtree render (the common rectangle/path clip).
//! - Cached items try [`DrawingCache::paint_from_cache`] first; a miss
//!   renders the missing area isolated, stores it, marks it clean, and
//!   blits — so the next pass over the same area is a pure copy.
//! - Outline mode draws constant-width outlines of every shape and image,
//!   bypassing styles, opacity layers, and caches.

use hashbrown::HashMap;
use kurbo::{Affine, Rect, Shape as _};
use tiny_skia::{
    BlendMode, FilterQuality, Mask, MaskType, Paint as TsPaint, Pixmap, PixmapPaint, PixmapRef,
    Shader, Stroke,
};

use sgraffito_core::geom::IntRect;
use sgraffito_core::item::{
    DrawingStore, ItemFlags, ItemId, ItemKind, PaintServerId, SourceId, UpdateChanges,
};
use sgraffito_core::style::{Paint, Rgba};
use sgraffito_core::trace::{RenderBeginEvent, RenderSummary, Tracer};

use crate::cache::DrawingCache;
use crate::context::{DrawingContext, to_ts_color, to_ts_fill_rule, to_ts_path, to_ts_transform};
use crate::error::{RenderError, Result};
use crate::surface::DrawingSurface;

bitflags::bitflags! {
    /// Per-call rendering flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RenderFlags: u8 {
        /// Bypass caches entirely, reading and writing none. Used when the
        /// output must not go through resampled intermediates (filter
        /// previews, print paths).
        const NO_CACHE = 1 << 0;
    }
}

/// How the traversal paints items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Full styling, opacity, clips, masks, and caching.
    #[default]
    Normal,
    /// Constant-width outlines in a single color; no styles, layers, or
    /// caches. The editor's wireframe view.
    Outline,
}

/// Renderer configuration.
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    /// Painting mode.
    pub mode: RenderMode,
    /// Outline color for [`RenderMode::Outline`].
    pub outline_color: Rgba,
    /// Antialias edges (disable for pixel-exact tests).
    pub anti_alias: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Normal,
            outline_color: Rgba::BLACK,
            anti_alias: true,
        }
    }
}

/// Resolves image sources to pixels.
///
/// Image content is owned outside the scene graph; the renderer asks for it
/// by handle each time an image item paints.
pub trait ContentSource {
    /// Pixels for `source`, if available. Missing sources render as nothing.
    fn pixmap(&self, source: SourceId) -> Option<PixmapRef<'_>>;
}

/// A [`ContentSource`] with no content.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoContent;

impl ContentSource for NoContent {
    fn pixmap(&self, _source: SourceId) -> Option<PixmapRef<'_>> {
        None
    }
}

/// Resolves paint-server references (gradients, patterns) to shaders.
pub trait PaintServerSource {
    /// A shader for `server`, expressed in the paint target's pixel space;
    /// `bbox` is the referencing item's geometric bounds in that same
    /// space. Unresolved servers paint nothing.
    fn resolve(&self, server: PaintServerId, bbox: Rect) -> Option<Shader<'_>>;
}

/// A [`PaintServerSource`] that resolves nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPaintServers;

impl PaintServerSource for NoPaintServers {
    fn resolve(&self, _server: PaintServerId, _bbox: Rect) -> Option<Shader<'_>> {
        None
    }
}

/// External resolvers handed to each render call.
#[derive(Clone, Copy)]
pub struct RenderSources<'a> {
    /// Image content resolver.
    pub content: &'a dyn ContentSource,
    /// Paint-server resolver.
    pub paint_servers: &'a dyn PaintServerSource,
}

impl core::fmt::Debug for RenderSources<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RenderSources").finish_non_exhaustive()
    }
}

impl RenderSources<'static> {
    /// Sources that resolve nothing (solid-color scenes).
    #[must_use]
    pub fn none() -> Self {
        Self {
            content: &NoContent,
            paint_servers: &NoPaintServers,
        }
    }
}

/// The render traversal plus the per-item cache table.
#[derive(Debug)]
pub struct Renderer {
    caches: HashMap<u32, DrawingCache>,
    cache_limit: Option<IntRect>,
    options: RenderOptions,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Creates a renderer with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(RenderOptions::default())
    }

    /// Creates a renderer with the given options.
    #[must_use]
    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            caches: HashMap::new(),
            cache_limit: None,
            options,
        }
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Replaces the options (e.g. toggling outline mode).
    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    /// Whether an item currently has a cache (test and diagnostics access).
    #[must_use]
    pub fn has_cache(&self, item: ItemId) -> bool {
        self.caches.contains_key(&item.index())
    }

    /// Cache access for one item (test and diagnostics access).
    #[must_use]
    pub fn cache(&self, item: ItemId) -> Option<&DrawingCache> {
        self.caches.get(&item.index())
    }

    // -- Change application --

    /// Consumes one update's changes: drops caches of removed items, marks
    /// damage dirty along each ancestor chain, schedules cache
    /// re-projection for moved items, and retires caches that fell outside
    /// the keep rectangle.
    ///
    /// `cache_limit` is the drawing's current cache-keep rectangle.
    pub fn apply(
        &mut self,
        store: &DrawingStore,
        changes: &UpdateChanges,
        cache_limit: Option<IntRect>,
    ) {
        self.cache_limit = cache_limit;

        for idx in &changes.removed {
            self.caches.remove(idx);
        }

        // Re-projection for moved cached items.
        for mv in &changes.ctm_moves {
            let Some(new_area) = cache_area(store, mv.idx, self.cache_limit) else {
                self.caches.remove(&mv.idx);
                continue;
            };
            let Some(cache) = self.caches.get_mut(&mv.idx) else {
                continue;
            };
            let det = mv.old_ctm.determinant();
            if det.abs() < 1e-12 || !det.is_finite() {
                cache.schedule_transform(new_area, Affine::IDENTITY);
                cache.mark_all_dirty();
            } else {
                let trans = store.ctm_at(mv.idx) * mv.old_ctm.inverse();
                cache.schedule_transform(new_area, trans);
            }
        }

        // Damage dirties the anchor's own cache and every ancestor's. An
        // INVALID anchor is repaint-only damage with no cache chain.
        for damage in &changes.damage {
            let mut idx = damage.idx;
            while idx != sgraffito_core::item::INVALID {
                if let Some(cache) = self.caches.get_mut(&idx) {
                    cache.mark_dirty(damage.area);
                }
                idx = store.parent_at(idx);
            }
        }

        // Retire caches whose item lost the flag or left the keep area, and
        // re-fit surviving ones whose target area drifted.
        let limit = self.cache_limit;
        self.caches.retain(|&idx, cache| {
            if !store.flags_at(idx).contains(ItemFlags::CACHED) {
                return false;
            }
            match cache_area(store, idx, limit) {
                Some(area) => {
                    if area != cache.pixel_area() {
                        cache.schedule_transform(area, Affine::IDENTITY);
                    }
                    true
                }
                None => false,
            }
        });
    }

    // -- Rendering --

    /// Paints the subtree rooted at `root` into `ctx`, restricted to the
    /// device-space `area`.
    ///
    /// The update-before-render protocol applies: bounding boxes and device
    /// transforms must be current.
    pub fn render(
        &mut self,
        store: &DrawingStore,
        root: ItemId,
        ctx: &mut DrawingContext<'_>,
        area: IntRect,
        flags: RenderFlags,
        sources: &RenderSources<'_>,
    ) -> Result<RenderSummary> {
        self.render_traced(store, root, ctx, area, flags, sources, &mut Tracer::none())
    }

    /// Like [`render`](Self::render), with traversal instrumentation.
    pub fn render_traced(
        &mut self,
        store: &DrawingStore,
        root: ItemId,
        ctx: &mut DrawingContext<'_>,
        area: IntRect,
        flags: RenderFlags,
        sources: &RenderSources<'_>,
        tracer: &mut Tracer<'_>,
    ) -> Result<RenderSummary> {
        // Validates the handle before the raw-index walk.
        let _ = store.visual_bbox(root);
        tracer.render_begin(&RenderBeginEvent {
            root: root.index(),
            area,
        });
        let mut summary = RenderSummary::default();
        self.render_item(
            store,
            root.index(),
            ctx,
            area,
            flags,
            sources,
            &mut summary,
            tracer,
        )?;
        tracer.render_end(&summary);
        Ok(summary)
    }

    fn render_item(
        &mut self,
        store: &DrawingStore,
        idx: u32,
        ctx: &mut DrawingContext<'_>,
        area: IntRect,
        flags: RenderFlags,
        sources: &RenderSources<'_>,
        summary: &mut RenderSummary,
        tracer: &mut Tracer<'_>,
    ) -> Result<()> {
        if !store.flags_at(idx).contains(ItemFlags::VISIBLE) {
            return Ok(());
        }
        let Some(visual) = store.visual_bbox_at(idx) else {
            return Ok(());
        };
        let Some(varea) = IntRect::round_out(visual) else {
            return Ok(());
        };
        let Some(carea) = varea.intersect(area) else {
            return Ok(());
        };

        if self.options.mode == RenderMode::Outline {
            return self.render_outline(store, idx, ctx, carea, summary);
        }

        let style = store.style_at(idx);
        if style.opacity <= 0.0 {
            return Ok(());
        }

        let cached = store.flags_at(idx).contains(ItemFlags::CACHED)
            && !flags.contains(RenderFlags::NO_CACHE);
        if cached && let Some(cache_rect) = cache_area(store, idx, self.cache_limit) {
            // Realize the cache and apply any scheduled remap.
            {
                let cache = self
                    .caches
                    .entry(idx)
                    .or_insert_with(|| DrawingCache::new(cache_rect));
                let kind = cache.prepare()?;
                tracer.cache_remap(idx, kind);
                if cache.paint_from_cache(ctx, carea)? {
                    summary.cache_hits += 1;
                    return Ok(());
                }
            }
            summary.cache_misses += 1;

            // Refill the missed area and serve the blit from the fresh
            // pixels.
            let content = self.render_isolated(store, idx, carea, flags, sources, summary, tracer)?;
            let cache = self.caches.get_mut(&idx).expect("entry realized above");
            cache.store_pixels(carea, &content)?;
            cache.mark_clean(carea);
            ctx.draw_device_pixels(
                content.as_ref(),
                carea.origin().to_point(),
                &PixmapPaint::default(),
                None,
            );
            return Ok(());
        }

        let needs_layer = style.opacity < 1.0
            || store.clip_item(store.id_at(idx)).is_some()
            || store.mask_item(store.id_at(idx)).is_some();
        if needs_layer {
            let content = self.render_isolated(store, idx, carea, flags, sources, summary, tracer)?;
            ctx.draw_device_pixels(
                content.as_ref(),
                carea.origin().to_point(),
                &PixmapPaint::default(),
                None,
            );
            Ok(())
        } else {
            self.render_direct(store, idx, ctx, carea, flags, sources, summary, tracer)
        }
    }

    /// Renders `idx` fully composited (clip, mask, opacity applied) into a
    /// fresh pixmap covering exactly `carea`.
    fn render_isolated(
        &mut self,
        store: &DrawingStore,
        idx: u32,
        carea: IntRect,
        flags: RenderFlags,
        sources: &RenderSources<'_>,
        summary: &mut RenderSummary,
        tracer: &mut Tracer<'_>,
    ) -> Result<Pixmap> {
        let mut surface = DrawingSurface::new(carea);
        {
            let mut sub = DrawingContext::from_surface(&mut surface)?;
            self.render_direct(store, idx, &mut sub, carea, flags, sources, summary, tracer)?;
        }
        let mut pixmap = surface.take_pixmap()?;

        let id = store.id_at(idx);
        if let Some(clip) = store.clip_item(id) {
            match self.clip_mask(store, clip.index(), carea)? {
                Some(mask) => pixmap.apply_mask(&mask),
                // Degenerate clip: everything clipped away.
                None => pixmap.fill(tiny_skia::Color::TRANSPARENT),
            }
        }
        if let Some(mask_item) = store.mask_item(id) {
            let mask =
                self.luminance_mask(store, mask_item.index(), carea, flags, sources, summary, tracer)?;
            pixmap.apply_mask(&mask);
        }

        let opacity = store.style_at(idx).opacity;
        if opacity < 1.0 {
            let mut faded = new_pixmap(carea)?;
            faded.draw_pixmap(
                0,
                0,
                pixmap.as_ref(),
                &PixmapPaint {
                    opacity,
                    blend_mode: BlendMode::SourceOver,
                    quality: FilterQuality::Nearest,
                },
                tiny_skia::Transform::identity(),
                None,
            );
            pixmap = faded;
        }
        Ok(pixmap)
    }

    /// Draws the item's own content and children, without the item's own
    /// clip/mask/opacity (those belong to the isolation layer).
    fn render_direct(
        &mut self,
        store: &DrawingStore,
        idx: u32,
        ctx: &mut DrawingContext<'_>,
        carea: IntRect,
        flags: RenderFlags,
        sources: &RenderSources<'_>,
        summary: &mut RenderSummary,
        tracer: &mut Tracer<'_>,
    ) -> Result<()> {
        match store.kind_at(idx) {
            ItemKind::Group(_) => {
                for child in store.children(store.id_at(idx)) {
                    self.render_item(
                        store,
                        child.index(),
                        ctx,
                        carea,
                        flags,
                        sources,
                        summary,
                        tracer,
                    )?;
                }
                Ok(())
            }
            ItemKind::Shape(shape) => {
                let ctm = store.ctm_at(idx);
                let style = store.style_at(idx);
                let bbox = store.geometric_bbox_at(idx);

                if let Some(fill) = style.fill
                    && let Some(paint) = self.make_paint(fill, bbox, ctx.transform(), sources)
                {
                    ctx.fill_path(&shape.path, ctm, shape.fill_rule, &paint, None);
                }
                if let Some(stroke) = style.stroke
                    && stroke.width > 0.0
                    && let Some(paint) = self.make_paint(stroke.paint, bbox, ctx.transform(), sources)
                {
                    #[allow(clippy::cast_possible_truncation, reason = "raster math is f32")]
                    let ts_stroke = Stroke {
                        width: stroke.width as f32,
                        ..Stroke::default()
                    };
                    ctx.stroke_path(&shape.path, ctm, &ts_stroke, &paint, None);
                }
                summary.painted += 1;
                Ok(())
            }
            ItemKind::Image(image) => {
                if let Some(src) = sources.content.pixmap(image.source) {
                    ctx.draw_image(
                        src,
                        store.ctm_at(idx),
                        image.rect,
                        &PixmapPaint {
                            opacity: 1.0,
                            blend_mode: BlendMode::SourceOver,
                            quality: FilterQuality::Bilinear,
                        },
                        None,
                    );
                }
                summary.painted += 1;
                Ok(())
            }
        }
    }

    /// Builds the alpha mask for a clip subtree over `carea`.
    ///
    /// Single-shape clips rasterize the path directly; anything else renders
    /// the subtree filled and converts its alpha.
    fn clip_mask(
        &self,
        store: &DrawingStore,
        clip_idx: u32,
        carea: IntRect,
    ) -> Result<Option<Mask>> {
        let to_pixels = Affine::translate((-f64::from(carea.x0), -f64::from(carea.y0)));
        let (w, h) = (carea.width().unsigned_abs(), carea.height().unsigned_abs());

        let simple = match store.kind_at(clip_idx) {
            ItemKind::Shape(shape) if store.clip_item(store.id_at(clip_idx)).is_none() => {
                Some(shape)
            }
            _ => None,
        };
        if let Some(shape) = simple {
            let Some(path) = to_ts_path(&shape.path) else {
                return Ok(None);
            };
            let Some(mut mask) = Mask::new(w, h) else {
                return Err(RenderError::InvalidSurface {
                    width: w,
                    height: h,
                });
            };
            mask.fill_path(
                &path,
                to_ts_fill_rule(shape.fill_rule),
                self.options.anti_alias,
                to_ts_transform(to_pixels * store.ctm_at(clip_idx)),
            );
            return Ok(Some(mask));
        }

        // General clip: render the subtree's fill geometry and use its
        // alpha.
        let mut surface = DrawingSurface::new(carea);
        {
            let mut sub = DrawingContext::from_surface(&mut surface)?;
            self.render_clip_geometry(store, clip_idx, &mut sub)?;
        }
        let pixmap = surface.take_pixmap()?;
        Ok(Some(Mask::from_pixmap(pixmap.as_ref(), MaskType::Alpha)))
    }

    /// Fills a clip subtree's geometry in opaque white, ignoring styles.
    fn render_clip_geometry(
        &self,
        store: &DrawingStore,
        idx: u32,
        ctx: &mut DrawingContext<'_>,
    ) -> Result<()> {
        match store.kind_at(idx) {
            ItemKind::Group(_) => {
                for child in store.children(store.id_at(idx)) {
                    self.render_clip_geometry(store, child.index(), ctx)?;
                }
            }
            ItemKind::Shape(shape) => {
                let mut paint = TsPaint::default();
                paint.set_color(tiny_skia::Color::WHITE);
                paint.anti_alias = self.options.anti_alias;
                ctx.fill_path(
                    &shape.path,
                    store.ctm_at(idx),
                    shape.fill_rule,
                    &paint,
                    None,
                );
            }
            ItemKind::Image(image) => {
                let mut paint = TsPaint::default();
                paint.set_color(tiny_skia::Color::WHITE);
                paint.anti_alias = self.options.anti_alias;
                ctx.fill_path(
                    &image.rect.to_path(0.1),
                    store.ctm_at(idx),
                    sgraffito_core::style::FillRule::NonZero,
                    &paint,
                    None,
                );
            }
        }
        Ok(())
    }

    /// Renders a mask subtree and converts it to a luminance mask.
    fn luminance_mask(
        &mut self,
        store: &DrawingStore,
        mask_idx: u32,
        carea: IntRect,
        flags: RenderFlags,
        sources: &RenderSources<'_>,
        summary: &mut RenderSummary,
        tracer: &mut Tracer<'_>,
    ) -> Result<Mask> {
        let mut surface = DrawingSurface::new(carea);
        {
            let mut sub = DrawingContext::from_surface(&mut surface)?;
            // Masks never cache; their pixels fold into the owner's cache.
            self.render_item(
                store,
                mask_idx,
                &mut sub,
                carea,
                flags | RenderFlags::NO_CACHE,
                sources,
                summary,
                tracer,
            )?;
        }
        let pixmap = surface.take_pixmap()?;
        Ok(Mask::from_pixmap(pixmap.as_ref(), MaskType::Luminance))
    }

    /// Constant-width outline rendering for the wireframe view.
    fn render_outline(
        &mut self,
        store: &DrawingStore,
        idx: u32,
        ctx: &mut DrawingContext<'_>,
        carea: IntRect,
        summary: &mut RenderSummary,
    ) -> Result<()> {
        match store.kind_at(idx) {
            ItemKind::Group(_) => {
                for child in store.children(store.id_at(idx)) {
                    if !store.flags_at(child.index()).contains(ItemFlags::VISIBLE) {
                        continue;
                    }
                    self.render_outline(store, child.index(), ctx, carea, summary)?;
                }
                Ok(())
            }
            ItemKind::Shape(shape) => {
                self.stroke_outline(store, idx, &shape.path, ctx);
                summary.painted += 1;
                Ok(())
            }
            ItemKind::Image(image) => {
                self.stroke_outline(store, idx, &image.rect.to_path(0.1), ctx);
                summary.painted += 1;
                Ok(())
            }
        }
    }

    fn stroke_outline(
        &self,
        store: &DrawingStore,
        idx: u32,
        path: &kurbo::BezPath,
        ctx: &mut DrawingContext<'_>,
    ) {
        let ctm = store.ctm_at(idx);
        let det = (ctx.transform() * ctm).determinant().abs();
        let scale = det.sqrt();
        #[allow(clippy::cast_possible_truncation, reason = "raster math is f32")]
        let width = if scale > 1e-12 { (1.0 / scale) as f32 } else { 1.0 };

        let mut paint = TsPaint::default();
        paint.set_color(to_ts_color(self.options.outline_color));
        paint.anti_alias = self.options.anti_alias;
        ctx.stroke_path(
            path,
            ctm,
            &Stroke {
                width,
                ..Stroke::default()
            },
            &paint,
            None,
        );
    }

    fn make_paint<'a>(
        &self,
        paint: Paint,
        device_bbox: Option<Rect>,
        target_transform: Affine,
        sources: &RenderSources<'a>,
    ) -> Option<TsPaint<'a>> {
        let mut ts_paint = TsPaint::default();
        ts_paint.anti_alias = self.options.anti_alias;
        match paint {
            Paint::Solid(color) => {
                ts_paint.set_color(to_ts_color(color));
                Some(ts_paint)
            }
            Paint::Server(server) => {
                let bbox = target_transform.transform_rect_bbox(device_bbox?);
                ts_paint.shader = sources.paint_servers.resolve(server, bbox)?;
                Some(ts_paint)
            }
        }
    }
}

/// The pixel area an item's cache should cover: its visual bounds clamped
/// to the keep rectangle. No keep rectangle means no caching at all, the
/// state before the embedding reports a viewport.
fn cache_area(store: &DrawingStore, idx: u32, limit: Option<IntRect>) -> Option<IntRect> {
    let bbox = IntRect::round_out(store.visual_bbox_at(idx)?)?;
    bbox.intersect(limit?)
}

fn new_pixmap(area: IntRect) -> Result<Pixmap> {
    let (w, h) = (area.width().unsigned_abs(), area.height().unsigned_abs());
    Pixmap::new(w, h).ok_or(RenderError::InvalidSurface {
        width: w,
        height: h,
    })
}

#[cfg(test)]
mod tests {
    use kurbo::Shape as _;

    use sgraffito_core::drawing::Drawing;
    use sgraffito_core::style::{FillRule, ItemStyle, Paint, StrokeStyle};

    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> IntRect {
        IntRect::new(x0, y0, x1, y1).unwrap()
    }

    fn rect_shape(r: Rect) -> ItemKind {
        ItemKind::shape(r.to_path(0.01))
    }

    fn solid(r: u8, g: u8, b: u8) -> ItemStyle {
        ItemStyle {
            opacity: 1.0,
            fill: Some(Paint::Solid(Rgba::new(r, g, b, 255))),
            stroke: None,
        }
    }

    fn crisp() -> Renderer {
        Renderer::with_options(RenderOptions {
            anti_alias: false,
            ..RenderOptions::default()
        })
    }

    fn render_to(
        renderer: &mut Renderer,
        drawing: &Drawing,
        root: ItemId,
        area: IntRect,
        flags: RenderFlags,
    ) -> (Pixmap, RenderSummary) {
        let mut surface = DrawingSurface::new(area);
        let summary = {
            let mut ctx = DrawingContext::from_surface(&mut surface).unwrap();
            renderer
                .render(
                    drawing.store(),
                    root,
                    &mut ctx,
                    area,
                    flags,
                    &RenderSources::none(),
                )
                .unwrap()
        };
        (surface.take_pixmap().unwrap(), summary)
    }

    #[test]
    fn paint_order_is_back_to_front() {
        let mut drawing = Drawing::new();
        let group = drawing.store_mut().create_item(ItemKind::group());
        let r1 = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let r2 = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(5.0, 5.0, 15.0, 15.0)));
        drawing.store_mut().add_child(group, r1);
        drawing.store_mut().add_child(group, r2);
        drawing.store_mut().set_style(r1, solid(255, 0, 0));
        drawing.store_mut().set_style(r2, solid(0, 255, 0));
        let _ = drawing.update();

        let mut renderer = crisp();
        let (pixmap, summary) =
            render_to(&mut renderer, &drawing, group, rect(0, 0, 20, 20), RenderFlags::empty());

        assert_eq!(summary.painted, 2);
        // r1-only area is red, r2-only area is green.
        assert!(pixmap.pixel(2, 2).unwrap().red() > 0);
        assert!(pixmap.pixel(12, 12).unwrap().green() > 0);
        // The overlap belongs to the later (topmost) sibling.
        let overlap = pixmap.pixel(7, 7).unwrap();
        assert!(overlap.green() > 0 && overlap.red() == 0);
        // Outside everything stays untouched.
        assert_eq!(pixmap.pixel(18, 18).unwrap().alpha(), 0);
    }

    #[test]
    fn render_never_paints_outside_area() {
        let mut drawing = Drawing::new();
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 20.0, 20.0)));
        drawing.store_mut().set_style(shape, solid(255, 0, 0));
        let _ = drawing.update();

        let mut renderer = crisp();
        // Paint only the left half of the shape's area.
        let (pixmap, _) =
            render_to(&mut renderer, &drawing, shape, rect(0, 0, 10, 20), RenderFlags::empty());
        assert!(pixmap.pixel(5, 5).unwrap().red() > 0);
        assert_eq!(pixmap.width(), 10, "tile covers the requested area only");
    }

    #[test]
    fn group_opacity_composites_isolated() {
        let mut drawing = Drawing::new();
        let group = drawing.store_mut().create_item(ItemKind::group());
        let a = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let b = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        drawing.store_mut().add_child(group, a);
        drawing.store_mut().add_child(group, b);
        drawing.store_mut().set_style(a, solid(255, 0, 0));
        drawing.store_mut().set_style(b, solid(255, 0, 0));
        drawing.store_mut().set_style(
            group,
            ItemStyle {
                opacity: 0.5,
                ..ItemStyle::default()
            },
        );
        let _ = drawing.update();

        let mut renderer = crisp();
        let (pixmap, _) =
            render_to(&mut renderer, &drawing, group, rect(0, 0, 10, 10), RenderFlags::empty());

        // Two stacked opaque children behind 50% group opacity must come out
        // at 50%, not 75% — the group composites as one layer.
        let alpha = pixmap.pixel(5, 5).unwrap().alpha();
        assert!(
            (alpha as i32 - 128).abs() <= 2,
            "expected ~128 alpha, got {alpha}"
        );
    }

    #[test]
    fn clip_restricts_painting() {
        let mut drawing = Drawing::new();
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 20.0, 20.0)));
        let clip = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        drawing.store_mut().set_style(shape, solid(255, 0, 0));
        drawing.store_mut().set_clip_item(shape, Some(clip));
        let _ = drawing.update();

        let mut renderer = crisp();
        let (pixmap, _) =
            render_to(&mut renderer, &drawing, shape, rect(0, 0, 20, 20), RenderFlags::empty());

        assert!(pixmap.pixel(5, 5).unwrap().red() > 0, "inside the clip");
        assert_eq!(pixmap.pixel(15, 15).unwrap().alpha(), 0, "clipped away");
    }

    #[test]
    fn luminance_mask_scales_alpha() {
        let mut drawing = Drawing::new();
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        drawing.store_mut().set_style(shape, solid(255, 0, 0));
        // White mask over the left half, nothing over the right.
        let mask = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 5.0, 10.0)));
        drawing.store_mut().set_style(mask, solid(255, 255, 255));
        drawing.store_mut().set_mask_item(shape, Some(mask));
        let _ = drawing.update();

        let mut renderer = crisp();
        let (pixmap, _) =
            render_to(&mut renderer, &drawing, shape, rect(0, 0, 10, 10), RenderFlags::empty());

        assert!(pixmap.pixel(2, 5).unwrap().red() > 0, "white mask keeps");
        assert_eq!(pixmap.pixel(7, 5).unwrap().alpha(), 0, "unmasked area drops");
    }

    #[test]
    fn cache_round_trip_hit_miss_hit() {
        let mut drawing = Drawing::new();
        let group = drawing.store_mut().create_item(ItemKind::group());
        let r1 = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let r2 = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(5.0, 5.0, 15.0, 15.0)));
        drawing.store_mut().add_child(group, r1);
        drawing.store_mut().add_child(group, r2);
        drawing.store_mut().set_style(r1, solid(255, 0, 0));
        drawing.store_mut().set_style(r2, solid(0, 255, 0));
        drawing
            .store_mut()
            .set_flags(group, ItemFlags::default() | ItemFlags::CACHED);
        drawing.set_cache_limit(rect(0, 0, 100, 100).into());

        let mut renderer = crisp();
        let changes = drawing.update();
        renderer.apply(drawing.store(), &changes, drawing.cache_limit());

        let area = rect(0, 0, 15, 15);
        let (_, first) = render_to(&mut renderer, &drawing, group, area, RenderFlags::empty());
        assert_eq!(first.cache_misses, 1, "cold cache");
        assert!(renderer.cache(group).unwrap().is_clean(rect(0, 0, 10, 10)));

        let (_, second) = render_to(&mut renderer, &drawing, group, area, RenderFlags::empty());
        assert_eq!(second.cache_hits, 1, "warm cache");
        assert_eq!(second.painted, 0, "no leaf painting on a hit");

        // Dirty r1: the group cache must stop claiming that area.
        drawing.store_mut().set_style(r1, solid(0, 0, 255));
        let changes = drawing.update();
        renderer.apply(drawing.store(), &changes, drawing.cache_limit());
        assert!(!renderer.cache(group).unwrap().is_clean(rect(0, 0, 10, 10)));

        // Repaint restores cleanliness and correct pixels.
        let (pixmap, third) = render_to(&mut renderer, &drawing, group, area, RenderFlags::empty());
        assert_eq!(third.cache_misses, 1);
        assert!(renderer.cache(group).unwrap().is_clean(rect(0, 0, 10, 10)));
        assert!(pixmap.pixel(2, 2).unwrap().blue() > 0, "restyled child");
    }

    #[test]
    fn panning_reprojects_caches_instead_of_dirtying() {
        let mut drawing = Drawing::new();
        let root = drawing.store_mut().create_item(ItemKind::group());
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        drawing.store_mut().add_child(root, shape);
        drawing.store_mut().set_style(shape, solid(255, 0, 0));
        drawing
            .store_mut()
            .set_flags(shape, ItemFlags::default() | ItemFlags::CACHED);
        drawing.set_cache_limit(rect(0, 0, 100, 100).into());

        let mut renderer = crisp();
        let changes = drawing.update();
        renderer.apply(drawing.store(), &changes, drawing.cache_limit());
        let (_, cold) = render_to(&mut renderer, &drawing, root, rect(0, 0, 20, 20), RenderFlags::empty());
        assert_eq!(cold.cache_misses, 1);

        // Pan the whole view by a whole-pixel step.
        drawing
            .store_mut()
            .set_transform(root, Affine::translate((3.0, 0.0)));
        let changes = drawing.update();
        assert_eq!(changes.ctm_moves.len(), 1, "cached child moved");
        renderer.apply(drawing.store(), &changes, drawing.cache_limit());

        // The cached pixels ride along: no repaint of the shape.
        let (pixmap, warm) =
            render_to(&mut renderer, &drawing, root, rect(0, 0, 20, 20), RenderFlags::empty());
        assert_eq!(warm.cache_hits, 1, "scrolled content served from cache");
        assert_eq!(warm.cache_misses, 0);
        assert_eq!(warm.painted, 0);
        assert!(pixmap.pixel(5, 5).unwrap().red() > 0, "shifted content");
        assert_eq!(pixmap.pixel(1, 5).unwrap().alpha(), 0, "vacated strip");
    }

    #[test]
    fn no_cache_flag_bypasses_caches() {
        let mut drawing = Drawing::new();
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        drawing.store_mut().set_style(shape, solid(255, 0, 0));
        drawing
            .store_mut()
            .set_flags(shape, ItemFlags::default() | ItemFlags::CACHED);
        drawing.set_cache_limit(rect(0, 0, 100, 100).into());

        let mut renderer = crisp();
        let changes = drawing.update();
        renderer.apply(drawing.store(), &changes, drawing.cache_limit());

        let (_, summary) = render_to(
            &mut renderer,
            &drawing,
            shape,
            rect(0, 0, 10, 10),
            RenderFlags::NO_CACHE,
        );
        assert_eq!(summary.cache_hits + summary.cache_misses, 0);
        assert!(!renderer.has_cache(shape), "no cache realized");
    }

    #[test]
    fn removed_items_drop_their_caches() {
        let mut drawing = Drawing::new();
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        drawing
            .store_mut()
            .set_flags(shape, ItemFlags::default() | ItemFlags::CACHED);
        drawing.set_cache_limit(rect(0, 0, 100, 100).into());

        let mut renderer = crisp();
        let changes = drawing.update();
        renderer.apply(drawing.store(), &changes, drawing.cache_limit());
        let _ = render_to(&mut renderer, &drawing, shape, rect(0, 0, 10, 10), RenderFlags::empty());
        assert!(renderer.has_cache(shape));

        drawing.store_mut().destroy_item(shape);
        let changes = drawing.update();
        renderer.apply(drawing.store(), &changes, drawing.cache_limit());
        assert!(!renderer.has_cache(shape));
    }

    #[test]
    fn outline_mode_strokes_without_fill() {
        let mut drawing = Drawing::new();
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(2.0, 2.0, 18.0, 18.0)));
        drawing.store_mut().set_style(shape, solid(255, 0, 0));
        let _ = drawing.update();

        let mut renderer = Renderer::with_options(RenderOptions {
            mode: RenderMode::Outline,
            anti_alias: false,
            outline_color: Rgba::new(0, 0, 255, 255),
            ..RenderOptions::default()
        });
        let (pixmap, summary) =
            render_to(&mut renderer, &drawing, shape, rect(0, 0, 20, 20), RenderFlags::empty());

        assert_eq!(summary.painted, 1);
        // Interior stays empty; the boundary carries the outline color.
        assert_eq!(pixmap.pixel(10, 10).unwrap().alpha(), 0);
        assert!(pixmap.pixel(2, 10).unwrap().blue() > 0);
    }

    #[test]
    fn stroked_shape_paints_with_width() {
        let mut drawing = Drawing::new();
        let shape = drawing
            .store_mut()
            .create_item(rect_shape(Rect::new(5.0, 5.0, 15.0, 15.0)));
        drawing.store_mut().set_style(
            shape,
            ItemStyle {
                opacity: 1.0,
                fill: None,
                stroke: Some(StrokeStyle {
                    paint: Paint::Solid(Rgba::new(255, 0, 0, 255)),
                    width: 2.0,
                }),
            },
        );
        let _ = drawing.update();

        let mut renderer = crisp();
        let (pixmap, _) =
            render_to(&mut renderer, &drawing, shape, rect(0, 0, 20, 20), RenderFlags::empty());
        assert!(pixmap.pixel(5, 10).unwrap().red() > 0, "on the stroke");
        assert_eq!(pixmap.pixel(10, 10).unwrap().alpha(), 0, "unfilled interior");
    }

    #[test]
    fn image_items_draw_through_content_source() {
        struct OneImage(Pixmap);
        impl ContentSource for OneImage {
            fn pixmap(&self, source: SourceId) -> Option<PixmapRef<'_>> {
                (source == SourceId(7)).then(|| self.0.as_ref())
            }
        }

        let mut drawing = Drawing::new();
        let image = drawing
            .store_mut()
            .create_item(ItemKind::image(SourceId(7), Rect::new(0.0, 0.0, 8.0, 8.0)));
        let _ = drawing.update();

        let mut src = Pixmap::new(2, 2).unwrap();
        src.fill(tiny_skia::Color::from_rgba8(0, 0, 255, 255));
        let sources = RenderSources {
            content: &OneImage(src),
            paint_servers: &NoPaintServers,
        };

        let mut renderer = crisp();
        let mut surface = DrawingSurface::new(rect(0, 0, 8, 8));
        {
            let mut ctx = DrawingContext::from_surface(&mut surface).unwrap();
            renderer
                .render(
                    drawing.store(),
                    image,
                    &mut ctx,
                    rect(0, 0, 8, 8),
                    RenderFlags::empty(),
                    &sources,
                )
                .unwrap();
        }
        let pixmap = surface.take_pixmap().unwrap();
        assert!(pixmap.pixel(4, 4).unwrap().blue() > 0, "stretched image");
    }

    #[test]
    fn fill_rule_even_odd_leaves_holes() {
        let mut drawing = Drawing::new();
        let mut path = kurbo::BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((20.0, 0.0));
        path.line_to((20.0, 20.0));
        path.line_to((0.0, 20.0));
        path.close_path();
        path.move_to((5.0, 5.0));
        path.line_to((15.0, 5.0));
        path.line_to((15.0, 15.0));
        path.line_to((5.0, 15.0));
        path.close_path();
        let shape = drawing
            .store_mut()
            .create_item(ItemKind::Shape(sgraffito_core::item::ShapeData {
                path,
                fill_rule: FillRule::EvenOdd,
            }));
        drawing.store_mut().set_style(shape, solid(255, 0, 0));
        let _ = drawing.update();

        let mut renderer = crisp();
        let (pixmap, _) =
            render_to(&mut renderer, &drawing, shape, rect(0, 0, 20, 20), RenderFlags::empty());
        assert!(pixmap.pixel(2, 10).unwrap().red() > 0, "ring filled");
        assert_eq!(pixmap.pixel(10, 10).unwrap().alpha(), 0, "hole empty");
    }
}
