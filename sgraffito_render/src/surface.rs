// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel surfaces that remember their origin.
//!
//! A [`DrawingSurface`] is a thin wrapper over a [`tiny_skia::Pixmap`] that
//! automates the mapping between *logical space* (the coordinates rendering
//! produces, usually device space) and *pixel space* (buffer indices). The
//! backing pixmap is allocated on first use, not at construction, so
//! surfaces can describe areas (pattern tiles, scheduled caches) that may
//! never get painted.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use tiny_skia::Pixmap;

use sgraffito_core::geom::IntRect;

use crate::error::{RenderError, Result};

/// Upper bound on a single surface allocation, keeping runaway zoom levels
/// from aborting the process inside the allocator.
pub const MAX_SURFACE_BYTES: u64 = 256 * 1024 * 1024;

const BYTES_PER_PIXEL: u64 = 4;

/// A pixel buffer with an origin and per-axis scale.
///
/// The invariant `drawing_transform = scale × translate(−origin)` makes
/// logical coordinates map deterministically to pixels; all painting into
/// the surface goes through that transform.
#[derive(Debug)]
pub struct DrawingSurface {
    pixmap: Option<Pixmap>,
    origin: Point,
    scale: Vec2,
    width: u32,
    height: u32,
}

impl DrawingSurface {
    /// Creates a surface whose pixels cover the given device-space
    /// rectangle at scale 1.
    #[must_use]
    pub fn new(area: IntRect) -> Self {
        Self {
            pixmap: None,
            origin: area.origin().to_point(),
            scale: Vec2::new(1.0, 1.0),
            width: area.width().unsigned_abs(),
            height: area.height().unsigned_abs(),
        }
    }

    /// Creates a surface covering the logical rectangle `logbox` with the
    /// given pixel dimensions; the scale is derived per axis.
    ///
    /// # Panics
    ///
    /// Panics if `logbox` is empty or either dimension is zero.
    #[must_use]
    pub fn with_logical(logbox: Rect, pixdims: (u32, u32)) -> Self {
        assert!(
            logbox.width() > 0.0 && logbox.height() > 0.0,
            "logical box must have area"
        );
        assert!(
            pixdims.0 > 0 && pixdims.1 > 0,
            "pixel dimensions must be positive"
        );
        Self {
            pixmap: None,
            origin: logbox.origin(),
            scale: Vec2::new(
                f64::from(pixdims.0) / logbox.width(),
                f64::from(pixdims.1) / logbox.height(),
            ),
            width: pixdims.0,
            height: pixdims.1,
        }
    }

    /// Wraps an existing pixmap, placing its top-left pixel at `origin`
    /// (scale 1).
    #[must_use]
    pub fn from_pixmap(pixmap: Pixmap, origin: Point) -> Self {
        let (width, height) = (pixmap.width(), pixmap.height());
        Self {
            pixmap: Some(pixmap),
            origin,
            scale: Vec2::new(1.0, 1.0),
            width,
            height,
        }
    }

    /// Logical-space top-left of the buffer.
    #[must_use]
    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Pixels per logical unit, per axis.
    #[must_use]
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// Buffer dimensions in pixels.
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Logical width and height covered by the buffer.
    #[must_use]
    pub fn dimensions(&self) -> Size {
        Size::new(
            f64::from(self.width) / self.scale.x,
            f64::from(self.height) / self.scale.y,
        )
    }

    /// Logical extents of the surface.
    #[must_use]
    pub fn area(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.dimensions())
    }

    /// Pixel extents of the surface, anchored at the rounded origin.
    ///
    /// Meaningful for scale-1 surfaces, where logical space is device pixel
    /// space.
    #[must_use]
    pub fn pixel_area(&self) -> IntRect {
        #[allow(clippy::cast_possible_truncation, reason = "surface origins are small")]
        let (x, y) = (self.origin.x.round() as i32, self.origin.y.round() as i32);
        IntRect::from_xywh(
            x,
            y,
            i32::try_from(self.width).unwrap_or(i32::MAX),
            i32::try_from(self.height).unwrap_or(i32::MAX),
        )
        .expect("surface dimensions are positive")
    }

    /// The transform applied to every drawing context created for this
    /// surface: `scale × translate(−origin)`.
    #[must_use]
    pub fn drawing_transform(&self) -> Affine {
        Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::translate(-self.origin.to_vec2())
    }

    /// Whether the backing pixmap has been allocated.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.pixmap.is_some()
    }

    /// The backing pixmap, if allocated.
    #[must_use]
    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Allocates the backing pixmap if needed and returns it.
    pub fn ensure_pixmap(&mut self) -> Result<&mut Pixmap> {
        if self.pixmap.is_none() {
            let bytes = u64::from(self.width) * u64::from(self.height) * BYTES_PER_PIXEL;
            if bytes > MAX_SURFACE_BYTES {
                return Err(RenderError::AllocationTooLarge {
                    bytes,
                    limit: MAX_SURFACE_BYTES,
                });
            }
            let pixmap = Pixmap::new(self.width, self.height).ok_or(
                RenderError::InvalidSurface {
                    width: self.width,
                    height: self.height,
                },
            )?;
            self.pixmap = Some(pixmap);
        }
        Ok(self.pixmap.as_mut().expect("just allocated"))
    }

    /// Drops the buffer contents, releasing the backing pixmap.
    pub fn drop_contents(&mut self) {
        self.pixmap = None;
    }

    /// Takes the backing pixmap out of the surface, allocating it first if
    /// needed.
    pub(crate) fn take_pixmap(&mut self) -> Result<Pixmap> {
        self.ensure_pixmap()?;
        Ok(self.pixmap.take().expect("just ensured"))
    }

    /// Takes the backing pixmap if it was ever allocated.
    pub(crate) fn take_allocated(&mut self) -> Option<Pixmap> {
        self.pixmap.take()
    }

    pub(crate) fn replace_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    pub(crate) fn reset_to(&mut self, area: IntRect) {
        self.pixmap = None;
        self.origin = area.origin().to_point();
        self.width = area.width().unsigned_abs();
        self.height = area.height().unsigned_abs();
        self.scale = Vec2::new(1.0, 1.0);
    }
}
