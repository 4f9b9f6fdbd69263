// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel geometry.
//!
//! Device-space areas (cache extents, damage rectangles, render tiles) are
//! tracked in whole pixels. [`IntRect`] covers the subset of rectangle
//! algebra the update and cache layers actually need (intersection, union,
//! translation, containment, rounding conversions to and from
//! [`kurbo::Rect`]) without pulling pixel concerns into the f64 geometry
//! types.
//!
//! An `IntRect` is always non-empty: `x0 < x1` and `y0 < y1`. "No area" is
//! represented as `Option<IntRect>` at call sites, matching the `OptRect`
//! convention of the f64 layer.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect};

/// An integer point in device pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntPoint {
    /// Horizontal pixel coordinate.
    pub x: i32,
    /// Vertical pixel coordinate.
    pub y: i32,
}

impl IntPoint {
    /// Creates a point from pixel coordinates.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to an f64 point.
    #[inline]
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

/// An axis-aligned rectangle in device pixels, closed-open on both axes.
///
/// Invariant: `x0 < x1 && y0 < y1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge (inclusive).
    pub x0: i32,
    /// Top edge (inclusive).
    pub y0: i32,
    /// Right edge (exclusive).
    pub x1: i32,
    /// Bottom edge (exclusive).
    pub y1: i32,
}

impl IntRect {
    /// Creates a rectangle from edges.
    ///
    /// Returns `None` when the rectangle would be empty.
    #[inline]
    #[must_use]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Option<Self> {
        if x0 < x1 && y0 < y1 {
            Some(Self { x0, y0, x1, y1 })
        } else {
            None
        }
    }

    /// Creates a rectangle from origin and size.
    ///
    /// Returns `None` when either dimension is zero or negative.
    #[inline]
    #[must_use]
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Option<Self> {
        Self::new(x, y, x + w, y + h)
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(self) -> i32 {
        self.x1 - self.x0
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(self) -> i32 {
        self.y1 - self.y0
    }

    /// Top-left corner.
    #[inline]
    #[must_use]
    pub const fn origin(self) -> IntPoint {
        IntPoint::new(self.x0, self.y0)
    }

    /// Returns the rectangle moved by `(dx, dy)` pixels.
    #[inline]
    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// Intersection with `other`, or `None` when disjoint.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        Self::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        )
    }

    /// Smallest rectangle covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Whether `other` lies entirely inside `self`.
    #[inline]
    #[must_use]
    pub const fn contains_rect(self, other: Self) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// Whether the pixel at `(x, y)` lies inside `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, x: i32, y: i32) -> bool {
        self.x0 <= x && x < self.x1 && self.y0 <= y && y < self.y1
    }

    /// Converts to an f64 rectangle.
    #[inline]
    #[must_use]
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// Smallest pixel rectangle covering `rect`.
    ///
    /// Returns `None` for empty or non-finite input. A sliver thinner than a
    /// pixel still rounds out to one pixel.
    #[must_use]
    pub fn round_out(rect: Rect) -> Option<Self> {
        if !rect.is_finite() || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        // Clamp to i32 range before casting; enormous rects (infinite scene
        // areas) degrade to the full representable extent.
        let lo = f64::from(i32::MIN);
        let hi = f64::from(i32::MAX);
        #[allow(clippy::cast_possible_truncation, reason = "clamped to i32 range")]
        let snap = |v: f64| v.clamp(lo, hi) as i32;
        Self::new(
            snap(rect.x0.floor()),
            snap(rect.y0.floor()),
            snap(rect.x1.ceil()),
            snap(rect.y1.ceil()),
        )
    }
}

/// Union of two optional rectangles, treating `None` as empty.
#[must_use]
pub fn union_opt(a: Option<IntRect>, b: Option<IntRect>) -> Option<IntRect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}
