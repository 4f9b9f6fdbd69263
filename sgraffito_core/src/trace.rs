// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the traversals.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! traversal instrumentation calls at each stage. All method bodies default
//! to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace`
//! feature is **off**, every `Tracer` method compiles to nothing (zero
//! overhead). When **on**, each method performs a single `Option` branch
//! before dispatching.
//!
//! Events carry no timestamps: this subsystem is synchronous and
//! event-driven, so sinks that need timing stamp events on arrival.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) — gates the per-item damage-rect event
//!   plus the corresponding `TraceSink` method.

use kurbo::Point;

use crate::geom::IntRect;
#[cfg(feature = "trace-rich")]
use crate::item::ItemDamage;
use crate::item::UpdateChanges;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Aggregate counts for one update traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Items whose device transform was recomputed.
    pub transforms: u32,
    /// Items whose bounding boxes were recomputed.
    pub bboxes: u32,
    /// Items whose style changed.
    pub styles: u32,
    /// Items whose content was replaced.
    pub content: u32,
    /// Items added since the last update.
    pub added: u32,
    /// Items removed since the last update.
    pub removed: u32,
    /// Whether the traversal order was rebuilt.
    pub topology_changed: bool,
}

impl UpdateSummary {
    /// Summarizes a change set.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "tree size is u32-bounded")]
    pub fn of(changes: &UpdateChanges) -> Self {
        Self {
            transforms: changes.transforms.len() as u32,
            bboxes: changes.bboxes.len() as u32,
            styles: changes.styles.len() as u32,
            content: changes.content.len() as u32,
            added: changes.added.len() as u32,
            removed: changes.removed.len() as u32,
            topology_changed: changes.topology_changed,
        }
    }
}

/// Emitted when a render traversal starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderBeginEvent {
    /// Raw slot index of the subtree root.
    pub root: u32,
    /// Device-space area being painted.
    pub area: IntRect,
}

/// Aggregate counts for one render traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Items painted directly (no cache involved).
    pub painted: u32,
    /// Items composited from a clean cache.
    pub cache_hits: u32,
    /// Cached items whose cache missed and was refilled.
    pub cache_misses: u32,
}

/// Which strategy a cache remap took during `prepare`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemapKind {
    /// Identity transform and unchanged area: nothing to do.
    Noop,
    /// Whole-pixel translation: clean region translated, no pixels touched.
    Translation,
    /// General transform: pixels re-projected, clean region reduced or
    /// discarded.
    Repaint,
}

/// Emitted when a cache applies a scheduled transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheRemapEvent {
    /// Raw slot index of the cached item.
    pub item: u32,
    /// Strategy taken.
    pub kind: RemapKind,
}

/// Emitted after a pick traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickEvent {
    /// Query point (device space).
    pub point: Point,
    /// Tolerance radius in device pixels.
    pub delta: f64,
    /// Raw slot index of the hit item, if any.
    pub hit: Option<u32>,
}

// ---------------------------------------------------------------------------
// TraceSink
// ---------------------------------------------------------------------------

/// Receives traversal events. All methods default to no-ops.
pub trait TraceSink {
    /// Called when an update traversal starts.
    fn on_update_begin(&mut self) {}

    /// Called when an update traversal finishes.
    fn on_update_end(&mut self, summary: &UpdateSummary) {
        _ = summary;
    }

    /// Called when a render traversal starts.
    fn on_render_begin(&mut self, e: &RenderBeginEvent) {
        _ = e;
    }

    /// Called when a render traversal finishes.
    fn on_render_end(&mut self, summary: &RenderSummary) {
        _ = summary;
    }

    /// Called when a cache applies a scheduled transform.
    fn on_cache_remap(&mut self, e: &CacheRemapEvent) {
        _ = e;
    }

    /// Called after a pick traversal.
    fn on_pick(&mut self, e: &PickEvent) {
        _ = e;
    }

    /// Called with per-update damage rectangles (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_damage_rects(&mut self, rects: &[ItemDamage]) {
        _ = rects;
    }
}

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
/// When **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits an update-begin event.
    #[inline]
    pub fn update_begin(&mut self) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_update_begin();
        }
    }

    /// Emits an update-end event.
    #[inline]
    pub fn update_end(&mut self, summary: &UpdateSummary) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_update_end(summary);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = summary;
        }
    }

    /// Emits a render-begin event.
    #[inline]
    pub fn render_begin(&mut self, e: &RenderBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a render-end event.
    #[inline]
    pub fn render_end(&mut self, summary: &RenderSummary) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render_end(summary);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = summary;
        }
    }

    /// Emits a cache-remap event.
    #[inline]
    pub fn cache_remap(&mut self, item: u32, kind: RemapKind) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_cache_remap(&CacheRemapEvent { item, kind });
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = (item, kind);
        }
    }

    /// Emits a pick event.
    #[inline]
    pub fn pick(&mut self, point: Point, delta: f64, hit: Option<u32>) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pick(&PickEvent { point, delta, hit });
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = (point, delta, hit);
        }
    }

    /// Emits per-update damage rectangles (requires `trace-rich`).
    #[inline]
    #[cfg(feature = "trace-rich")]
    pub fn damage_rects(&mut self, rects: &[ItemDamage]) {
        if let Some(s) = &mut self.sink {
            s.on_damage_rects(rects);
        }
    }
}
