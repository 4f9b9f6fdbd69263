// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core scene-graph data model for incremental 2D rendering.
//!
//! `sgraffito_core` provides the retained item tree that sits between a
//! document model (which owns styles and geometry) and a raster backend
//! (which owns pixels). It is `no_std` compatible (with `alloc`) and uses
//! array-based struct-of-arrays storage with index handles for
//! cache-friendly traversal.
//!
//! # Architecture
//!
//! The crate is organized around a synchronous update → render → pick
//! protocol driven by the embedding GUI or export layer:
//!
//! ```text
//!   Document model (styles, geometry)
//!       │ mutation calls (auto-mark dirty channels)
//!       ▼
//!   DrawingStore ──► update() ──► UpdateChanges ──► Renderer::apply()
//!       │                                               │
//!       │ pick(point, delta, sticky)                    ▼
//!       ▼                                    Renderer::render() → pixels
//!   Option<ItemId>
//! ```
//!
//! **[`item`]** — Struct-of-arrays item tree with generational handles.
//! Local properties (transform, style, shape data, clip/mask attachment)
//! are set by the caller; device transforms and bounding boxes are
//! computed by the update traversal.
//!
//! **[`dirty`]** — Multi-channel dirty tracking via `understory_dirty`.
//! Property mutations automatically mark the appropriate channel.
//! TRANSFORM propagates to descendants; BBOX propagates to ancestors;
//! STYLE and CONTENT are local-only; TOPOLOGY triggers a traversal
//! rebuild.
//!
//! **[`drawing`]** — The arena root: view-key allocation for multiple
//! independent displays of one document, per-view roots, the cache-keep
//! rectangle, redraw-region accumulation, and pick hysteresis.
//!
//! **[`geom`]** — Integer pixel rectangles and conversions to and from
//! [`kurbo`] geometry.
//!
//! **[`style`]** — Externally computed paint style read (never written)
//! by the traversals: opacity, fill, stroke, visibility. Paint servers
//! stay opaque handles.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types
//! for traversal instrumentation, with zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Protocol
//!
//! `update` must complete for a subtree before `render` or `pick` touch
//! it; bounding boxes are valid only between an update and the next
//! mutation. This is a caller-enforced contract: violating it yields
//! stale geometry, not a crash.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one
//!   branch per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-item
//!   damage-rect events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod dirty;
pub mod drawing;
pub mod geom;
pub mod item;
pub mod style;
pub mod trace;
