// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel surfaces, cache-aware compositing, and the render traversal.
//!
//! `sgraffito_render` is the raster half of sgraffito. It consumes an
//! updated [`sgraffito_core`] item tree and paints it:
//!
//! ```text
//!   DrawingStore::update() ──► UpdateChanges
//!                                   │
//!                                   ▼
//!                         Renderer::apply()          (cache bookkeeping)
//!                                   │
//!   expose/redraw area ──► Renderer::render() ──► DrawingContext ──► Pixmap
//! ```
//!
//! **[`surface`]** — [`DrawingSurface`](surface::DrawingSurface): a pixel
//! buffer that remembers the mapping between logical coordinates and device
//! pixels, with deferred allocation.
//!
//! **[`region`]** — [`PixelRegion`](region::PixelRegion): disjoint-rect
//! region arithmetic backing the cache's clean tracker.
//!
//! **[`cache`]** — [`DrawingCache`](cache::DrawingCache): clean-region
//! tracking plus the scheduled remap protocol that makes whole-pixel
//! scrolling a metadata-only operation.
//!
//! **[`context`]** — [`DrawingContext`](context::DrawingContext):
//! transform-aware paint target over a `tiny-skia` pixmap.
//!
//! **[`renderer`]** — [`Renderer`](renderer::Renderer): the render
//! traversal with clip/mask compositing, group-opacity isolation, per-item
//! caches, outline mode, and the image/paint-server resolver hooks.
//!
//! **[`error`]** — [`RenderError`](error::RenderError): the narrow set of
//! allocation failures this layer can hit.
//!
//! On-screen canvases, exporters, and print paths all drive the same
//! [`render`](renderer::Renderer::render) entry point; the target is just a
//! surface.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod cache;
pub mod context;
pub mod error;
pub mod region;
pub mod renderer;
pub mod surface;
