// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Sgraffito uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! propagate invalidation through the item tree. Each channel represents an
//! independent category of change.
//!
//! # Propagation semantics
//!
//! Channels differ in which direction dirtiness propagates:
//!
//! - **Downward** — [`TRANSFORM`] uses
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) and has dependency
//!   edges from child to parent (and from attached clip/mask items to their
//!   owner). Marking an item dirty automatically marks its whole subtree,
//!   because device transforms are inherited.
//!
//! - **Upward** — [`BBOX`] uses the eager policy with the edge direction
//!   reversed: parents depend on children (and owners depend on their
//!   clip/mask items). Marking an item reaches its ancestor chain, because
//!   group bounding boxes are unions over descendants.
//!
//! - **Local-only** — [`STYLE`] and [`CONTENT`] are marked with the default
//!   policy. Only the explicitly marked item appears in the drain output.
//!   Mutations that also move geometry (stroke width, shape data) pair a
//!   local mark with a [`BBOX`] mark.
//!
//! - **Structural** — [`TOPOLOGY`] is marked on topology mutations
//!   (add/remove child, create/destroy item, clip/mask attachment). It
//!   triggers a traversal-order rebuild during update but does not
//!   propagate.
//!
//! # Consumption
//!
//! Callers never query dirty state directly. Each
//! [`DrawingStore::update`](crate::item::DrawingStore::update) call drains
//! all channels and surfaces the results as
//! [`UpdateChanges`](crate::item::UpdateChanges), which the renderer
//! consumes to maintain per-item caches and schedule repaints.

use understory_dirty::Channel;

/// Local or inherited transform changed — requires device transform
/// recomputation for the subtree.
pub const TRANSFORM: Channel = Channel::new(0);

/// Geometry moved — requires bounding-box recomputation up the ancestor
/// chain.
pub const BBOX: Channel = Channel::new(1);

/// Paint style changed — repaint needed, geometry may be reused.
pub const STYLE: Channel = Channel::new(2);

/// Shape path or image source replaced — no propagation needed (the
/// accompanying [`BBOX`] mark carries the geometric consequences).
pub const CONTENT: Channel = Channel::new(3);

/// Tree topology changed — triggers traversal order rebuild.
pub const TOPOLOGY: Channel = Channel::new(4);
