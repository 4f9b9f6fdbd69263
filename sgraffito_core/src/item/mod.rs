// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Item tree data model.
//!
//! An *item* is a node in a retained drawing tree. Each item has:
//!
//! - An identity ([`ItemId`]) — a generational handle that becomes stale when
//!   the item is destroyed, preventing use-after-free bugs at the API level.
//! - Topology — parent, first-child, and sibling links forming an ordered
//!   tree. Child order is paint order: later siblings paint on top.
//! - A kind ([`ItemKind`]) — group, shape, or image; the closed set of
//!   renderable node types, dispatched by `match` in the traversals.
//! - **Local properties** set by the caller:
//!   [`transform`](DrawingStore::set_transform),
//!   [`style`](DrawingStore::set_style), [`flags`](DrawingStore::set_flags),
//!   shape/image content, and optional attached
//!   [`clip`](DrawingStore::set_clip_item) /
//!   [`mask`](DrawingStore::set_mask_item) subtrees.
//! - **Computed properties** produced by [`update`](DrawingStore::update):
//!   `ctm` (item → device transform), and geometric/visual bounding boxes in
//!   device space.
//!
//! Items are stored in struct-of-arrays layout with index-based handles for
//! cache-friendly traversal.
//!
//! # Dirty tracking
//!
//! Property mutations automatically mark the corresponding dirty channel
//! (see [`dirty`](crate::dirty)): TRANSFORM reaches descendants, BBOX
//! reaches ancestors, STYLE and CONTENT stay local, TOPOLOGY triggers a
//! traversal-order rebuild. A bounding box is valid only between an `update`
//! call and the next mutation affecting it.

mod id;
mod kind;
mod pick;
mod store;
mod traverse;
mod update;

pub use id::{INVALID, ItemId, PaintServerId, SourceId, ViewKey};
pub use kind::{GroupData, ImageData, ItemKind, ShapeData};
pub use store::{DrawingStore, ItemFlags};
pub use traverse::Children;
pub use update::{CtmMove, ItemDamage, UpdateChanges, UpdateFlags};
