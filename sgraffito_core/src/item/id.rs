// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Item, view, and external-resource identity types.

use core::fmt;

/// Sentinel value indicating "no item" in raw index fields.
pub const INVALID: u32 = u32::MAX;

/// A handle to an item in a [`DrawingStore`](super::DrawingStore).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after an item is destroyed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    /// Slot index into the store's arrays.
    pub(crate) idx: u32,
    /// Generation counter — must match the store's generation for this slot.
    pub(crate) generation: u32,
}

impl ItemId {
    /// Returns the raw slot index (for diagnostics and renderer tables).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({}@gen{})", self.idx, self.generation)
    }
}

/// Identifies one independent realization (display) of the logical document.
///
/// A document shown simultaneously on a canvas, in a thumbnail, and by an
/// exporter gets one key per display; every per-view item, bounding box, and
/// cache belongs to exactly one key. Keys are allocated in blocks by
/// [`Drawing::new_display_keys`](crate::drawing::Drawing::new_display_keys)
/// so that an element needing several parallel states (itself, its clip, its
/// mask) can reserve consecutive keys.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewKey(pub u32);

impl fmt::Debug for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewKey({})", self.0)
    }
}

/// An opaque reference to externally managed pixel content.
///
/// Image items present a source; the raster layer resolves the id through a
/// content-source hook. Core code passes the value through without
/// interpreting it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

/// An opaque reference to an externally managed paint server
/// (gradient/pattern).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaintServerId(pub u32);

impl fmt::Debug for PaintServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaintServerId({})", self.0)
    }
}
