// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The closed set of drawable item kinds.

use kurbo::{Affine, BezPath, Rect, Shape as _};

use crate::style::FillRule;

use super::id::SourceId;

/// Per-kind payload for one item slot.
///
/// The kind is fixed at creation; content mutators
/// ([`set_shape`](super::DrawingStore::set_shape),
/// [`set_image`](super::DrawingStore::set_image)) replace the payload but
/// never the discriminant.
#[derive(Clone, Debug)]
pub enum ItemKind {
    /// A composite node holding an ordered child list.
    Group(GroupData),
    /// A filled and/or stroked Bézier path.
    Shape(ShapeData),
    /// An externally owned bitmap stretched into a local rectangle.
    Image(ImageData),
}

impl ItemKind {
    /// A group with no child transform that picks through to its children.
    #[must_use]
    pub fn group() -> Self {
        Self::Group(GroupData::default())
    }

    /// A shape with the given path and the default fill rule.
    #[must_use]
    pub fn shape(path: BezPath) -> Self {
        Self::Shape(ShapeData {
            path,
            fill_rule: FillRule::default(),
        })
    }

    /// An image presenting `source` inside `rect` (item-local space).
    #[must_use]
    pub fn image(source: SourceId, rect: Rect) -> Self {
        Self::Image(ImageData { source, rect })
    }
}

/// Group payload.
#[derive(Clone, Debug)]
pub struct GroupData {
    /// Extra transform applied to children only, composed between the
    /// group's own transform and the children's transforms. Used for marker
    /// viewBox scaling, clip-path unit scaling, and root viewBox scaling.
    pub child_transform: Option<Affine>,
    /// When `false`, the group picks as a unit: hit-testing never descends,
    /// a hit anywhere in the subtree reports the group itself.
    pub pick_children: bool,
}

impl Default for GroupData {
    fn default() -> Self {
        Self {
            child_transform: None,
            pick_children: true,
        }
    }
}

/// Shape payload.
#[derive(Clone, Debug)]
pub struct ShapeData {
    /// Outline geometry in item-local space.
    pub path: BezPath,
    /// How the interior is determined.
    pub fill_rule: FillRule,
}

/// Image payload.
#[derive(Clone, Debug)]
pub struct ImageData {
    /// Externally managed pixel content.
    pub source: SourceId,
    /// Destination rectangle in item-local space.
    pub rect: Rect,
}

impl ItemKind {
    /// Item-local geometric bounds of this kind's own content (excluding
    /// children), or `None` when degenerate.
    #[must_use]
    pub(crate) fn local_bounds(&self) -> Option<Rect> {
        match self {
            Self::Group(_) => None,
            Self::Shape(shape) => {
                if shape.path.elements().is_empty() {
                    return None;
                }
                // Zero-area bounds are kept: a bare line segment has no fill
                // extent but still gains one once stroke width is added.
                let b = shape.path.bounding_box();
                b.is_finite().then_some(b)
            }
            Self::Image(image) => {
                let r = image.rect;
                (r.is_finite() && r.width() > 0.0 && r.height() > 0.0).then_some(r)
            }
        }
    }
}
