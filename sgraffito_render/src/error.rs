// Copyright 2026 the Sgraffito Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the raster layer.
//!
//! The core traversals are pure recomputation and never fail; everything
//! fallible lives here, where pixel buffers get allocated.

use thiserror::Error;

/// Result type alias for raster operations.
pub type Result<T> = core::result::Result<T, RenderError>;

/// Errors from surface allocation and compositing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A pixel buffer would exceed the allocation cap.
    #[error("surface of {bytes} bytes exceeds the {limit}-byte allocation cap")]
    AllocationTooLarge {
        /// Requested size in bytes.
        bytes: u64,
        /// Configured cap in bytes.
        limit: u64,
    },

    /// A pixel buffer could not be constructed (zero or absurd dimensions).
    #[error("cannot create a {width}x{height} surface")]
    InvalidSurface {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
}
