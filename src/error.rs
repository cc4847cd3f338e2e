//! Error types for the frame pipeline.

use thiserror::Error;

use crate::models::Region;

/// Errors raised while preparing or decoding a frame.
///
/// A symbol that is simply not present is not an error; engines report it
/// as [`DecodeOutcome::NotFound`](crate::models::DecodeOutcome::NotFound).
#[derive(Debug, Error)]
pub enum ScanError {
    /// The frame has no backing image data (released, or null buffer).
    #[error("frame has no image data")]
    FrameUnavailable,

    /// A region does not fit inside the grid it was applied to.
    #[error("region {region:?} outside {width}x{height} grid")]
    InvalidRegion {
        /// Offending region.
        region: Region,
        /// Width of the grid.
        width: usize,
        /// Height of the grid.
        height: usize,
    },

    /// Sample buffer does not match the declared dimensions.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected sample count.
        expected: usize,
        /// Actual sample count.
        actual: usize,
    },

    /// Work was submitted to an engine that has been closed.
    #[error("decode engine is closed")]
    EngineClosed,

    /// The general engine failed while processing an image.
    #[error("decode engine failure: {0}")]
    Engine(String),

    /// An image file could not be loaded (CLI and tooling only).
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl ScanError {
    /// Creates a buffer size mismatch error.
    #[must_use]
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    /// Creates an invalid region error for a `width`x`height` grid.
    #[must_use]
    pub const fn invalid_region(region: Region, width: usize, height: usize) -> Self {
        Self::InvalidRegion {
            region,
            width,
            height,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = ScanError> = std::result::Result<T, E>;
