//! Pixel operations used by the candidate generator and engine adapters
//!
//! - Luminance extraction from strided frame planes
//! - Geometry (quarter-turn rotation, ROI views, polarity inversion)
//! - Binarization (adaptive block thresholds and global Otsu)

/// Adaptive and global-histogram binarizers
pub mod binarization;
/// Rotation, cropping and polarity inversion
pub mod geometry;
/// Luminance extraction from frame planes
pub mod luminance;
