//! Helpers shared by the CLI, benches and integration tests

use std::env;
use std::path::Path;

use image::{GenericImageView, GrayImage};

use crate::decoder::code128;
use crate::error::{Result, ScanError};
use crate::models::{BitMatrix, Frame, LuminanceGrid, LuminanceSource, Rotation};

fn max_dim_from_env() -> Option<u32> {
    match env::var("SCAN_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

/// Load an image file as a single-plane luminance frame.
///
/// `SCAN_MAX_DIM` (if set and non-zero) downscales large images first.
pub fn load_frame<P: AsRef<Path>>(path: P, rotation: Rotation) -> Result<Frame> {
    let img = image::open(path)?;
    let luma = match max_dim_from_env() {
        Some(max_dim) if img.dimensions().0.max(img.dimensions().1) > max_dim => img
            .resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
            .to_luma8(),
        _ => img.to_luma8(),
    };
    let (width, height) = luma.dimensions();
    Ok(Frame::from_luma(
        width as usize,
        height as usize,
        rotation,
        luma.into_raw(),
    ))
}

/// Write a luminance grid as an 8-bit grayscale PNG (or any format `image`
/// infers from the extension)
pub fn save_grid<S: LuminanceSource + ?Sized, P: AsRef<Path>>(source: &S, path: P) -> Result<()> {
    let mut samples = Vec::with_capacity(source.width() * source.height());
    for y in 0..source.height() {
        samples.extend_from_slice(source.row(y));
    }
    let image = GrayImage::from_raw(source.width() as u32, source.height() as u32, samples)
        .ok_or_else(|| ScanError::buffer_mismatch(source.width() * source.height(), 0))?;
    image.save(path)?;
    Ok(())
}

/// Draw `text` as a Code 128 symbol onto `grid`: dark bars (value 0) of
/// `module_px` pixels each, starting at `left`, spanning rows `top..top + bar_height`.
///
/// Returns the symbol width in pixels, or `None` when the text cannot be
/// encoded or the symbol does not fit.
pub fn paint_code128(
    grid: &mut LuminanceGrid,
    text: &str,
    left: usize,
    top: usize,
    module_px: usize,
    bar_height: usize,
) -> Option<usize> {
    let modules = code128::widths_to_modules(&code128::encode(text)?);
    let width = modules.len() * module_px;
    if left + width > grid.width() || top + bar_height > grid.height() {
        return None;
    }
    for (i, &dark) in modules.iter().enumerate() {
        if !dark {
            continue;
        }
        for x in left + i * module_px..left + (i + 1) * module_px {
            for y in top..top + bar_height {
                grid.set(x, y, 0);
            }
        }
    }
    Some(width)
}

/// White grid with a centered Code 128 symbol for `text`
pub fn render_code128(
    text: &str,
    width: usize,
    height: usize,
    module_px: usize,
    bar_height: usize,
) -> Option<LuminanceGrid> {
    let modules = code128::widths_to_modules(&code128::encode(text)?).len();
    let symbol_width = modules * module_px;
    if symbol_width > width || bar_height > height {
        return None;
    }
    let mut grid = LuminanceGrid::filled(width, height, 255);
    let left = (width - symbol_width) / 2;
    let top = (height - bar_height) / 2;
    paint_code128(&mut grid, text, left, top, module_px, bar_height)?;
    Some(grid)
}

/// Summary statistics for grayscale data.
#[derive(Debug, Clone, Copy)]
pub struct GrayStats {
    /// Minimum grayscale value.
    pub min: u8,
    /// Maximum grayscale value.
    pub max: u8,
    /// Average grayscale value.
    pub avg: u8,
}

/// Summary statistics for a binary matrix.
#[derive(Debug, Clone, Copy)]
pub struct BinaryStats {
    /// Count of black pixels.
    pub black_pixels: usize,
    /// Total pixels in the matrix.
    pub total_pixels: usize,
    /// Ratio of black pixels to total pixels.
    pub black_ratio: f64,
}

/// Compute min/max/avg over a luminance source.
pub fn grayscale_stats<S: LuminanceSource + ?Sized>(source: &S) -> GrayStats {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum: u64 = 0;
    for y in 0..source.height() {
        for &v in source.row(y) {
            min = min.min(v);
            max = max.max(v);
            sum += v as u64;
        }
    }
    let count = (source.width() * source.height()) as u64;
    if count == 0 {
        return GrayStats {
            min: 0,
            max: 0,
            avg: 0,
        };
    }
    GrayStats {
        min,
        max,
        avg: (sum / count) as u8,
    }
}

/// Compute black pixel stats for a binary matrix.
pub fn binary_stats(binary: &BitMatrix) -> BinaryStats {
    let black = binary.count_black();
    let total = binary.width() * binary.height();
    let ratio = if total == 0 {
        0.0
    } else {
        black as f64 / total as f64
    };
    BinaryStats {
        black_pixels: black,
        total_pixels: total,
        black_ratio: ratio,
    }
}
