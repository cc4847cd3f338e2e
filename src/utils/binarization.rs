//! Grayscale to binary conversion
//!
//! Two strategies, tried in this order by the 1-D reader adapter:
//! - adaptive: per-block black points smoothed over a 5x5 block
//!   neighborhood, robust to uneven lighting
//! - global histogram: a single Otsu threshold for the whole image

use crate::models::{BitMatrix, LuminanceSource};

/// Blocks whose max - min is at or below this are treated as flat
const MIN_DYNAMIC_RANGE: u8 = 24;

/// Binarization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binarizer {
    /// Local-contrast block thresholding
    Adaptive {
        /// Block edge length in pixels
        block_size: usize,
        /// Images narrower or shorter than this use the global threshold
        min_dimension: usize,
    },
    /// One Otsu threshold from the global histogram
    GlobalHistogram,
}

impl Binarizer {
    /// Adaptive binarizer with 8px blocks, deferring to global below 40px
    pub const ADAPTIVE: Binarizer = Binarizer::Adaptive {
        block_size: 8,
        min_dimension: 40,
    };

    /// Binarize `source` with this strategy
    pub fn binarize<S: LuminanceSource + ?Sized>(&self, source: &S) -> BitMatrix {
        match *self {
            Binarizer::Adaptive {
                block_size,
                min_dimension,
            } => {
                if source.width() < min_dimension || source.height() < min_dimension {
                    otsu_binarize(source)
                } else {
                    adaptive_binarize(source, block_size)
                }
            }
            Binarizer::GlobalHistogram => otsu_binarize(source),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Binarizer::Adaptive { .. } => "adaptive",
            Binarizer::GlobalHistogram => "global-histogram",
        }
    }
}

/// Convert to binary using Otsu's thresholding method.
/// Returns a BitMatrix where true = black, false = white
pub fn otsu_binarize<S: LuminanceSource + ?Sized>(source: &S) -> BitMatrix {
    let threshold = calculate_otsu_threshold(source);
    threshold_binarize(source, threshold)
}

/// Calculate Otsu's optimal threshold from the global histogram
pub fn calculate_otsu_threshold<S: LuminanceSource + ?Sized>(source: &S) -> u8 {
    let mut histogram = [0u64; 256];
    for y in 0..source.height() {
        for &pixel in source.row(y) {
            histogram[pixel as usize] += 1;
        }
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 128;
    }
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut best_variance = 0.0f64;
    let mut best_threshold = 128u8;
    let mut below_count = 0u64;
    let mut below_sum = 0.0f64;

    // Pixels strictly below `threshold` form the dark class
    for threshold in 1..=255usize {
        below_count += histogram[threshold - 1];
        below_sum += (threshold - 1) as f64 * histogram[threshold - 1] as f64;
        let above_count = total - below_count;
        if below_count == 0 || above_count == 0 {
            continue;
        }
        let dark_mean = below_sum / below_count as f64;
        let light_mean = (total_sum - below_sum) / above_count as f64;
        let variance = below_count as f64 * above_count as f64 * (dark_mean - light_mean).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = threshold as u8;
        }
    }

    best_threshold
}

/// Simple global threshold binarization (below threshold = black)
pub fn threshold_binarize<S: LuminanceSource + ?Sized>(source: &S, threshold: u8) -> BitMatrix {
    let mut binary = BitMatrix::new(source.width(), source.height());
    for y in 0..source.height() {
        for (x, &pixel) in source.row(y).iter().enumerate() {
            if pixel < threshold {
                binary.set(x, y, true);
            }
        }
    }
    binary
}

/// Block-adaptive binarization.
///
/// Each `block_size` square gets a black point (its mean, or half its
/// minimum when the block is flat, borrowing from already-computed
/// neighbors so flat areas inside dark regions stay dark). Pixels are then
/// compared against the mean black point of the surrounding 5x5 blocks.
pub fn adaptive_binarize<S: LuminanceSource + ?Sized>(source: &S, block_size: usize) -> BitMatrix {
    let (width, height) = (source.width(), source.height());
    let block = block_size.max(2);
    let blocks_x = width.div_ceil(block);
    let blocks_y = height.div_ceil(block);
    let black_points = block_black_points(source, block, blocks_x, blocks_y);

    let mut binary = BitMatrix::new(width, height);
    for by in 0..blocks_y {
        let rows = by.saturating_sub(2)..(by + 3).min(blocks_y);
        for bx in 0..blocks_x {
            let cols = bx.saturating_sub(2)..(bx + 3).min(blocks_x);
            let mut sum = 0u32;
            let mut count = 0u32;
            for ny in rows.clone() {
                for nx in cols.clone() {
                    sum += black_points[ny * blocks_x + nx];
                    count += 1;
                }
            }
            let threshold = sum / count;

            let y_end = ((by + 1) * block).min(height);
            let x_start = bx * block;
            let x_end = ((bx + 1) * block).min(width);
            for y in by * block..y_end {
                let row = source.row(y);
                for x in x_start..x_end {
                    if u32::from(row[x]) <= threshold {
                        binary.set(x, y, true);
                    }
                }
            }
        }
    }
    binary
}

fn block_black_points<S: LuminanceSource + ?Sized>(
    source: &S,
    block: usize,
    blocks_x: usize,
    blocks_y: usize,
) -> Vec<u32> {
    let (width, height) = (source.width(), source.height());
    let mut points = vec![0u32; blocks_x * blocks_y];
    for by in 0..blocks_y {
        let y_end = ((by + 1) * block).min(height);
        for bx in 0..blocks_x {
            let x_start = bx * block;
            let x_end = ((bx + 1) * block).min(width);
            let mut sum = 0u32;
            let mut min = u8::MAX;
            let mut max = u8::MIN;
            for y in by * block..y_end {
                for &pixel in &source.row(y)[x_start..x_end] {
                    sum += u32::from(pixel);
                    min = min.min(pixel);
                    max = max.max(pixel);
                }
            }
            let count = ((y_end - by * block) * (x_end - x_start)) as u32;
            let mut average = sum / count.max(1);
            if max - min <= MIN_DYNAMIC_RANGE {
                average = u32::from(min) / 2;
                if by > 0 && bx > 0 {
                    let above = points[(by - 1) * blocks_x + bx];
                    let left = points[by * blocks_x + bx - 1];
                    let diagonal = points[(by - 1) * blocks_x + bx - 1];
                    let neighbors = (above + 2 * left + diagonal) / 4;
                    if u32::from(min) < neighbors {
                        average = neighbors;
                    }
                }
            }
            points[by * blocks_x + bx] = average;
        }
    }
    points
}
