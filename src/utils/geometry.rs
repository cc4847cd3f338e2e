//! Orientation, cropping and polarity transforms on luminance grids
use std::sync::Arc;

use crate::error::Result;
use crate::models::{GridView, LuminanceGrid, LuminanceSource, Region};

/// Rotate a grid by one quarter turn.
///
/// The result is `height` wide and `width` tall; the source sample at
/// (x, y) lands at (y, width - 1 - x). Four applications give back the
/// original grid.
pub fn rotate90<S: LuminanceSource + ?Sized>(source: &S) -> LuminanceGrid {
    let width = source.width();
    // Destination row `ny` is source column `width - 1 - ny`
    LuminanceGrid::from_fn(source.height(), width, |nx, ny| {
        source.sample(width - 1 - ny, nx)
    })
}

/// Apply `turns` quarter turns (taken modulo 4); zero turns copies the source
pub fn rotate<S: LuminanceSource + ?Sized>(source: &S, turns: u32) -> LuminanceGrid {
    match turns % 4 {
        0 => copy_of(source),
        n => {
            let mut grid = rotate90(source);
            for _ in 1..n {
                grid = rotate90(&grid);
            }
            grid
        }
    }
}

/// Zero-copy view of `region` inside `parent`.
///
/// Fails with [`ScanError::InvalidRegion`](crate::error::ScanError::InvalidRegion)
/// when the region is empty or extends past the grid.
pub fn crop(parent: &Arc<LuminanceGrid>, region: Region) -> Result<GridView> {
    GridView::new(Arc::clone(parent), region)
}

/// Photometric negative (255 - sample).
///
/// A grid with a single uniform value has no meaningful inverse, so
/// `None` is returned and the inverted attempt can be skipped.
pub fn invert_polarity<S: LuminanceSource + ?Sized>(source: &S) -> Option<LuminanceGrid> {
    let (width, height) = (source.width(), source.height());
    if width == 0 || height == 0 {
        return None;
    }
    let first = source.sample(0, 0);
    let uniform = (0..height).all(|y| source.row(y).iter().all(|&v| v == first));
    if uniform {
        return None;
    }
    let mut samples = Vec::with_capacity(width * height);
    for y in 0..height {
        samples.extend(source.row(y).iter().map(|&v| 255 - v));
    }
    LuminanceGrid::new(width, height, samples).ok()
}

fn copy_of<S: LuminanceSource + ?Sized>(source: &S) -> LuminanceGrid {
    LuminanceGrid::from_fn(source.width(), source.height(), |x, y| source.sample(x, y))
}
