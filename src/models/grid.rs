use std::sync::Arc;

use crate::error::{Result, ScanError};

/// Read access to single-channel 8-bit luminance samples.
///
/// Rows are contiguous, so both owned grids and cropped views can hand out
/// row slices without copying.
pub trait LuminanceSource {
    /// Width in samples
    fn width(&self) -> usize;
    /// Height in samples
    fn height(&self) -> usize;
    /// Row `y` as a slice of exactly `width()` samples
    fn row(&self, y: usize) -> &[u8];

    /// Sample at (x, y)
    fn sample(&self, x: usize, y: usize) -> u8 {
        self.row(y)[x]
    }
}

/// Row-major luminance samples with no stride padding.
///
/// Invariant: `width * height == samples.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuminanceGrid {
    width: usize,
    height: usize,
    samples: Vec<u8>,
}

impl LuminanceGrid {
    /// Wrap existing samples, checking the size invariant
    pub fn new(width: usize, height: usize, samples: Vec<u8>) -> Result<Self> {
        let expected = width * height;
        if samples.len() != expected {
            return Err(ScanError::buffer_mismatch(expected, samples.len()));
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Grid with every sample set to `value`
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            samples: vec![value; width * height],
        }
    }

    /// Build a grid by evaluating `f(x, y)` for every sample
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            samples,
        }
    }

    /// Sample at (x, y)
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.samples[y * self.width + x]
    }

    /// Set sample at (x, y)
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.samples[y * self.width + x] = value;
    }

    /// All samples, row-major
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Consume the grid, returning its samples
    pub fn into_samples(self) -> Vec<u8> {
        self.samples
    }
}

impl LuminanceSource for LuminanceGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.width;
        &self.samples[start..start + self.width]
    }
}

/// Rectangle in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// Left edge (inclusive)
    pub left: usize,
    /// Top edge (inclusive)
    pub top: usize,
    /// Width in samples
    pub width: usize,
    /// Height in samples
    pub height: usize,
}

impl Region {
    /// Create a region
    pub const fn new(left: usize, top: usize, width: usize, height: usize) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Region covering a whole `width`x`height` grid
    pub const fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Right edge (exclusive), saturating at `usize::MAX`
    pub const fn right(&self) -> usize {
        self.left.saturating_add(self.width)
    }

    /// Bottom edge (exclusive), saturating at `usize::MAX`
    pub const fn bottom(&self) -> usize {
        self.top.saturating_add(self.height)
    }

    /// Non-empty and inside a `width`x`height` grid
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.width >= 1
            && self.height >= 1
            && self.left.checked_add(self.width).is_some_and(|right| right <= width)
            && self.top.checked_add(self.height).is_some_and(|bottom| bottom <= height)
    }
}

/// Rectangle in normalized [0, 1] coordinates of an effective (post-rotation) frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiFraction {
    /// Left edge as a fraction of width
    pub left: f32,
    /// Top edge as a fraction of height
    pub top: f32,
    /// Width as a fraction of width
    pub width: f32,
    /// Height as a fraction of height
    pub height: f32,
}

impl RoiFraction {
    /// Centered 80% x 30% band, where a horizontal 1-D symbol usually sits.
    pub const DEFAULT: RoiFraction = RoiFraction {
        left: 0.1,
        top: 0.35,
        width: 0.8,
        height: 0.3,
    };

    /// Create a fraction rectangle; each component is clamped to [0, 1]
    /// and `NaN` becomes 0.
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            left: unit(left),
            top: unit(top),
            width: unit(width),
            height: unit(height),
        }
    }

    /// Centered rectangle covering `width` x `height` of the frame
    pub fn centered(width: f32, height: f32) -> Self {
        let w = width.clamp(0.0, 1.0);
        let h = height.clamp(0.0, 1.0);
        Self::new((1.0 - w) / 2.0, (1.0 - h) / 2.0, w, h)
    }

    /// Resolve against a `width`x`height` grid, clamped so the result always
    /// fits (for non-empty grids) and is at least 1x1.
    pub fn to_region(&self, width: usize, height: usize) -> Region {
        if width == 0 || height == 0 {
            return Region::new(0, 0, 0, 0);
        }
        let left = ((self.left * width as f32).round() as usize).min(width - 1);
        let top = ((self.top * height as f32).round() as usize).min(height - 1);
        let w = ((self.width * width as f32).round() as usize).clamp(1, width - left);
        let h = ((self.height * height as f32).round() as usize).clamp(1, height - top);
        Region::new(left, top, w, h)
    }
}

impl Default for RoiFraction {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Zero-copy rectangular view into a shared grid.
///
/// Coordinates are local to the region; reads translate into the parent.
#[derive(Debug, Clone)]
pub struct GridView {
    parent: Arc<LuminanceGrid>,
    region: Region,
}

impl GridView {
    /// View `region` of `parent`; rejects regions that do not fit
    pub fn new(parent: Arc<LuminanceGrid>, region: Region) -> Result<Self> {
        if !region.fits(parent.width, parent.height) {
            return Err(ScanError::invalid_region(
                region,
                parent.width,
                parent.height,
            ));
        }
        Ok(Self { parent, region })
    }

    /// View of the entire grid
    pub fn full(parent: Arc<LuminanceGrid>) -> Self {
        let region = Region::full(parent.width, parent.height);
        Self { parent, region }
    }

    /// Narrow this view further; `region` is in this view's local coordinates
    pub fn crop(&self, region: Region) -> Result<Self> {
        if !region.fits(self.region.width, self.region.height) {
            return Err(ScanError::invalid_region(
                region,
                self.region.width,
                self.region.height,
            ));
        }
        Ok(Self {
            parent: Arc::clone(&self.parent),
            region: Region::new(
                self.region.left + region.left,
                self.region.top + region.top,
                region.width,
                region.height,
            ),
        })
    }

    /// Region of the parent this view covers
    pub fn region(&self) -> Region {
        self.region
    }

    /// Grid this view reads from
    pub fn parent(&self) -> &Arc<LuminanceGrid> {
        &self.parent
    }

    /// Copy the viewed samples into a new owned grid
    pub fn to_grid(&self) -> LuminanceGrid {
        let mut samples = Vec::with_capacity(self.region.width * self.region.height);
        for y in 0..self.region.height {
            samples.extend_from_slice(self.row(y));
        }
        LuminanceGrid {
            width: self.region.width,
            height: self.region.height,
            samples,
        }
    }
}

impl LuminanceSource for GridView {
    fn width(&self) -> usize {
        self.region.width
    }

    fn height(&self) -> usize {
        self.region.height
    }

    fn row(&self, y: usize) -> &[u8] {
        let start = (self.region.top + y) * self.parent.width + self.region.left;
        &self.parent.samples[start..start + self.region.width]
    }
}
