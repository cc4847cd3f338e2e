//! Luminance extraction from camera frame planes
//!
//! The first plane of a frame carries luminance (the Y plane of YUV
//! captures, or a plain gray plane). Rows may be padded (`row_stride >
//! width`) and samples may be interleaved (`pixel_stride > 1`); the grid
//! produced here is always tightly packed.

use rayon::prelude::*;

use crate::error::{Result, ScanError};
use crate::models::{Frame, LuminanceGrid, Plane};

/// Row count above which de-striding is split across the rayon pool
const PARALLEL_MIN_ROWS: usize = 256;

/// Extract a tightly packed `width`x`height` luminance grid from a frame.
///
/// Fails with [`ScanError::FrameUnavailable`] when the frame has no planes
/// or its first plane has no backing buffer. Short buffers are not an
/// error: samples past the end of the buffer are left as zero.
pub fn luminance_from_frame(frame: &Frame) -> Result<LuminanceGrid> {
    let plane = frame.planes().first().ok_or(ScanError::FrameUnavailable)?;
    luminance_from_plane(plane, frame.width(), frame.height())
}

/// Extract a luminance grid from a single plane
pub fn luminance_from_plane(plane: &Plane, width: usize, height: usize) -> Result<LuminanceGrid> {
    let buffer = plane.buffer.as_deref().ok_or(ScanError::FrameUnavailable)?;
    let mut samples = vec![0u8; width * height];
    if width == 0 || height == 0 {
        return LuminanceGrid::new(width, height, samples);
    }

    if plane.pixel_stride == 1 && plane.row_stride == width {
        let len = buffer.len().min(samples.len());
        samples[..len].copy_from_slice(&buffer[..len]);
    } else if height >= PARALLEL_MIN_ROWS {
        samples
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| destride_row(buffer, plane, y, row));
    } else {
        for (y, row) in samples.chunks_mut(width).enumerate() {
            destride_row(buffer, plane, y, row);
        }
    }

    LuminanceGrid::new(width, height, samples)
}

/// Copy one source row, keeping every `pixel_stride`-th byte.
/// Bytes beyond the end of `buffer` stay zero.
fn destride_row(buffer: &[u8], plane: &Plane, y: usize, out: &mut [u8]) {
    let pixel_stride = plane.pixel_stride.max(1);
    let start = y * plane.row_stride;
    if start >= buffer.len() {
        return;
    }
    let end = (start + plane.row_stride).min(buffer.len());
    let src = &buffer[start..end];
    for (x, sample) in out.iter_mut().enumerate() {
        match src.get(x * pixel_stride) {
            Some(&value) => *sample = value,
            None => break,
        }
    }
}
