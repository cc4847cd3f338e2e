//! Ordered decode candidates for one frame
//!
//! A frame is tried as several *bases* (ROI crop or full grid, on a grid
//! pre-rotated to the sensor orientation or on the original), each at four
//! quarter-turn orientations, each in normal then inverted polarity. The
//! sequence is produced lazily so a reader that succeeds early never pays
//! for the rotations and inversions behind it.

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::models::{GridView, LuminanceGrid, LuminanceSource, RoiFraction, Rotation};
use crate::utils::geometry::{crop, invert_polarity, rotate};

/// Where a candidate's pixels come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
    /// ROI crop of the grid pre-rotated to the sensor orientation
    RoiRotated,
    /// Full grid pre-rotated to the sensor orientation
    FullRotated,
    /// ROI crop of the original grid
    RoiOriginal,
    /// Full original grid
    FullOriginal,
}

impl BaseKind {
    /// Short name for logs and labels
    pub fn name(self) -> &'static str {
        match self {
            BaseKind::RoiRotated => "roi-rotated",
            BaseKind::FullRotated => "full-rotated",
            BaseKind::RoiOriginal => "roi-original",
            BaseKind::FullOriginal => "full-original",
        }
    }

    fn is_rotated(self) -> bool {
        matches!(self, BaseKind::RoiRotated | BaseKind::FullRotated)
    }

    fn is_roi(self) -> bool {
        matches!(self, BaseKind::RoiRotated | BaseKind::RoiOriginal)
    }
}

/// Bases tried for a sensor rotation, in priority order.
///
/// Upright and upside-down frames have no distinct pre-rotated base.
pub fn base_order(rotation: Rotation) -> &'static [BaseKind] {
    if rotation.is_transposed() {
        &[
            BaseKind::RoiRotated,
            BaseKind::FullRotated,
            BaseKind::RoiOriginal,
            BaseKind::FullOriginal,
        ]
    } else {
        &[BaseKind::RoiOriginal, BaseKind::FullOriginal]
    }
}

/// Orientations tried for a sensor rotation, starting from the sensor's own
pub fn offset_order(rotation: Rotation) -> [Rotation; 4] {
    use Rotation::*;
    match rotation {
        Deg90 => [Deg90, Deg0, Deg180, Deg270],
        Deg270 => [Deg270, Deg0, Deg90, Deg180],
        Deg0 | Deg180 => [Deg0, Deg90, Deg180, Deg270],
    }
}

/// Photometric polarity of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    /// Samples as captured
    Normal,
    /// 255 - sample
    Inverted,
}

/// A unit of work offered to a decode engine
#[derive(Debug, Clone)]
pub struct DecodeCandidate {
    /// Pixels to decode
    pub image: GridView,
    /// Source base
    pub base: BaseKind,
    /// Orientation relative to the original frame
    pub orientation: Rotation,
    /// Quarter turns applied on top of the base
    pub extra_turns: u32,
    /// Polarity
    pub polarity: Polarity,
}

impl DecodeCandidate {
    /// Label such as `roi-rotated 90° normal`
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DecodeCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let polarity = match self.polarity {
            Polarity::Normal => "normal",
            Polarity::Inverted => "inverted",
        };
        write!(f, "{} {} {}", self.base.name(), self.orientation, polarity)
    }
}

/// Lazy, single-pass candidate sequence for one frame
pub struct Candidates {
    grid: Arc<LuminanceGrid>,
    rotation: Rotation,
    roi: RoiFraction,
    try_inverted: bool,
    bases: &'static [BaseKind],
    next_base: usize,
    rotated: Option<Arc<LuminanceGrid>>,
    current: Option<(BaseKind, GridView)>,
    next_offset: usize,
    pending_inverse: Option<DecodeCandidate>,
}

impl Candidates {
    /// Candidates for `grid` captured at sensor `rotation`
    pub fn new(grid: Arc<LuminanceGrid>, rotation: Rotation, roi: RoiFraction) -> Self {
        Self {
            grid,
            rotation,
            roi,
            try_inverted: true,
            bases: base_order(rotation),
            next_base: 0,
            rotated: None,
            current: None,
            next_offset: 0,
            pending_inverse: None,
        }
    }

    /// Enable or disable the inverted-polarity candidates
    pub fn with_inverted(mut self, try_inverted: bool) -> Self {
        self.try_inverted = try_inverted;
        self
    }

    /// Move to the next base that can be built; `false` when none remain
    fn advance_base(&mut self) -> bool {
        while let Some(&kind) = self.bases.get(self.next_base) {
            self.next_base += 1;
            let parent = if kind.is_rotated() {
                let turns = self.rotation.quarter_turns();
                let grid = &self.grid;
                Arc::clone(
                    self.rotated
                        .get_or_insert_with(|| Arc::new(rotate(grid.as_ref(), turns))),
                )
            } else {
                Arc::clone(&self.grid)
            };

            let view = if kind.is_roi() {
                let region = self.roi.to_region(parent.width(), parent.height());
                match crop(&parent, region) {
                    Ok(view) => view,
                    Err(err) => {
                        warn!(base = kind.name(), error = %err, "skipping candidate base");
                        continue;
                    }
                }
            } else {
                GridView::full(parent)
            };

            self.current = Some((kind, view));
            self.next_offset = 0;
            return true;
        }
        false
    }

    fn base_rotation(&self, kind: BaseKind) -> Rotation {
        if kind.is_rotated() {
            self.rotation
        } else {
            Rotation::Deg0
        }
    }
}

impl Iterator for Candidates {
    type Item = DecodeCandidate;

    fn next(&mut self) -> Option<DecodeCandidate> {
        if let Some(normal) = self.pending_inverse.take() {
            if let Some(inverted) = invert_polarity(&normal.image) {
                return Some(DecodeCandidate {
                    image: GridView::full(Arc::new(inverted)),
                    polarity: Polarity::Inverted,
                    ..normal
                });
            }
            trace!(candidate = %normal, "no inverse available");
        }

        loop {
            if self.current.is_none() && !self.advance_base() {
                return None;
            }
            let Some((kind, view)) = self.current.clone() else {
                return None;
            };

            let offsets = offset_order(self.rotation);
            let Some(&orientation) = offsets.get(self.next_offset) else {
                self.current = None;
                continue;
            };
            self.next_offset += 1;

            let extra_turns = self.base_rotation(kind).turns_to(orientation);
            let image = if extra_turns == 0 {
                view
            } else {
                GridView::full(Arc::new(rotate(&view, extra_turns)))
            };
            let candidate = DecodeCandidate {
                image,
                base: kind,
                orientation,
                extra_turns,
                polarity: Polarity::Normal,
            };
            if self.try_inverted {
                self.pending_inverse = Some(candidate.clone());
            }
            return Some(candidate);
        }
    }
}

impl fmt::Debug for Candidates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidates")
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("rotation", &self.rotation)
            .field("next_base", &self.next_base)
            .field("next_offset", &self.next_offset)
            .finish()
    }
}
