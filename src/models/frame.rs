use std::fmt;

/// Clockwise rotation reported by the sensor, in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// Upright
    #[default]
    Deg0,
    /// One quarter turn
    Deg90,
    /// Half turn
    Deg180,
    /// Three quarter turns
    Deg270,
}

impl Rotation {
    /// All rotations in ascending order
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Parse a multiple of 90 degrees (negative values wrap around)
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Self::from_quarter_turns(degrees.rem_euclid(360) as u32 / 90))
    }

    /// Rotation made of `turns` quarter turns (taken modulo 4)
    pub fn from_quarter_turns(turns: u32) -> Self {
        Self::ALL[(turns % 4) as usize]
    }

    /// Number of quarter turns, 0..=3
    pub fn quarter_turns(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    /// Rotation in degrees
    pub fn degrees(self) -> u32 {
        self.quarter_turns() * 90
    }

    /// True when width and height swap (90 and 270)
    pub fn is_transposed(self) -> bool {
        self.quarter_turns() % 2 == 1
    }

    /// Turns needed to go from `self` to `target`
    pub fn turns_to(self, target: Rotation) -> u32 {
        (target.quarter_turns() + 4 - self.quarter_turns()) % 4
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// One byte plane of a camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    /// Backing bytes; `None` once the buffer has been released
    pub buffer: Option<Vec<u8>>,
    /// Bytes between the starts of consecutive rows
    pub row_stride: usize,
    /// Bytes between consecutive samples in a row
    pub pixel_stride: usize,
}

impl Plane {
    /// Plane over `buffer` with the given strides
    pub fn new(buffer: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            buffer: Some(buffer),
            row_stride,
            pixel_stride,
        }
    }

    /// Tightly packed single-channel plane
    pub fn packed(buffer: Vec<u8>, width: usize) -> Self {
        Self::new(buffer, width, 1)
    }

    /// Plane whose backing buffer is gone
    pub fn released(row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            buffer: None,
            row_stride,
            pixel_stride,
        }
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A single camera capture.
///
/// The frame owns its planes and an optional release hook. The hook runs
/// exactly once, when the frame is dropped; [`Frame::close`] is an explicit
/// drop.
pub struct Frame {
    width: usize,
    height: usize,
    rotation: Rotation,
    planes: Vec<Plane>,
    release: Option<ReleaseHook>,
}

impl Frame {
    /// Create a frame from planes; the first plane must carry luminance
    pub fn new(width: usize, height: usize, rotation: Rotation, planes: Vec<Plane>) -> Self {
        Self {
            width,
            height,
            rotation,
            planes,
            release: None,
        }
    }

    /// Frame over tightly packed luminance bytes
    pub fn from_luma(width: usize, height: usize, rotation: Rotation, luma: Vec<u8>) -> Self {
        Self::new(width, height, rotation, vec![Plane::packed(luma, width)])
    }

    /// Attach a hook that runs when the frame is released
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Sensor-reported rotation
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// All planes
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Release the frame now
    pub fn close(self) {}
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("planes", &self.planes.len())
            .finish()
    }
}
