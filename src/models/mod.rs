/// Symbologies, detections and decode outcomes
pub mod detection;
/// Camera frames, planes and sensor rotation
pub mod frame;
/// Luminance grids, regions and zero-copy views
pub mod grid;
/// Packed binary images
pub mod matrix;

pub use detection::{DecodeOutcome, Detection, Symbology};
pub use frame::{Frame, Plane, Rotation};
pub use grid::{GridView, LuminanceGrid, LuminanceSource, Region, RoiFraction};
pub use matrix::BitMatrix;
