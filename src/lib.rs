//! frame_scan - per-frame barcode decoding for live camera feeds
//!
//! A [`FramePipeline`] takes one camera [`Frame`] at a time, extracts its
//! luminance plane and tries a specialized Code 128 reader over an ordered
//! set of orientation, region and polarity candidates. When that finds
//! nothing, the frame goes to a general multi-symbology engine (QR). Values
//! repeated within a cooldown are suppressed before they reach the
//! [`ScanListener`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use frame_scan::{ChannelListener, Frame, FramePipeline, Rotation};
//!
//! let (listener, events) = ChannelListener::new();
//! let pipeline = FramePipeline::new(Arc::new(listener));
//! let frame = Frame::from_luma(640, 480, Rotation::Deg0, vec![255; 640 * 480]);
//! pipeline.submit(frame);
//! println!("{:?}", events.recv());
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Ordered decode candidates (base x orientation x polarity)
pub mod candidates;
/// Scanner settings and environment overrides
pub mod config;
/// Decode engines, engine adapters and strategies
pub mod decoder;
/// Cooldown filter and clocks
pub mod dedup;
/// Crate error type
pub mod error;
/// Listener and ROI provider surfaces
pub mod listener;
/// Core data structures (Frame, LuminanceGrid, Region, BitMatrix, Detection)
pub mod models;
/// Single-flight frame controller
pub mod pipeline;
/// Image loading, rendering and statistics helpers
pub mod tools;
/// Pixel operations (luminance, geometry, binarization)
pub mod utils;

pub use candidates::{BaseKind, Candidates, DecodeCandidate, Polarity};
pub use config::ScannerConfig;
pub use decoder::{
    Code128Reader, DecodeStrategy, EngineOptions, QrEngine, ScanInput, SpecializedDecoder,
    SymbolEngine, TryInOrder,
};
pub use dedup::{Clock, Debouncer, ManualClock, SystemClock};
pub use error::{Result, ScanError};
pub use listener::{ChannelListener, FixedRoi, RoiProvider, ScanEvent, ScanListener};
pub use models::{
    BitMatrix, DecodeOutcome, Detection, Frame, GridView, LuminanceGrid, LuminanceSource, Plane,
    Region, RoiFraction, Rotation, Symbology,
};
pub use pipeline::{FramePipeline, PipelineState, PipelineStats, Submission};
