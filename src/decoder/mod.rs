//! Decode engines and the adapters that drive them
//!
//! - `linear`: stateful single-symbology readers and the specialized adapter
//!   (adaptive then global binarization, reset after every attempt)
//! - `code128`: the Code 128 reader used as the specialized engine
//! - `general`: asynchronous multi-symbology engine contract and adapter
//! - `qr_engine`: QR engine on the rayon pool
//! - `strategy`: synchronous strategies composed in try-in-order chains

/// Code 128 row reader and encoder
pub mod code128;
/// General engine contract, options and adapter
pub mod general;
/// Specialized reader contract, scoped sessions and adapter
pub mod linear;
/// QR engine backed by rqrr
pub mod qr_engine;
/// Synchronous strategies
pub mod strategy;

pub use code128::Code128Reader;
pub use general::{Completion, EngineOptions, GeneralDecoder, SymbolEngine};
pub use linear::{EngineSession, LinearReader, ReaderHints, SpecializedDecoder};
pub use qr_engine::QrEngine;
pub use strategy::{DecodeStrategy, ScanInput, TryInOrder};
