//! Specialized (single-symbology) engine adapter
//!
//! Wraps a stateful 1-D reader. Every candidate is binarized adaptively
//! first and, when that finds nothing, again with a global histogram
//! threshold. The reader is reset after every attempt through
//! [`EngineSession`], so no state leaks from one candidate to the next.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use super::strategy::{DecodeStrategy, ScanInput};
use crate::candidates::DecodeCandidate;
use crate::models::{BitMatrix, DecodeOutcome, Symbology};
use crate::utils::binarization::Binarizer;

/// Construction hints for a single-symbology reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderHints {
    /// Symbology the reader looks for
    pub target: Symbology,
    /// Scan more rows at the cost of speed
    pub try_harder: bool,
}

/// Synchronous single-symbology decoder working on a binary image.
///
/// Implementations may keep state between calls; callers reset them after
/// each attempt.
pub trait LinearReader: Send {
    /// Symbology this reader decodes
    fn symbology(&self) -> Symbology;

    /// Decode one binary image
    fn decode(&mut self, image: &BitMatrix) -> DecodeOutcome;

    /// Drop any state left from the previous attempt
    fn reset(&mut self);
}

/// Exclusive handle on a reader; resets it when dropped
pub struct EngineSession<'a, R: LinearReader> {
    reader: MutexGuard<'a, R>,
}

impl<'a, R: LinearReader> EngineSession<'a, R> {
    /// Lock the reader for one attempt.
    ///
    /// A poisoned lock is recovered: the reset on drop restores a usable state.
    pub fn acquire(reader: &'a Mutex<R>) -> Self {
        Self {
            reader: reader.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl<R: LinearReader> Deref for EngineSession<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.reader
    }
}

impl<R: LinearReader> DerefMut for EngineSession<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

impl<R: LinearReader> Drop for EngineSession<'_, R> {
    fn drop(&mut self) {
        self.reader.reset();
    }
}

/// Drives a [`LinearReader`] over a frame's candidates.
///
/// The reader is built once and reused for every candidate of every frame.
pub struct SpecializedDecoder<R: LinearReader> {
    reader: Mutex<R>,
    binarizers: [Binarizer; 2],
}

impl<R: LinearReader> SpecializedDecoder<R> {
    /// Adaptive (8px blocks) then global histogram
    pub fn new(reader: R) -> Self {
        Self::with_binarizers(reader, Binarizer::ADAPTIVE, Binarizer::GlobalHistogram)
    }

    /// Custom binarizer pair, tried in order
    pub fn with_binarizers(reader: R, first: Binarizer, fallback: Binarizer) -> Self {
        Self {
            reader: Mutex::new(reader),
            binarizers: [first, fallback],
        }
    }

    /// Symbology owned by the wrapped reader
    pub fn symbology(&self) -> Symbology {
        EngineSession::acquire(&self.reader).symbology()
    }

    /// Decode one candidate with both binarizers
    pub fn decode_candidate(&self, candidate: &DecodeCandidate) -> DecodeOutcome {
        let [first, fallback] = self.binarizers;
        self.attempt(candidate, first)
            .or_else(|| self.attempt(candidate, fallback))
    }

    /// First detection across `candidates`, consumed lazily and in order
    pub fn decode_first(&self, candidates: impl IntoIterator<Item = DecodeCandidate>) -> DecodeOutcome {
        let mut tried = 0usize;
        for candidate in candidates {
            tried += 1;
            if let DecodeOutcome::Detected(detection) = self.decode_candidate(&candidate) {
                debug!(candidate = %candidate, tried, "specialized decode hit");
                return DecodeOutcome::Detected(detection);
            }
        }
        debug!(tried, "specialized decode exhausted candidates");
        DecodeOutcome::NotFound
    }

    fn attempt(&self, candidate: &DecodeCandidate, binarizer: Binarizer) -> DecodeOutcome {
        let matrix = binarizer.binarize(&candidate.image);
        let mut session = EngineSession::acquire(&self.reader);
        let outcome = session.decode(&matrix);
        trace!(
            candidate = %candidate,
            binarizer = binarizer.name(),
            found = outcome.is_detected(),
            "specialized attempt"
        );
        outcome
    }
}

impl<R: LinearReader> DecodeStrategy for SpecializedDecoder<R> {
    fn name(&self) -> &str {
        "specialized"
    }

    fn decode(&self, input: &ScanInput) -> DecodeOutcome {
        self.decode_first(input.candidates())
    }
}
