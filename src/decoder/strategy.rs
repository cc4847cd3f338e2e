//! Synchronous decode strategies and their short-circuiting composition

use std::sync::Arc;

use tracing::trace;

use crate::candidates::Candidates;
use crate::models::{DecodeOutcome, LuminanceGrid, RoiFraction, Rotation};

/// Everything a synchronous strategy needs to decode one frame
#[derive(Debug, Clone)]
pub struct ScanInput {
    /// Luminance of the original, un-rotated frame
    pub grid: Arc<LuminanceGrid>,
    /// Sensor rotation
    pub rotation: Rotation,
    /// Region of interest in effective-frame fractions
    pub roi: RoiFraction,
    /// Offer inverted-polarity candidates
    pub try_inverted: bool,
}

impl ScanInput {
    /// Input with the default ROI and inversion enabled
    pub fn new(grid: Arc<LuminanceGrid>, rotation: Rotation) -> Self {
        Self {
            grid,
            rotation,
            roi: RoiFraction::DEFAULT,
            try_inverted: true,
        }
    }

    /// Fresh lazy candidate sequence for this input
    pub fn candidates(&self) -> Candidates {
        Candidates::new(Arc::clone(&self.grid), self.rotation, self.roi)
            .with_inverted(self.try_inverted)
    }
}

/// One way of decoding a frame
pub trait DecodeStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Decode `input`, or report [`DecodeOutcome::NotFound`]
    fn decode(&self, input: &ScanInput) -> DecodeOutcome;
}

/// Runs strategies in order and stops at the first detection
#[derive(Default)]
pub struct TryInOrder {
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl TryInOrder {
    /// Empty chain; always reports `NotFound`
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy
    pub fn then(mut self, strategy: impl DecodeStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Number of strategies in the chain
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// True when the chain has no strategies
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl DecodeStrategy for TryInOrder {
    fn name(&self) -> &str {
        "try-in-order"
    }

    fn decode(&self, input: &ScanInput) -> DecodeOutcome {
        for strategy in &self.strategies {
            let outcome = strategy.decode(input);
            trace!(strategy = strategy.name(), found = outcome.is_detected(), "strategy finished");
            if outcome.is_detected() {
                return outcome;
            }
        }
        DecodeOutcome::NotFound
    }
}
