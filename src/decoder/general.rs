//! General (multi-symbology) engine contract and adapter
//!
//! The engine works asynchronously: [`SymbolEngine::process`] returns at
//! once and hands its result list to a completion callback later, on
//! whatever thread the engine runs on.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{DecodeOutcome, Detection, LuminanceGrid, Symbology};

/// Completion callback for one [`SymbolEngine::process`] call
pub type Completion = Box<dyn FnOnce(Result<Vec<Detection>>) + Send + 'static>;

/// Allow-list of symbologies an engine reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Symbologies the engine may report
    pub formats: Vec<Symbology>,
}

impl EngineOptions {
    /// Every supported symbology
    pub fn all() -> Self {
        Self {
            formats: Symbology::SUPPORTED.to_vec(),
        }
    }

    /// Every supported symbology except `excluded`
    pub fn all_except(excluded: Symbology) -> Self {
        Self {
            formats: Symbology::SUPPORTED
                .into_iter()
                .filter(|&symbology| symbology != excluded)
                .collect(),
        }
    }

    /// True when `symbology` is on the list
    pub fn allows(&self, symbology: Symbology) -> bool {
        self.formats.contains(&symbology)
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::all()
    }
}

/// Asynchronous multi-symbology decode engine
pub trait SymbolEngine: Send + Sync {
    /// Allow-list the engine was configured with
    fn options(&self) -> &EngineOptions;

    /// Start decoding `image`; `done` runs exactly once with the results
    fn process(&self, image: Arc<LuminanceGrid>, done: Completion);

    /// Release the engine; later `process` calls complete with
    /// [`ScanError::EngineClosed`](crate::error::ScanError::EngineClosed)
    fn close(&self);
}

/// Maps the engine's result list onto a single [`DecodeOutcome`]
#[derive(Clone)]
pub struct GeneralDecoder {
    engine: Arc<dyn SymbolEngine>,
}

impl GeneralDecoder {
    /// Wrap an engine
    pub fn new(engine: Arc<dyn SymbolEngine>) -> Self {
        Self { engine }
    }

    /// Decode the full original frame; `done` gets the first result, or
    /// `NotFound` for an empty list or an engine failure
    pub fn decode_async(
        &self,
        image: Arc<LuminanceGrid>,
        done: impl FnOnce(DecodeOutcome) + Send + 'static,
    ) {
        self.engine.process(
            image,
            Box::new(move |result| done(first_detection(result))),
        );
    }

    /// Close the wrapped engine
    pub fn close(&self) {
        self.engine.close();
    }
}

/// First result of an engine run; failures and empty lists are `NotFound`
pub fn first_detection(result: Result<Vec<Detection>>) -> DecodeOutcome {
    match result {
        Ok(detections) => {
            debug!(count = detections.len(), "general engine finished");
            detections.into_iter().next().into()
        }
        Err(err) => {
            warn!(error = %err, "general engine failed");
            DecodeOutcome::NotFound
        }
    }
}
