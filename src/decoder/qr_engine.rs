//! QR engine backed by `rqrr`, run on the rayon pool

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rqrr::PreparedImage;
use tracing::trace;

use super::general::{Completion, EngineOptions, SymbolEngine};
use crate::error::ScanError;
use crate::models::{Detection, LuminanceGrid, LuminanceSource, Symbology};

/// General engine that finds QR symbols
#[derive(Debug)]
pub struct QrEngine {
    options: EngineOptions,
    closed: Arc<AtomicBool>,
}

impl QrEngine {
    /// Engine reporting whatever `options` allows (QR only, in practice)
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once [`SymbolEngine::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for QrEngine {
    fn default() -> Self {
        Self::new(EngineOptions::all_except(Symbology::Code128))
    }
}

impl SymbolEngine for QrEngine {
    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn process(&self, image: Arc<LuminanceGrid>, done: Completion) {
        if self.is_closed() {
            done(Err(ScanError::EngineClosed));
            return;
        }
        if !self.options.allows(Symbology::QrCode) {
            done(Ok(Vec::new()));
            return;
        }
        let closed = Arc::clone(&self.closed);
        rayon::spawn(move || {
            // Closed while queued
            if closed.load(Ordering::Acquire) {
                done(Err(ScanError::EngineClosed));
                return;
            }
            done(Ok(scan_qr(image.as_ref())))
        });
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Decode every QR symbol `rqrr` can find in `source`
pub fn scan_qr<S: LuminanceSource + ?Sized>(source: &S) -> Vec<Detection> {
    let mut prepared =
        PreparedImage::prepare_from_greyscale(source.width(), source.height(), |x, y| {
            source.sample(x, y)
        });
    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_meta, content)) => Some(Detection::new(Symbology::QrCode, content)),
            Err(err) => {
                trace!(error = ?err, "qr grid failed to decode");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn process(engine: &QrEngine, grid: LuminanceGrid) -> crate::error::Result<Vec<Detection>> {
        let (tx, rx) = mpsc::channel();
        engine.process(
            Arc::new(grid),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.recv_timeout(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_blank_image_has_no_symbols() {
        let engine = QrEngine::default();
        let result = process(&engine, LuminanceGrid::filled(64, 64, 255)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_closed_engine_rejects_work() {
        let engine = QrEngine::default();
        engine.close();
        assert!(engine.is_closed());
        let result = process(&engine, LuminanceGrid::filled(8, 8, 255));
        assert!(matches!(result, Err(ScanError::EngineClosed)));
    }

    #[test]
    fn test_excluded_qr_reports_nothing() {
        let engine = QrEngine::new(EngineOptions::all_except(Symbology::QrCode));
        let result = process(&engine, LuminanceGrid::filled(8, 8, 0)).unwrap();
        assert!(result.is_empty());
    }
}
