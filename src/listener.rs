//! Result listener and ROI provider surfaces

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::models::RoiFraction;

/// Receives at most one callback per processed frame
pub trait ScanListener: Send + Sync {
    /// A new value was decoded; `symbology` is a display label such as
    /// `Code 128 (ZXing)`
    fn on_detected(&self, symbology: &str, text: &str);

    /// The frame was processed and nothing was found
    fn on_none_detected(&self);
}

/// Owned form of a listener callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// See [`ScanListener::on_detected`]
    Detected {
        /// Symbology label
        symbology: String,
        /// Decoded text
        text: String,
    },
    /// See [`ScanListener::on_none_detected`]
    NoneDetected,
}

/// Forwards every callback into a channel, so one consumer thread sees
/// them all in order
#[derive(Debug)]
pub struct ChannelListener {
    tx: Mutex<Sender<ScanEvent>>,
}

impl ChannelListener {
    /// Listener plus the receiving end of its channel
    pub fn new() -> (Self, Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }

    fn send(&self, event: ScanEvent) {
        let tx = self.tx.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // A dropped receiver just means nobody is listening any more
        let _ = tx.send(event);
    }
}

impl ScanListener for ChannelListener {
    fn on_detected(&self, symbology: &str, text: &str) {
        self.send(ScanEvent::Detected {
            symbology: symbology.to_owned(),
            text: text.to_owned(),
        });
    }

    fn on_none_detected(&self) {
        self.send(ScanEvent::NoneDetected);
    }
}

/// Supplies the region of interest on demand
pub trait RoiProvider: Send + Sync {
    /// Current ROI, or `None` for the default
    fn roi(&self) -> Option<RoiFraction>;
}

/// Provider that always returns the same ROI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRoi(pub RoiFraction);

impl RoiProvider for FixedRoi {
    fn roi(&self) -> Option<RoiFraction> {
        Some(self.0)
    }
}
