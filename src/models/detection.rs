use std::fmt;

/// Barcode symbology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    /// QR Code
    QrCode,
    /// Code 128
    Code128,
    /// Code 39
    Code39,
    /// Code 93
    Code93,
    /// Codabar
    Codabar,
    /// EAN-13
    Ean13,
    /// EAN-8
    Ean8,
    /// UPC-A
    UpcA,
    /// UPC-E
    UpcE,
    /// PDF417
    Pdf417,
    /// Aztec
    Aztec,
    /// Data Matrix
    DataMatrix,
    /// Interleaved 2 of 5
    Itf,
    /// Engine-specific format code with no known name
    Unknown(i32),
}

impl Symbology {
    /// Every named symbology, in reporting order
    pub const SUPPORTED: [Symbology; 13] = [
        Symbology::QrCode,
        Symbology::Code128,
        Symbology::Code39,
        Symbology::Code93,
        Symbology::Codabar,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Pdf417,
        Symbology::Aztec,
        Symbology::DataMatrix,
        Symbology::Itf,
    ];

    /// Human-readable name
    pub fn name(&self) -> String {
        let name = match self {
            Symbology::QrCode => "QR Code",
            Symbology::Code128 => "Code 128",
            Symbology::Code39 => "Code 39",
            Symbology::Code93 => "Code 93",
            Symbology::Codabar => "Codabar",
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcA => "UPC-A",
            Symbology::UpcE => "UPC-E",
            Symbology::Pdf417 => "PDF417",
            Symbology::Aztec => "Aztec",
            Symbology::DataMatrix => "Data Matrix",
            Symbology::Itf => "ITF",
            Symbology::Unknown(code) => return format!("Unknown ({code})"),
        };
        name.to_string()
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A decoded symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Symbology of the decoded symbol
    pub symbology: Symbology,
    /// Decoded text
    pub text: String,
    /// Engine family that produced the result, if it tags its results
    pub source: Option<String>,
}

impl Detection {
    /// Untagged detection
    pub fn new(symbology: Symbology, text: impl Into<String>) -> Self {
        Self {
            symbology,
            text: text.into(),
            source: None,
        }
    }

    /// Tag the detection with the engine family that produced it
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Label reported to listeners, e.g. `Code 128 (ZXing)` or `QR Code`
    pub fn label(&self) -> String {
        match &self.source {
            Some(source) => format!("{} ({})", self.symbology, source),
            None => self.symbology.name(),
        }
    }
}

/// Outcome of a single decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A symbol was decoded
    Detected(Detection),
    /// Nothing decodable in this input
    NotFound,
}

impl DecodeOutcome {
    /// True for [`DecodeOutcome::Detected`]
    pub fn is_detected(&self) -> bool {
        matches!(self, DecodeOutcome::Detected(_))
    }

    /// Keep a detection, otherwise run `next`
    pub fn or_else(self, next: impl FnOnce() -> DecodeOutcome) -> DecodeOutcome {
        match self {
            DecodeOutcome::Detected(_) => self,
            DecodeOutcome::NotFound => next(),
        }
    }

    /// The detection, if any
    pub fn detection(self) -> Option<Detection> {
        match self {
            DecodeOutcome::Detected(detection) => Some(detection),
            DecodeOutcome::NotFound => None,
        }
    }
}

impl From<Option<Detection>> for DecodeOutcome {
    fn from(value: Option<Detection>) -> Self {
        match value {
            Some(detection) => DecodeOutcome::Detected(detection),
            None => DecodeOutcome::NotFound,
        }
    }
}
