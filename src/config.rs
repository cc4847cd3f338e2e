//! Scanner configuration with environment overrides

use crate::models::RoiFraction;
use crate::utils::binarization::Binarizer;

fn parse_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_env_bool_u8(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(default)
}

/// Tunables for a [`FramePipeline`](crate::pipeline::FramePipeline)
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    /// Identical values within this window are suppressed
    pub cooldown_ms: u64,
    /// ROI used when no provider is set or it returns nothing
    pub default_roi: RoiFraction,
    /// Offer inverted-polarity candidates
    pub try_inverted: bool,
    /// Adaptive binarizer block edge in pixels
    pub adaptive_block_size: usize,
    /// Below this width or height the adaptive binarizer uses the global threshold
    pub min_adaptive_dimension: usize,
    /// Scan every row instead of a sample of rows
    pub try_harder: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1200,
            default_roi: RoiFraction::DEFAULT,
            try_inverted: true,
            adaptive_block_size: 8,
            min_adaptive_dimension: 40,
            try_harder: true,
        }
    }
}

impl ScannerConfig {
    /// Defaults overlaid with `SCAN_COOLDOWN_MS`, `SCAN_TRY_INVERTED`,
    /// `SCAN_TRY_HARDER` and `SCAN_ADAPTIVE_BLOCK`.
    ///
    /// Booleans are `0`/`1`; unparsable values keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cooldown_ms: parse_env_u64("SCAN_COOLDOWN_MS", defaults.cooldown_ms).min(60_000),
            try_inverted: parse_env_bool_u8("SCAN_TRY_INVERTED", defaults.try_inverted),
            try_harder: parse_env_bool_u8("SCAN_TRY_HARDER", defaults.try_harder),
            adaptive_block_size: parse_env_usize("SCAN_ADAPTIVE_BLOCK", defaults.adaptive_block_size)
                .clamp(2, 64),
            ..defaults
        }
    }

    /// First-stage binarizer for the specialized path
    pub fn adaptive_binarizer(&self) -> Binarizer {
        Binarizer::Adaptive {
            block_size: self.adaptive_block_size,
            min_dimension: self.min_adaptive_dimension,
        }
    }
}
