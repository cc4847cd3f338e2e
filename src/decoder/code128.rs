//! Code 128 reader
//!
//! Scans rows of a binarized image, matching 6-element bar/space groups
//! against the symbol table by normalized width variance. A row decodes
//! when it holds a start symbol behind a quiet zone, data symbols, a
//! checksum that verifies mod 103, and a stop symbol with its final bar.

use tracing::trace;

use super::linear::{LinearReader, ReaderHints};
use crate::models::{BitMatrix, DecodeOutcome, Detection, Symbology};

/// Source tag attached to results; the reader follows ZXing's 1-D conventions
pub const SOURCE_TAG: &str = "ZXing";

/// Bar/space module widths for symbol values 0..=106 (106 is STOP without
/// its trailing bar)
const CODE_PATTERNS: [[u8; 6]; 107] = [
    [2, 1, 2, 2, 2, 2],
    [2, 2, 2, 1, 2, 2],
    [2, 2, 2, 2, 2, 1],
    [1, 2, 1, 2, 2, 3],
    [1, 2, 1, 3, 2, 2],
    [1, 3, 1, 2, 2, 2],
    [1, 2, 2, 2, 1, 3],
    [1, 2, 2, 3, 1, 2],
    [1, 3, 2, 2, 1, 2],
    [2, 2, 1, 2, 1, 3],
    [2, 2, 1, 3, 1, 2],
    [2, 3, 1, 2, 1, 2],
    [1, 1, 2, 2, 3, 2],
    [1, 2, 2, 1, 3, 2],
    [1, 2, 2, 2, 3, 1],
    [1, 1, 3, 2, 2, 2],
    [1, 2, 3, 1, 2, 2],
    [1, 2, 3, 2, 2, 1],
    [2, 2, 3, 2, 1, 1],
    [2, 2, 1, 1, 3, 2],
    [2, 2, 1, 2, 3, 1],
    [2, 1, 3, 2, 1, 2],
    [2, 2, 3, 1, 1, 2],
    [3, 1, 2, 1, 3, 1],
    [3, 1, 1, 2, 2, 2],
    [3, 2, 1, 1, 2, 2],
    [3, 2, 1, 2, 2, 1],
    [3, 1, 2, 2, 1, 2],
    [3, 2, 2, 1, 1, 2],
    [3, 2, 2, 2, 1, 1],
    [2, 1, 2, 1, 2, 3],
    [2, 1, 2, 3, 2, 1],
    [2, 3, 2, 1, 2, 1],
    [1, 1, 1, 3, 2, 3],
    [1, 3, 1, 1, 2, 3],
    [1, 3, 1, 3, 2, 1],
    [1, 1, 2, 3, 1, 3],
    [1, 3, 2, 1, 1, 3],
    [1, 3, 2, 3, 1, 1],
    [2, 1, 1, 3, 1, 3],
    [2, 3, 1, 1, 1, 3],
    [2, 3, 1, 3, 1, 1],
    [1, 1, 2, 1, 3, 3],
    [1, 1, 2, 3, 3, 1],
    [1, 3, 2, 1, 3, 1],
    [1, 1, 3, 1, 2, 3],
    [1, 1, 3, 3, 2, 1],
    [1, 3, 3, 1, 2, 1],
    [3, 1, 3, 1, 2, 1],
    [2, 1, 1, 3, 3, 1],
    [2, 3, 1, 1, 3, 1],
    [2, 1, 3, 1, 1, 3],
    [2, 1, 3, 3, 1, 1],
    [2, 1, 3, 1, 3, 1],
    [3, 1, 1, 1, 2, 3],
    [3, 1, 1, 3, 2, 1],
    [3, 3, 1, 1, 2, 1],
    [3, 1, 2, 1, 1, 3],
    [3, 1, 2, 3, 1, 1],
    [3, 3, 2, 1, 1, 1],
    [3, 1, 4, 1, 1, 1],
    [2, 2, 1, 4, 1, 1],
    [4, 3, 1, 1, 1, 1],
    [1, 1, 1, 2, 2, 4],
    [1, 1, 1, 4, 2, 2],
    [1, 2, 1, 1, 2, 4],
    [1, 2, 1, 4, 2, 1],
    [1, 4, 1, 1, 2, 2],
    [1, 4, 1, 2, 2, 1],
    [1, 1, 2, 2, 1, 4],
    [1, 1, 2, 4, 1, 2],
    [1, 2, 2, 1, 1, 4],
    [1, 2, 2, 4, 1, 1],
    [1, 4, 2, 1, 1, 2],
    [1, 4, 2, 2, 1, 1],
    [2, 4, 1, 2, 1, 1],
    [2, 2, 1, 1, 1, 4],
    [4, 1, 3, 1, 1, 1],
    [2, 4, 1, 1, 1, 2],
    [1, 3, 4, 1, 1, 1],
    [1, 1, 1, 2, 4, 2],
    [1, 2, 1, 1, 4, 2],
    [1, 2, 1, 2, 4, 1],
    [1, 1, 4, 2, 1, 2],
    [1, 2, 4, 1, 1, 2],
    [1, 2, 4, 2, 1, 1],
    [4, 1, 1, 2, 1, 2],
    [4, 2, 1, 1, 1, 2],
    [4, 2, 1, 2, 1, 1],
    [2, 1, 2, 1, 4, 1],
    [2, 1, 4, 1, 2, 1],
    [4, 1, 2, 1, 2, 1],
    [1, 1, 1, 1, 4, 3],
    [1, 1, 1, 3, 4, 1],
    [1, 3, 1, 1, 4, 1],
    [1, 1, 4, 1, 1, 3],
    [1, 1, 4, 3, 1, 1],
    [4, 1, 1, 1, 1, 3],
    [4, 1, 1, 3, 1, 1],
    [1, 1, 3, 1, 4, 1],
    [1, 1, 4, 1, 3, 1],
    [3, 1, 1, 1, 4, 1],
    [4, 1, 1, 1, 3, 1],
    [2, 1, 1, 4, 1, 2],
    [2, 1, 1, 2, 1, 4],
    [2, 1, 1, 2, 3, 2],
    [2, 3, 3, 1, 1, 1],
];

const MODULES_PER_SYMBOL: u32 = 11;

const FNC_3: u8 = 96;
const FNC_2: u8 = 97;
const SHIFT: u8 = 98;
const CODE_C: u8 = 99;
const CODE_B: u8 = 100;
const CODE_A: u8 = 101;
const FNC_1: u8 = 102;
const START_A: u8 = 103;
const START_B: u8 = 104;
const START_C: u8 = 105;
const STOP: u8 = 106;

const MAX_AVG_VARIANCE: f32 = 0.25;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

/// ASCII group separator, emitted for FNC1 in data positions
const GROUP_SEPARATOR: char = '\u{1d}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
    C,
}

/// Stateful Code 128 row reader.
///
/// Holds scratch buffers between attempts; call [`LinearReader::reset`]
/// after a failed attempt before reusing it.
#[derive(Debug)]
pub struct Code128Reader {
    hints: ReaderHints,
    source_tag: String,
    row: Vec<bool>,
    runs: Vec<u32>,
    rows_scanned: usize,
}

impl Code128Reader {
    /// Reader with `{ target: Code128, try_harder: true }`
    pub fn new() -> Self {
        Self::with_hints(ReaderHints {
            target: Symbology::Code128,
            try_harder: true,
        })
    }

    /// Reader with explicit hints
    pub fn with_hints(hints: ReaderHints) -> Self {
        Self {
            hints,
            source_tag: SOURCE_TAG.to_string(),
            row: Vec::new(),
            runs: Vec::new(),
            rows_scanned: 0,
        }
    }

    /// Replace the source tag attached to results
    pub fn with_source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = tag.into();
        self
    }

    /// Hints this reader was built with
    pub fn hints(&self) -> ReaderHints {
        self.hints
    }

    /// Rows examined since the last reset
    pub fn rows_scanned(&self) -> usize {
        self.rows_scanned
    }

    /// Row order: middle first, then alternating below/above
    fn row_order(&self, height: usize) -> Vec<usize> {
        if height == 0 {
            return Vec::new();
        }
        let middle = height / 2;
        let (shift, max_lines) = if self.hints.try_harder {
            (8, height)
        } else {
            (5, 15)
        };
        let step = (height >> shift).max(1);
        let mut rows = Vec::new();
        for x in 0..max_lines {
            let offset = step * x.div_ceil(2);
            let row = if x % 2 == 0 {
                middle.checked_add(offset)
            } else {
                middle.checked_sub(offset)
            };
            match row {
                Some(row) if row < height => rows.push(row),
                _ => break,
            }
        }
        rows
    }
}

impl Default for Code128Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearReader for Code128Reader {
    fn symbology(&self) -> Symbology {
        Symbology::Code128
    }

    fn decode(&mut self, image: &BitMatrix) -> DecodeOutcome {
        for y in self.row_order(image.height()) {
            self.rows_scanned += 1;
            image.row_into(y, &mut self.row);
            let first_black = collect_runs(&self.row, &mut self.runs);
            if let Some(text) = decode_runs(&self.runs, first_black) {
                trace!(row = y, "code 128 row decoded");
                return DecodeOutcome::Detected(
                    Detection::new(Symbology::Code128, text).with_source(self.source_tag.clone()),
                );
            }
            // Upside-down symbol: same runs read right to left
            self.runs.reverse();
            let last_black = first_black == (self.runs.len() % 2 == 1);
            if let Some(text) = decode_runs(&self.runs, last_black) {
                trace!(row = y, "code 128 row decoded reversed");
                return DecodeOutcome::Detected(
                    Detection::new(Symbology::Code128, text).with_source(self.source_tag.clone()),
                );
            }
        }
        DecodeOutcome::NotFound
    }

    fn reset(&mut self) {
        self.row.clear();
        self.runs.clear();
        self.rows_scanned = 0;
    }
}

/// Run-length encode a row; returns whether the first run is black
fn collect_runs(row: &[bool], runs: &mut Vec<u32>) -> bool {
    runs.clear();
    let Some(&first) = row.first() else {
        return false;
    };
    let mut current = first;
    let mut length = 0u32;
    for &pixel in row {
        if pixel == current {
            length += 1;
        } else {
            runs.push(length);
            current = pixel;
            length = 1;
        }
    }
    runs.push(length);
    first
}

fn decode_runs(runs: &[u32], first_black: bool) -> Option<String> {
    let mut i = if first_black { 0 } else { 1 };
    while i + 6 <= runs.len() {
        let window = &runs[i..i + 6];
        if let Some(start) = best_match(window, START_A..=START_C) {
            let width: u32 = window.iter().sum();
            // Quiet zone of half the start width, or white up to the row edge
            let quiet = i <= 1 || runs[i - 1] * 2 >= width;
            if quiet {
                if let Some(text) = decode_symbols(runs, i, start) {
                    return Some(text);
                }
            }
        }
        i += 2;
    }
    None
}

fn decode_symbols(runs: &[u32], start_index: usize, start_code: u8) -> Option<String> {
    let mut codes = vec![start_code];
    let mut j = start_index + 6;
    loop {
        let window = runs.get(j..j + 6)?;
        let code = best_match(window, 0..=STOP)?;
        j += 6;
        if code == STOP {
            let stop_width: u32 = window.iter().sum();
            let module = stop_width as f32 / MODULES_PER_SYMBOL as f32;
            let bar = *runs.get(j)? as f32;
            if bar < module || bar > module * 3.5 {
                return None;
            }
            let trailing_quiet = match runs.get(j + 1) {
                None => true,
                Some(&space) => space * 2 >= stop_width || j + 2 == runs.len(),
            };
            if !trailing_quiet {
                return None;
            }
            break;
        }
        if code >= START_A {
            return None;
        }
        codes.push(code);
    }

    // start, at least one data symbol, checksum
    if codes.len() < 3 {
        return None;
    }
    let checksum = codes.pop()?;
    let weighted: u32 = codes
        .iter()
        .enumerate()
        .map(|(position, &code)| position.max(1) as u32 * u32::from(code))
        .sum();
    if weighted % 103 != u32::from(checksum) {
        return None;
    }
    expand_text(&codes)
}

/// Best-matching symbol value in `codes`, if any is close enough
fn best_match(counters: &[u32], codes: std::ops::RangeInclusive<u8>) -> Option<u8> {
    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_code = None;
    for code in codes {
        let variance = pattern_variance(counters, &CODE_PATTERNS[code as usize]);
        if variance < best_variance {
            best_variance = variance;
            best_code = Some(code);
        }
    }
    best_code
}

fn pattern_variance(counters: &[u32], pattern: &[u8; 6]) -> f32 {
    let total: u32 = counters.iter().sum();
    if total < MODULES_PER_SYMBOL {
        return f32::INFINITY;
    }
    let unit = total as f32 / MODULES_PER_SYMBOL as f32;
    let max_individual = MAX_INDIVIDUAL_VARIANCE * unit;
    let mut variance = 0.0f32;
    for (&counter, &modules) in counters.iter().zip(pattern) {
        let diff = (counter as f32 - f32::from(modules) * unit).abs();
        if diff > max_individual {
            return f32::INFINITY;
        }
        variance += diff;
    }
    variance / total as f32
}

/// Expand symbol values (start code first, checksum removed) into text
fn expand_text(codes: &[u8]) -> Option<String> {
    let mut set = match codes.first()? {
        &START_A => CodeSet::A,
        &START_B => CodeSet::B,
        _ => CodeSet::C,
    };
    let mut shifted = false;
    let mut text = String::new();

    for (position, &code) in codes[1..].iter().enumerate() {
        let active = match (shifted, set) {
            (true, CodeSet::A) => CodeSet::B,
            (true, CodeSet::B) => CodeSet::A,
            (_, current) => current,
        };
        shifted = false;

        match code {
            FNC_1 => {
                if position > 0 {
                    text.push(GROUP_SEPARATOR);
                }
                continue;
            }
            FNC_2 | FNC_3 if active != CodeSet::C => continue,
            _ => {}
        }

        match active {
            CodeSet::A => match code {
                0..=63 => text.push(char::from(b' ' + code)),
                64..=95 => text.push(char::from(code - 64)),
                SHIFT => shifted = true,
                CODE_C => set = CodeSet::C,
                CODE_B => set = CodeSet::B,
                // FNC4 (extended ASCII) is not supported
                CODE_A => {}
                _ => return None,
            },
            CodeSet::B => match code {
                0..=95 => text.push(char::from(b' ' + code)),
                SHIFT => shifted = true,
                CODE_C => set = CodeSet::C,
                CODE_A => set = CodeSet::A,
                CODE_B => {}
                _ => return None,
            },
            CodeSet::C => match code {
                0..=99 => {
                    text.push(char::from(b'0' + code / 10));
                    text.push(char::from(b'0' + code % 10));
                }
                CODE_B => set = CodeSet::B,
                CODE_A => set = CodeSet::A,
                _ => return None,
            },
        }
    }

    Some(text)
}

/// Encode printable ASCII (code set B) as module widths, bars first,
/// including start, checksum and the full 7-element stop symbol.
///
/// Returns `None` for characters outside `' '..='\u{7f}'`.
pub fn encode(text: &str) -> Option<Vec<u8>> {
    let mut codes = vec![START_B];
    for byte in text.bytes() {
        if !(32..=127).contains(&byte) {
            return None;
        }
        codes.push(byte - 32);
    }
    let weighted: u32 = codes
        .iter()
        .enumerate()
        .map(|(position, &code)| position.max(1) as u32 * u32::from(code))
        .sum();
    codes.push((weighted % 103) as u8);
    codes.push(STOP);

    let mut widths: Vec<u8> = codes
        .iter()
        .flat_map(|&code| CODE_PATTERNS[code as usize])
        .collect();
    widths.push(2);
    Some(widths)
}

/// Expand module widths from [`encode`] into per-module dark flags
pub fn widths_to_modules(widths: &[u8]) -> Vec<bool> {
    widths
        .iter()
        .enumerate()
        .flat_map(|(i, &w)| std::iter::repeat_n(i % 2 == 0, w as usize))
        .collect()
}
