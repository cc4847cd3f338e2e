//! Duplicate suppression for emitted values

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Default suppression window
pub const DEFAULT_COOLDOWN_MS: u64 = 1200;

/// Millisecond time source
pub trait Clock: Send + Sync {
    /// Current time in milliseconds; only differences are meaningful
    fn now_ms(&self) -> u64;
}

/// Monotonic clock counting from its construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock starting at zero now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Settable clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock reading `start_ms`
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Jump to `ms`
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Last admitted value and when it was admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionRecord {
    /// Admitted text
    pub text: String,
    /// Admission time in clock milliseconds
    pub at_ms: u64,
}

/// Suppresses an identical value seen again within the cooldown window.
///
/// The check and the update happen under one lock, so two concurrent
/// admissions of the same value can never both succeed.
#[derive(Debug)]
pub struct Debouncer {
    cooldown_ms: u64,
    last: Mutex<Option<EmissionRecord>>,
}

impl Debouncer {
    /// Debouncer with a `cooldown_ms` window
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last: Mutex::new(None),
        }
    }

    /// Suppression window in milliseconds
    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    /// `false` iff `text` equals the last admitted text and less than the
    /// cooldown has passed. Suppressed calls leave the record untouched.
    pub fn admit(&self, text: &str, now_ms: u64) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = last.as_ref() {
            if record.text == text && now_ms.saturating_sub(record.at_ms) < self.cooldown_ms {
                return false;
            }
        }
        *last = Some(EmissionRecord {
            text: text.to_owned(),
            at_ms: now_ms,
        });
        true
    }

    /// Snapshot of the last admitted value
    pub fn last(&self) -> Option<EmissionRecord> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the last admitted value
    pub fn clear(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_MS)
    }
}
