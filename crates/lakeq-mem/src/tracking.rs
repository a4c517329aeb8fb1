//! Lightweight peak tracking.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct PeakTracker {
    peak_bytes: AtomicU64,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self {
            peak_bytes: AtomicU64::new(0),
        }
    }

    /// Record a resident-bytes observation; updates peak if higher.
    pub fn record(&self, resident_bytes: u64) {
        let mut cur = self.peak_bytes.load(Ordering::Relaxed);
        while resident_bytes > cur {
            match self.peak_bytes.compare_exchange(
                cur,
                resident_bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
        tracing::trace!(
            resident_bytes,
            peak = self.peak_bytes.load(Ordering::Relaxed),
            "mem usage"
        );
    }

    /// Highest observation so far, or `None` before the first one.
    pub fn peak(&self) -> Option<u64> {
        match self.peak_bytes.load(Ordering::Relaxed) {
            0 => None,
            v => Some(v),
        }
    }

    pub fn reset(&self) {
        self.peak_bytes.store(0, Ordering::Relaxed);
    }
}
