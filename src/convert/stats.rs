//! Process-wide usage counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::request::ConversionResult;

/// Immutable snapshot of the usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Total bytes saved across all conversions
    pub byte_count: u64,

    /// Number of successful conversions
    pub image_count: u64,

    /// Cumulative conversion time in milliseconds
    pub time_count: u64,
}

/// Running totals of bytes saved, images converted and time spent.
///
/// Counters only grow, except through [`StatsAggregator::reset`]. Results
/// that grew the file or report a negative time add to the image count but
/// nothing else.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    byte_count: AtomicU64,
    image_count: AtomicU64,
    time_count: AtomicU64,
}

impl StatsAggregator {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one successful conversion.
    pub fn record(&self, result: &ConversionResult) {
        self.image_count.fetch_add(1, Ordering::Relaxed);

        if result.saved_bytes > 0 {
            self.byte_count
                .fetch_add(result.saved_bytes as u64, Ordering::Relaxed);
        }
        if result.time >= 0 {
            self.time_count
                .fetch_add(result.time as u64, Ordering::Relaxed);
        }
    }

    /// Account for every successful result of a batch.
    pub fn record_batch<'a>(&self, results: impl IntoIterator<Item = &'a ConversionResult>) {
        for result in results {
            self.record(result);
        }
    }

    /// Current values of the counters.
    pub fn snapshot(&self) -> UsageStats {
        UsageStats {
            byte_count: self.byte_count.load(Ordering::Relaxed),
            image_count: self.image_count.load(Ordering::Relaxed),
            time_count: self.time_count.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.byte_count.store(0, Ordering::Relaxed);
        self.image_count.store(0, Ordering::Relaxed);
        self.time_count.store(0, Ordering::Relaxed);
    }
}
