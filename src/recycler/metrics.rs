//! Recycler metrics for observability
//!
//! Counters describing how a recycler served its callers: how many instances
//! were freshly constructed versus reused, and what happened to them on release.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by every recycler
///
/// # Example
///
/// ```
/// use recycling_logger::recycler::RecyclerMetrics;
///
/// let metrics = RecyclerMetrics::new();
/// metrics.record_created();
/// metrics.record_reused();
/// metrics.record_discarded();
///
/// assert_eq!(metrics.acquired(), 2);
/// assert_eq!(metrics.released(), 1);
/// ```
#[derive(Debug)]
pub struct RecyclerMetrics {
    /// Instances built by the constructor on acquire
    created: AtomicU64,

    /// Acquires served from pooled or thread-owned storage
    reused: AtomicU64,

    /// Releases that kept the instance for later reuse
    retained: AtomicU64,

    /// Releases that dropped the instance
    discarded: AtomicU64,

    /// Nested acquires on a thread whose instance was already on loan
    reentrant: AtomicU64,
}

impl RecyclerMetrics {
    pub const fn new() -> Self {
        Self {
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            retained: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            reentrant: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn retained(&self) -> u64 {
        self.retained.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reentrant(&self) -> u64 {
        self.reentrant.load(Ordering::Relaxed)
    }

    /// Total acquires served
    #[inline]
    pub fn acquired(&self) -> u64 {
        self.created() + self.reused()
    }

    /// Total releases handled
    #[inline]
    pub fn released(&self) -> u64 {
        self.retained() + self.discarded()
    }

    #[inline]
    pub fn record_created(&self) -> u64 {
        self.created.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reused(&self) -> u64 {
        self.reused.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_retained(&self) -> u64 {
        self.retained.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_discarded(&self) -> u64 {
        self.discarded.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reentrant(&self) -> u64 {
        self.reentrant.fetch_add(1, Ordering::Relaxed)
    }

    /// Reuse ratio as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been acquired yet.
    pub fn reuse_rate(&self) -> f64 {
        let acquired = self.acquired() as f64;
        if acquired == 0.0 {
            0.0
        } else {
            (self.reused() as f64 / acquired) * 100.0
        }
    }

    /// Plain-value copy of the counters
    pub fn snapshot(&self) -> RecyclerMetricsSnapshot {
        RecyclerMetricsSnapshot {
            created: self.created(),
            reused: self.reused(),
            retained: self.retained(),
            discarded: self.discarded(),
            reentrant: self.reentrant(),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.created.store(0, Ordering::Relaxed);
        self.reused.store(0, Ordering::Relaxed);
        self.retained.store(0, Ordering::Relaxed);
        self.discarded.store(0, Ordering::Relaxed);
        self.reentrant.store(0, Ordering::Relaxed);
    }
}

impl Default for RecyclerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of [`RecyclerMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecyclerMetricsSnapshot {
    pub created: u64,
    pub reused: u64,
    pub retained: u64,
    pub discarded: u64,
    pub reentrant: u64,
}

impl RecyclerMetricsSnapshot {
    pub fn acquired(&self) -> u64 {
        self.created + self.reused
    }

    pub fn released(&self) -> u64 {
        self.retained + self.discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = RecyclerMetrics::new();
        assert_eq!(metrics.acquired(), 0);
        assert_eq!(metrics.released(), 0);
        assert_eq!(metrics.reentrant(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = RecyclerMetrics::new();
        assert_eq!(metrics.record_created(), 0);
        assert_eq!(metrics.record_created(), 1);
        assert_eq!(metrics.created(), 2);
    }

    #[test]
    fn test_reuse_rate() {
        let metrics = RecyclerMetrics::new();
        assert_eq!(metrics.reuse_rate(), 0.0);

        metrics.record_created();
        for _ in 0..3 {
            metrics.record_reused();
        }

        let rate = metrics.reuse_rate();
        assert!((74.9..=75.1).contains(&rate), "Reuse rate was {}", rate);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = RecyclerMetrics::new();
        metrics.record_created();
        metrics.record_retained();
        metrics.record_discarded();

        let snapshot = metrics.snapshot();
        metrics.reset();

        assert_eq!(snapshot.created, 1);
        assert_eq!(snapshot.retained, 1);
        assert_eq!(snapshot.discarded, 1);
        assert_eq!(metrics.snapshot(), RecyclerMetricsSnapshot::default());
    }
}
