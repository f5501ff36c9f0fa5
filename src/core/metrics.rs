//! Dispatch metrics
//!
//! Counters for events written, dropped and delayed by the pipeline. The
//! recyclers keep their own counters in [`crate::recycler::RecyclerMetrics`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// # Example
///
/// ```
/// use recycling_logger::core::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_logged();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.total_logged(), 1);
/// assert_eq!(metrics.drop_rate(), 50.0);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Events dropped on overflow or appender failure
    dropped_count: AtomicU64,

    /// Events every appender accepted
    total_logged: AtomicU64,

    queue_full_events: AtomicU64,

    block_events: AtomicU64,

    /// Error and Fatal events written synchronously because the queue was full
    critical_logs_preserved: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            dropped_count: AtomicU64::new(0),
            total_logged: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            critical_logs_preserved: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.total_logged.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn critical_logs_preserved(&self) -> u64 {
        self.critical_logs_preserved.load(Ordering::Relaxed)
    }

    /// Returns the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_logged(&self) -> u64 {
        self.total_logged.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_critical_preserved(&self) -> u64 {
        self.critical_logs_preserved.fetch_add(1, Ordering::Relaxed)
    }

    /// Percentage of events dropped, 0.0 before anything was processed
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.total_logged() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    pub fn snapshot(&self) -> LoggerMetricsSnapshot {
        LoggerMetricsSnapshot {
            total_logged: self.total_logged(),
            dropped: self.dropped_count(),
            queue_full_events: self.queue_full_events(),
            block_events: self.block_events(),
            critical_logs_preserved: self.critical_logs_preserved(),
        }
    }

    pub fn reset(&self) {
        self.dropped_count.store(0, Ordering::Relaxed);
        self.total_logged.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
        self.critical_logs_preserved.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`LoggerMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoggerMetricsSnapshot {
    pub total_logged: u64,
    pub dropped: u64,
    pub queue_full_events: u64,
    pub block_events: u64,
    pub critical_logs_preserved: u64,
}
