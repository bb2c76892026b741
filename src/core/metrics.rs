//! Logger metrics for observability
//!
//! One [`LoggerMetrics`] is shared by a logger, its writers and their worker
//! threads, so the counts span every configuration the logger has activated.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of a logger
///
/// # Example
///
/// ```
/// use rust_logger_core::prelude::*;
///
/// let logger = Logger::new(Configuration::new().with_level(LogLevel::Off));
/// logger.info("filtered");
///
/// let snapshot = logger.metrics().snapshot();
/// assert_eq!(snapshot.logged, 0);
/// assert_eq!(snapshot.drop_rate(), 0.0);
/// ```
#[derive(Debug, Default)]
pub struct LoggerMetrics {
    logged: AtomicU64,
    dropped: AtomicU64,
    blocked: AtomicU64,
    rotations: AtomicU64,
}

/// Point-in-time copy of [`LoggerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Records accepted by at least one writer
    pub logged: u64,
    /// Writes that failed; the record is lost for that writer
    pub dropped: u64,
    /// Producers that waited on a full writer queue
    pub blocked: u64,
    /// Completed file rotations
    pub rotations: u64,
}

impl MetricsSnapshot {
    /// Failed writes as a percentage of all write attempts, 0.0 when idle
    pub fn drop_rate(&self) -> f64 {
        let attempts = self.logged + self.dropped;
        if attempts == 0 {
            0.0
        } else {
            self.dropped as f64 * 100.0 / attempts as f64
        }
    }
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            logged: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_logged(&self) {
        self.logged.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_block(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Each counter is read independently; concurrent updates may land between reads
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            logged: self.total_logged(),
            dropped: self.dropped_count(),
            blocked: self.block_events(),
            rotations: self.rotations(),
        }
    }

    /// Zero every counter and return the values they had
    pub fn take(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            logged: self.logged.swap(0, Ordering::Relaxed),
            dropped: self.dropped.swap(0, Ordering::Relaxed),
            blocked: self.blocked.swap(0, Ordering::Relaxed),
            rotations: self.rotations.swap(0, Ordering::Relaxed),
        }
    }
}
