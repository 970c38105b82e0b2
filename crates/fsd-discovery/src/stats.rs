//! Discovery statistics with atomic counters.
//!
//! This module provides [`DiscoveryStats`] for tracking refresh activity and
//! [`StatsSnapshot`] for point-in-time views.
//!
//! # Thread Safety
//!
//! All counters use [`AtomicU64`] with [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. Statistics are informational and don't require strict ordering.
//!
//! # Examples
//!
//! ```
//! use fsd_discovery::DiscoveryStats;
//!
//! let stats = DiscoveryStats::new();
//! stats.increment_refreshes();
//! stats.add_files_scanned(3);
//!
//! let snapshot = stats.snapshot();
//! println!("{} refreshes, {} files", snapshot.refreshes, snapshot.files_scanned);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters describing discovery activity.
///
/// Shared between the discovery loop and observers through an
/// [`Arc`](std::sync::Arc); see [`Discovery::stats`](crate::Discovery::stats).
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    /// Completed refresh cycles.
    refreshes: AtomicU64,
    /// Files parsed across all cycles.
    files_scanned: AtomicU64,
    /// Files that could not be read.
    read_failures: AtomicU64,
    /// Files that were read but held no valid group list.
    decode_failures: AtomicU64,
    /// Files whose groups were withdrawn because they stopped matching.
    retractions: AtomicU64,
    /// Snapshots handed to the consumer.
    emissions: AtomicU64,
    /// Cycles skipped because a pattern could not be expanded.
    resolution_failures: AtomicU64,
}

impl DiscoveryStats {
    /// Creates a new [`DiscoveryStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the refresh counter.
    #[inline]
    pub fn increment_refreshes(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `count` to the scanned files counter.
    #[inline]
    pub fn add_files_scanned(&self, count: u64) {
        self.files_scanned.fetch_add(count, Ordering::Relaxed);
    }

    /// Increments the read failure counter.
    #[inline]
    pub fn increment_read_failures(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the decode failure counter.
    #[inline]
    pub fn increment_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `count` to the retraction counter.
    #[inline]
    pub fn add_retractions(&self, count: u64) {
        self.retractions.fetch_add(count, Ordering::Relaxed);
    }

    /// Increments the emission counter.
    #[inline]
    pub fn increment_emissions(&self) {
        self.emissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the resolution failure counter.
    #[inline]
    pub fn increment_resolution_failures(&self) {
        self.resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all counters.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsd_discovery::DiscoveryStats;
    ///
    /// let stats = DiscoveryStats::new();
    /// stats.increment_emissions();
    /// assert_eq!(stats.snapshot().emissions, 1);
    /// ```
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            refreshes: self.refreshes.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            retractions: self.retractions.load(Ordering::Relaxed),
            emissions: self.emissions.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`DiscoveryStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Completed refresh cycles.
    pub refreshes: u64,
    /// Files parsed across all cycles.
    pub files_scanned: u64,
    /// Files that could not be read.
    pub read_failures: u64,
    /// Files that held no valid group list.
    pub decode_failures: u64,
    /// Files whose groups were withdrawn.
    pub retractions: u64,
    /// Snapshots handed to the consumer.
    pub emissions: u64,
    /// Cycles skipped because a pattern could not be expanded.
    pub resolution_failures: u64,
}

impl StatsSnapshot {
    /// Returns the total number of per-file failures.
    #[inline]
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.read_failures + self.decode_failures
    }

    /// Returns the share of parsed files that succeeded, as a percentage.
    ///
    /// Returns 100.0 if nothing was parsed yet.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsd_discovery::StatsSnapshot;
    ///
    /// let snap = StatsSnapshot {
    ///     files_scanned: 20,
    ///     read_failures: 1,
    ///     decode_failures: 1,
    ///     ..Default::default()
    /// };
    /// assert!((snap.success_rate() - 90.0).abs() < 0.1);
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Acceptable for statistics display
    pub fn success_rate(&self) -> f64 {
        if self.files_scanned == 0 {
            return 100.0;
        }

        (self.files_scanned.saturating_sub(self.failures()) as f64 / self.files_scanned as f64)
            * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        assert_eq!(DiscoveryStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_stats_increment() {
        let stats = DiscoveryStats::new();

        stats.increment_refreshes();
        stats.increment_refreshes();
        stats.add_files_scanned(5);
        stats.increment_read_failures();
        stats.increment_decode_failures();
        stats.add_retractions(2);
        stats.increment_emissions();
        stats.increment_resolution_failures();

        let snap = stats.snapshot();
        assert_eq!(snap.refreshes, 2);
        assert_eq!(snap.files_scanned, 5);
        assert_eq!(snap.read_failures, 1);
        assert_eq!(snap.decode_failures, 1);
        assert_eq!(snap.retractions, 2);
        assert_eq!(snap.emissions, 1);
        assert_eq!(snap.resolution_failures, 1);
        assert_eq!(snap.failures(), 2);
    }

    #[test]
    fn test_success_rate() {
        assert!((StatsSnapshot::default().success_rate() - 100.0).abs() < f64::EPSILON);

        let snap = StatsSnapshot {
            files_scanned: 4,
            decode_failures: 1,
            ..Default::default()
        };
        assert!((snap.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snap = StatsSnapshot {
            refreshes: 3,
            files_scanned: 6,
            emissions: 2,
            ..Default::default()
        };
        insta::assert_json_snapshot!(snap, @r#"
        {
          "refreshes": 3,
          "files_scanned": 6,
          "read_failures": 0,
          "decode_failures": 0,
          "retractions": 0,
          "emissions": 2,
          "resolution_failures": 0
        }
        "#);
    }
}
