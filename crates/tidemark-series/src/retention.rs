//! Tidemark Series Retention
//!
//! Discards metrics that have aged past the retention horizon.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::Series;
use chrono::{DateTime, Duration, Utc};

// =============================================================================
// Retention Cleaner
// =============================================================================

/// Drops the oldest metrics of a series once they exceed the retention interval.
#[derive(Debug, Clone, Copy)]
pub struct RetentionCleaner {
    retention: Duration,
}

impl RetentionCleaner {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Check if a metric generated at `timestamp` is past the horizon at `now`.
    pub fn is_expired(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        timestamp < now - self.retention
    }

    /// Remove expired metrics relative to the current time.
    pub fn cleanup<T>(&self, series: &mut Series<T>) -> usize {
        self.cleanup_at(series, Utc::now())
    }

    /// Remove expired metrics relative to `now`, returning how many were dropped.
    ///
    /// Metrics are time ordered, so the scan stops at the first metric inside
    /// the horizon.
    pub fn cleanup_at<T>(&self, series: &mut Series<T>, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut removed = 0;

        while series
            .earliest()
            .is_some_and(|front| front.generated_at() < cutoff)
        {
            series.pop_front();
            removed += 1;
        }

        removed
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metric;

    fn series_at(base: DateTime<Utc>, offsets_ms: &[i64]) -> Series<i64> {
        let mut series = Series::new("test");
        for (i, offset) in offsets_ms.iter().enumerate() {
            series
                .push(Metric::new(base + Duration::milliseconds(*offset), i as i64))
                .expect("push");
        }
        series
    }

    #[test]
    fn test_cleanup_partial() {
        let now = Utc::now();
        let mut series = series_at(now, &[-3, -2, -1, 0]);

        let removed = RetentionCleaner::new(Duration::milliseconds(2)).cleanup_at(&mut series, now);

        assert_eq!(removed, 1);
        assert_eq!(series.len(), 3);
        assert_eq!(*series.earliest().expect("front").value(), 1);
    }

    #[test]
    fn test_cleanup_complete() {
        let now = Utc::now();
        let mut series = series_at(now, &[-5, -4]);

        let removed = RetentionCleaner::new(Duration::milliseconds(1)).cleanup_at(&mut series, now);

        assert_eq!(removed, 2);
        assert!(series.is_empty());
    }

    #[test]
    fn test_cleanup_keeps_cutoff_boundary() {
        let now = Utc::now();
        let mut series = series_at(now, &[-10, -9]);

        RetentionCleaner::new(Duration::milliseconds(10)).cleanup_at(&mut series, now);

        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_cleanup_empty_and_idempotent() {
        let now = Utc::now();
        let cleaner = RetentionCleaner::new(Duration::seconds(1));

        let mut empty: Series<i64> = Series::new("empty");
        assert_eq!(cleaner.cleanup_at(&mut empty, now), 0);

        let mut series = series_at(now, &[-3000, -2000, -500, 0]);
        assert_eq!(cleaner.cleanup_at(&mut series, now), 2);
        assert_eq!(cleaner.cleanup_at(&mut series, now), 0);

        let cutoff = now - Duration::seconds(1);
        assert!(series.iter().all(|m| m.generated_at() >= cutoff));
    }

    #[test]
    fn test_cleanup_zero_retention() {
        let now = Utc::now();
        let mut series = series_at(now, &[-2, -1, 0]);

        RetentionCleaner::new(Duration::zero()).cleanup_at(&mut series, now);

        assert_eq!(series.len(), 1);
        assert_eq!(series.latest().expect("newest").generated_at(), now);
    }

    #[test]
    fn test_cleanup_ignores_reduced_flag() {
        let now = Utc::now();
        let mut series = Series::new("mixed");
        series
            .push(Metric::reduced(now - Duration::seconds(10), 1))
            .expect("push");
        series.push(Metric::new(now, 2)).expect("push");

        RetentionCleaner::new(Duration::seconds(5)).cleanup_at(&mut series, now);

        assert_eq!(series.len(), 1);
        assert!(!series.earliest().expect("front").is_reduced());
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let cleaner = RetentionCleaner::new(Duration::hours(1));
        assert!(cleaner.is_expired(now - Duration::hours(2), now));
        assert!(!cleaner.is_expired(now - Duration::minutes(30), now));
    }
}
