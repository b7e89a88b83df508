//! Tidemark Series Compaction
//!
//! Tiered downsampling of aged metrics. Metrics newer than the high
//! resolution window are kept as collected. Once raw metrics age past the
//! window, the next complete bucket of width `downsample` is folded by the
//! series' reducer into one reduced metric that takes the bucket's place.
//!
//! Timestamps only grow toward the back of a series, so both phases scan
//! backward from the newest metric and stop as soon as the bucket is bounded.
//! Work per call is proportional to the bucket size, and at most one bucket
//! is reduced per call.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::reducer::Reducer;
use crate::types::{Metric, Series};
use chrono::Duration;
use tidemark_common::{expected_bucket_size, AgentConfig, Result, TidemarkError};

// =============================================================================
// Compaction Outcome
// =============================================================================

/// Result of one compaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Nothing has left the high resolution window yet.
    Idle,
    /// The next bucket has not accumulated enough raw metrics.
    Incomplete { collected: usize, expected: usize },
    /// `merged` raw metrics were replaced by one reduced metric.
    Compacted { merged: usize },
}

impl CompactionOutcome {
    pub fn is_compacted(&self) -> bool {
        matches!(self, Self::Compacted { .. })
    }

    /// Number of metrics the series shrank by.
    pub fn removed(&self) -> usize {
        match self {
            Self::Compacted { merged } => merged.saturating_sub(1),
            _ => 0,
        }
    }
}

// =============================================================================
// Compactor
// =============================================================================

/// Replaces aged runs of raw metrics with reduced metrics.
#[derive(Debug, Clone, Copy)]
pub struct Compactor {
    high_res: Duration,
    downsample: Duration,
    downsample_std: std::time::Duration,
}

impl Compactor {
    pub fn new(high_res: std::time::Duration, downsample: std::time::Duration) -> Result<Self> {
        let convert = |d: std::time::Duration| {
            Duration::from_std(d)
                .map_err(|_| TidemarkError::Configuration(format!("interval {:?} is out of range", d)))
        };

        Ok(Self {
            high_res: convert(high_res)?,
            downsample: convert(downsample)?,
            downsample_std: downsample,
        })
    }

    /// Build a compactor from agent settings.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(config.high_res_interval, config.downsample_interval)
    }

    pub fn high_res(&self) -> Duration {
        self.high_res
    }

    pub fn downsample(&self) -> Duration {
        self.downsample
    }

    /// Reduce the next complete bucket behind the high resolution window.
    ///
    /// The series is left untouched unless the bucket holds at least
    /// `downsample / collection_interval` raw metrics and the reducer succeeds.
    pub fn reduce<T, R>(
        &self,
        series: &mut Series<T>,
        collection_interval: std::time::Duration,
        reducer: &R,
    ) -> Result<CompactionOutcome>
    where
        T: Clone,
        R: Reducer<T> + ?Sized,
    {
        let Some(newest) = series.latest() else {
            return Ok(CompactionOutcome::Idle);
        };
        let high_res_end = newest.generated_at() - self.high_res;

        let Some(boundary) = (0..series.len())
            .rev()
            .find(|&i| series.get(i).is_some_and(|m| m.generated_at() <= high_res_end))
        else {
            return Ok(CompactionOutcome::Idle);
        };

        let sample_end = high_res_end - self.downsample;
        let mut start = boundary + 1;
        for i in (0..=boundary).rev() {
            let Some(metric) = series.get(i) else { break };
            if metric.is_reduced() || metric.generated_at() < sample_end {
                break;
            }
            start = i;
        }

        let collected = boundary + 1 - start;
        let expected = expected_bucket_size(collection_interval, self.downsample_std);
        if collected == 0 || collected < expected {
            tracing::trace!(
                series = %series.name(),
                collected,
                expected,
                "downsampling bucket not complete"
            );
            return Ok(CompactionOutcome::Incomplete { collected, expected });
        }

        let values: Vec<T> = (start..=boundary)
            .filter_map(|i| series.get(i).map(|m| m.value().clone()))
            .collect();
        let anchor = match series.get(start) {
            Some(metric) => metric.generated_at(),
            None => return Ok(CompactionOutcome::Idle),
        };

        let value = reducer.reduce(&values)?;
        series.replace_run(start..=boundary, Metric::reduced(anchor, value));

        tracing::debug!(
            series = %series.name(),
            merged = collected,
            anchor = %anchor,
            "compacted downsampling bucket"
        );

        Ok(CompactionOutcome::Compacted { merged: collected })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::OrdReducer;
    use chrono::{DateTime, TimeZone, Utc};

    const COLLECTION: std::time::Duration = std::time::Duration::from_millis(250);

    fn compactor() -> Compactor {
        Compactor::new(
            std::time::Duration::from_millis(500),
            std::time::Duration::from_millis(500),
        )
        .expect("valid intervals")
    }

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 2, 2, h, m, s)
            .single()
            .expect("valid date")
            + Duration::milliseconds(ms as i64)
    }

    fn build(points: &[(DateTime<Utc>, i64, bool)]) -> Series<i64> {
        let mut series = Series::new("test");
        for (ts, value, reduced) in points {
            let metric = if *reduced {
                Metric::reduced(*ts, *value)
            } else {
                Metric::new(*ts, *value)
            };
            series.push(metric).expect("push");
        }
        series
    }

    fn compact(series: &mut Series<i64>) -> usize {
        let before = series.len();
        compactor()
            .reduce(series, COLLECTION, &OrdReducer::Max)
            .expect("reduce should succeed");
        before - series.len()
    }

    fn sample_group() -> Vec<(DateTime<Utc>, i64, bool)> {
        vec![
            (at(11, 59, 59, 250), 1, false),
            (at(11, 59, 59, 500), 2, false),
            (at(11, 59, 59, 750), 3, false),
            (at(12, 0, 0, 0), 4, false),
        ]
    }

    #[test]
    fn test_reduce_empty() {
        let mut series: Series<i64> = Series::new("empty");
        let outcome = compactor()
            .reduce(&mut series, COLLECTION, &OrdReducer::Max)
            .expect("reduce");
        assert_eq!(outcome, CompactionOutcome::Idle);
        assert!(series.is_empty());
    }

    #[test]
    fn test_reduce_all_high_resolution() {
        let mut series = build(&[(at(11, 59, 59, 750), 0, false), (at(12, 0, 0, 0), 0, false)]);
        let outcome = compactor()
            .reduce(&mut series, COLLECTION, &OrdReducer::Max)
            .expect("reduce");
        assert_eq!(outcome, CompactionOutcome::Idle);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_reduce_sampling_group() {
        let mut series = build(&sample_group());

        assert_eq!(compact(&mut series), 1);

        let front = series.earliest().expect("front");
        assert_eq!(*front.value(), 2);
        assert!(front.is_reduced());
        assert_eq!(front.generated_at(), at(11, 59, 59, 250));

        let rest: Vec<i64> = series.iter().skip(1).map(|m| *m.value()).collect();
        assert_eq!(rest, vec![3, 4]);
        assert!(series.is_sorted());
    }

    #[test]
    fn test_reduce_sampling_group_resample() {
        let mut points = sample_group();
        points[0].2 = true;
        let mut series = build(&points);

        let outcome = compactor()
            .reduce(&mut series, COLLECTION, &OrdReducer::Max)
            .expect("reduce");

        assert_eq!(outcome, CompactionOutcome::Incomplete { collected: 1, expected: 2 });
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let mut series = build(&sample_group());
        assert_eq!(compact(&mut series), 1);
        let after_first = series.to_vec();

        let outcome = compactor()
            .reduce(&mut series, COLLECTION, &OrdReducer::Max)
            .expect("reduce");

        assert!(!outcome.is_compacted());
        assert_eq!(series.to_vec(), after_first);
    }

    #[test]
    fn test_reduce_waits_for_complete_bucket() {
        // One aged sample at startup is not a representative bucket.
        let mut series = build(&[
            (at(11, 59, 59, 500), 1, false),
            (at(11, 59, 59, 750), 2, false),
            (at(12, 0, 0, 0), 3, false),
        ]);

        let outcome = compactor()
            .reduce(&mut series, COLLECTION, &OrdReducer::Max)
            .expect("reduce");

        assert_eq!(outcome, CompactionOutcome::Incomplete { collected: 1, expected: 2 });
        assert_eq!(series.reduced_count(), 0);
    }

    #[test]
    fn test_reduce_excludes_metrics_before_bucket() {
        let mut series = build(&[
            (at(11, 59, 58, 0), 9, false),
            (at(11, 59, 59, 0), 5, false),
            (at(11, 59, 59, 250), 1, false),
            (at(11, 59, 59, 500), 2, false),
            (at(11, 59, 59, 750), 3, false),
            (at(12, 0, 0, 0), 4, false),
        ]);

        let outcome = compactor()
            .reduce(&mut series, COLLECTION, &OrdReducer::Max)
            .expect("reduce");
        assert_eq!(outcome, CompactionOutcome::Compacted { merged: 3 });
        assert_eq!(outcome.removed(), 2);

        let values: Vec<(i64, bool)> = series.iter().map(|m| (*m.value(), m.is_reduced())).collect();
        assert_eq!(values, vec![(9, false), (5, true), (3, false), (4, false)]);
        assert_eq!(series.get(1).expect("reduced").generated_at(), at(11, 59, 59, 0));
    }

    #[test]
    fn test_reducer_receives_chronological_values() {
        let mut series = build(&[
            (at(11, 59, 59, 0), 5, false),
            (at(11, 59, 59, 250), 1, false),
            (at(11, 59, 59, 500), 2, false),
            (at(11, 59, 59, 750), 3, false),
            (at(12, 0, 0, 0), 4, false),
        ]);

        let first_last = |values: &[i64]| -> Result<i64> {
            Ok(values[0] * 100 + values[values.len() - 1])
        };
        compactor()
            .reduce(&mut series, COLLECTION, &first_last)
            .expect("reduce");

        assert_eq!(*series.earliest().expect("front").value(), 502);
    }

    #[test]
    fn test_reducer_failure_keeps_raw_data() {
        let mut series = build(&sample_group());
        let before = series.to_vec();

        let failing =
            |_: &[i64]| -> Result<i64> { Err(TidemarkError::Reduction("overflow".to_string())) };
        let err = compactor()
            .reduce(&mut series, COLLECTION, &failing)
            .expect_err("reducer error is returned");

        assert!(matches!(err, TidemarkError::Reduction(_)));
        assert_eq!(series.to_vec(), before);
    }

    #[test]
    fn test_reduce_with_dyn_reducer() {
        let mut series = build(&sample_group());
        let reducer: std::sync::Arc<dyn Reducer<i64>> = std::sync::Arc::new(OrdReducer::Min);

        compactor()
            .reduce(&mut series, COLLECTION, reducer.as_ref())
            .expect("reduce");

        assert_eq!(*series.earliest().expect("front").value(), 1);
    }

    #[test]
    fn test_continuous_collection_keeps_invariants() {
        let compactor = compactor();
        let base = at(12, 0, 0, 0);
        let mut series = Series::new("stream");

        for tick in 0..40_i64 {
            let now = base + Duration::milliseconds(tick * 250);
            series.push(Metric::new(now, tick)).expect("push");
            compactor
                .reduce(&mut series, COLLECTION, &OrdReducer::Max)
                .expect("reduce");

            assert!(series.is_sorted());
            let high_res_end = now - compactor.high_res();
            assert!(series
                .iter()
                .filter(|m| m.generated_at() > high_res_end)
                .all(|m| !m.is_reduced()));
        }

        assert!(series.reduced_count() > 0);
        assert!(series.len() < 40);
    }
}
