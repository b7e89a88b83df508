//! Tidemark Series Types
//!
//! Core data types for the in-memory metric buffer.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use tidemark_common::{Result, TidemarkError};

// =============================================================================
// Metric
// =============================================================================

/// A single timestamped sample.
///
/// Metrics are immutable once created. `reduced` marks samples produced by a
/// reducer; those are never fed into another reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric<T> {
    generated_at: DateTime<Utc>,
    value: T,
    reduced: bool,
}

impl<T> Metric<T> {
    pub fn new(generated_at: DateTime<Utc>, value: T) -> Self {
        Self {
            generated_at,
            value,
            reduced: false,
        }
    }

    /// Create a raw sample stamped with the current time.
    pub fn now(value: T) -> Self {
        Self::new(Utc::now(), value)
    }

    /// Create a sample that summarises a downsampling bucket.
    pub fn reduced(generated_at: DateTime<Utc>, value: T) -> Self {
        Self {
            generated_at,
            value,
            reduced: true,
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced
    }
}

// =============================================================================
// Series
// =============================================================================

/// Time ordered metrics of one named source, oldest at the front.
#[derive(Debug, Clone, Serialize)]
pub struct Series<T> {
    name: String,
    points: VecDeque<Metric<T>>,
}

impl<T> Series<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a metric at the back.
    ///
    /// Samples older than the current newest metric are rejected so the
    /// series stays sorted.
    pub fn push(&mut self, metric: Metric<T>) -> Result<()> {
        if let Some(newest) = self.points.back() {
            if metric.generated_at < newest.generated_at {
                return Err(TidemarkError::OutOfOrder {
                    name: self.name.clone(),
                    generated_at: metric.generated_at,
                    newest: newest.generated_at,
                });
            }
        }
        self.points.push_back(metric);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Metric<T>> + ExactSizeIterator {
        self.points.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Metric<T>> {
        self.points.get(index)
    }

    pub fn earliest(&self) -> Option<&Metric<T>> {
        self.points.front()
    }

    pub fn latest(&self) -> Option<&Metric<T>> {
        self.points.back()
    }

    /// Get the time range covered by this series.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.points.front()?.generated_at;
        let last = self.points.back()?.generated_at;
        Some((first, last))
    }

    /// Check if metrics are sorted by timestamp.
    pub fn is_sorted(&self) -> bool {
        self.points
            .iter()
            .zip(self.points.iter().skip(1))
            .all(|(a, b)| a.generated_at <= b.generated_at)
    }

    /// Number of metrics produced by a reducer.
    pub fn reduced_count(&self) -> usize {
        self.points.iter().filter(|m| m.reduced).count()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Metric<T>> {
        self.points.pop_front()
    }

    /// Replace a contiguous run with one metric placed where the run started.
    pub(crate) fn replace_run(&mut self, run: RangeInclusive<usize>, metric: Metric<T>) {
        let start = *run.start();
        self.points.drain(run);
        self.points.insert(start, metric);
    }
}

impl<T: Clone> Series<T> {
    /// Copy the current contents, oldest first.
    pub fn to_vec(&self) -> Vec<Metric<T>> {
        self.points.iter().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
