//! Tidemark Series Aggregation
//!
//! Ready-made numeric reducers for floating point series.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::reducer::{empty_input, Reducer};
use serde::{Deserialize, Serialize};
use tidemark_common::{Result, TidemarkError};

// =============================================================================
// Aggregate Function
// =============================================================================

/// Aggregation function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunction {
    Sum,
    Count,
    Min,
    Max,
    Avg,
    First,
    Last,
    Median,
}

impl AggregateFunction {
    /// Apply the aggregation to a set of values.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        Some(match self {
            Self::Sum => values.iter().sum(),
            Self::Count => values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::First => *values.first()?,
            Self::Last => *values.last()?,
            Self::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        })
    }
}

impl Reducer<f64> for AggregateFunction {
    fn reduce(&self, values: &[f64]) -> Result<f64> {
        let value = self.apply(values).ok_or_else(empty_input)?;
        if value.is_nan() {
            return Err(TidemarkError::Reduction(format!("{:?} produced NaN", self)));
        }
        Ok(value)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_functions() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        assert_eq!(AggregateFunction::Sum.apply(&values), Some(15.0));
        assert_eq!(AggregateFunction::Count.apply(&values), Some(5.0));
        assert_eq!(AggregateFunction::Min.apply(&values), Some(1.0));
        assert_eq!(AggregateFunction::Max.apply(&values), Some(5.0));
        assert_eq!(AggregateFunction::Avg.apply(&values), Some(3.0));
        assert_eq!(AggregateFunction::First.apply(&values), Some(1.0));
        assert_eq!(AggregateFunction::Last.apply(&values), Some(5.0));
        assert_eq!(AggregateFunction::Median.apply(&values), Some(3.0));
        assert_eq!(AggregateFunction::Median.apply(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_reducer_contract() {
        assert_eq!(AggregateFunction::Avg.reduce(&[10.0, 20.0, 30.0]).expect("avg"), 20.0);

        let err = AggregateFunction::Max.reduce(&[]).expect_err("empty input");
        assert!(matches!(err, TidemarkError::Reduction(_)));

        let err = AggregateFunction::Sum
            .reduce(&[1.0, f64::NAN])
            .expect_err("NaN result");
        assert!(matches!(err, TidemarkError::Reduction(_)));
    }
}
