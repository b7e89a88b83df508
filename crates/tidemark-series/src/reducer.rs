//! Tidemark Reducer
//!
//! The reduction contract used by compaction. A reducer folds the values of
//! one complete downsampling bucket, given oldest first, into one summary
//! value. Reducers must be deterministic for a given input sequence.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};
use tidemark_common::{Result, TidemarkError};

// =============================================================================
// Reducer Trait
// =============================================================================

/// Reduces an ordered, non-empty sequence of values into one value.
pub trait Reducer<T>: Send + Sync {
    fn reduce(&self, values: &[T]) -> Result<T>;
}

impl<T, F> Reducer<T> for F
where
    F: Fn(&[T]) -> Result<T> + Send + Sync,
{
    fn reduce(&self, values: &[T]) -> Result<T> {
        self(values)
    }
}

pub(crate) fn empty_input() -> TidemarkError {
    TidemarkError::Reduction("reducer received no values".to_string())
}

// =============================================================================
// Ordering Reducer
// =============================================================================

/// Keeps the largest or smallest value of a bucket for any totally ordered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdReducer {
    Max,
    Min,
}

impl<T> Reducer<T> for OrdReducer
where
    T: Ord + Clone + Send + Sync,
{
    fn reduce(&self, values: &[T]) -> Result<T> {
        let picked = match self {
            Self::Max => values.iter().max(),
            Self::Min => values.iter().min(),
        };
        picked.cloned().ok_or_else(empty_input)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ord_reducer() {
        let values = vec![3_i64, 9, -2, 4];
        assert_eq!(OrdReducer::Max.reduce(&values).expect("max"), 9);
        assert_eq!(OrdReducer::Min.reduce(&values).expect("min"), -2);

        let words = vec!["pear".to_string(), "apple".to_string()];
        assert_eq!(OrdReducer::Min.reduce(&words).expect("min"), "apple");
    }

    #[test]
    fn test_ord_reducer_empty() {
        let values: Vec<u32> = Vec::new();
        let err = OrdReducer::Max.reduce(&values).expect_err("empty input");
        assert!(matches!(err, TidemarkError::Reduction(_)));
    }

    #[test]
    fn test_closure_reducer() {
        let sum = |values: &[u64]| -> Result<u64> { Ok(values.iter().sum()) };
        assert_eq!(sum.reduce(&[1, 2, 3]).expect("sum"), 6);

        let shared: std::sync::Arc<dyn Reducer<u64>> = std::sync::Arc::new(sum);
        assert_eq!(shared.reduce(&[4, 5]).expect("sum"), 9);
    }
}
