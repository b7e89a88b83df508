//! Tidemark Collector - Sampling Source Abstraction
//!
//! Defines the capability the agent invokes once per tick for every
//! registered series. A collector produces one new metric stamped "now", no
//! value at all, or a source-defined failure. The latter two skip the tick
//! for that series only.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use async_trait::async_trait;
use std::fmt;
use tidemark_common::Result;
use tidemark_series::Metric;

// =============================================================================
// Collector Trait
// =============================================================================

/// Produces one metric per invocation.
#[async_trait]
pub trait Collector<T>: Send + Sync {
    /// Sample the source. `Ok(None)` means there is nothing to record this tick.
    async fn collect(&self) -> Result<Option<Metric<T>>>;
}

// =============================================================================
// Function Collector
// =============================================================================

/// Collector backed by a synchronous sampling function.
///
/// Every sample is stamped with the time the function returned.
pub struct FnCollector<F> {
    sample: F,
}

impl<F> FnCollector<F> {
    pub fn new(sample: F) -> Self {
        Self { sample }
    }
}

impl<F> fmt::Debug for FnCollector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCollector").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, F> Collector<T> for FnCollector<F>
where
    T: Send + 'static,
    F: Fn() -> Result<T> + Send + Sync,
{
    async fn collect(&self) -> Result<Option<Metric<T>>> {
        let value = (self.sample)()?;
        Ok(Some(Metric::now(value)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tidemark_common::TidemarkError;

    #[tokio::test]
    async fn test_fn_collector() {
        let counter = AtomicI64::new(0);
        let collector = FnCollector::new(move || -> Result<i64> {
            Ok(counter.fetch_add(1, Ordering::SeqCst))
        });

        let before = Utc::now();
        let first = collector.collect().await.expect("collect").expect("value");
        let second = collector.collect().await.expect("collect").expect("value");

        assert_eq!(*first.value(), 0);
        assert_eq!(*second.value(), 1);
        assert!(first.generated_at() >= before);
        assert!(second.generated_at() >= first.generated_at());
        assert!(!first.is_reduced());
    }

    #[tokio::test]
    async fn test_fn_collector_error() {
        let collector = FnCollector::new(|| -> Result<u64> {
            Err(TidemarkError::Collection("sensor offline".to_string()))
        });

        let err = collector.collect().await.expect_err("error is propagated");
        assert!(err.is_transient());
    }
}
