//! Tidemark Series Handle
//!
//! Read-only access to a registered series for embedding code, for example
//! an exporter. Every read takes the series lock, so it never observes a
//! pipeline run half way through.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::sync::Arc;
use tidemark_series::{Metric, Series};
use tokio::sync::Mutex;

// =============================================================================
// Series Handle
// =============================================================================

/// Shared read access to one series.
pub struct SeriesHandle<T> {
    name: String,
    series: Arc<Mutex<Series<T>>>,
}

impl<T> SeriesHandle<T> {
    pub(crate) fn new(name: impl Into<String>, series: Arc<Mutex<Series<T>>>) -> Self {
        Self {
            name: name.into(),
            series,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` against the series while holding its lock.
    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Series<T>) -> R,
    {
        let series = self.series.lock().await;
        f(&series)
    }

    pub async fn len(&self) -> usize {
        self.read(|series| series.len()).await
    }

    pub async fn is_empty(&self) -> bool {
        self.read(|series| series.is_empty()).await
    }
}

impl<T: Clone> SeriesHandle<T> {
    /// Copy the current contents, oldest first.
    pub async fn snapshot(&self) -> Vec<Metric<T>> {
        self.read(|series| series.to_vec()).await
    }

    pub async fn latest(&self) -> Option<Metric<T>> {
        self.read(|series| series.latest().cloned()).await
    }
}

impl<T> Clone for SeriesHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            series: Arc::clone(&self.series),
        }
    }
}

impl<T> std::fmt::Debug for SeriesHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesHandle").field("name", &self.name).finish()
    }
}
