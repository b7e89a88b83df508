//! Tidemark Pipeline - Per-Series Processing
//!
//! One registry entry per series name. An entry owns the collector, the
//! optional reducer, the series behind its lock, the in-flight flag and the
//! statistics for that name, so the pieces can never drift apart.
//!
//! A pipeline run holds the series lock for all four steps: collect, append,
//! retention cleanup, compaction. Readers take the same lock. A tick that
//! finds the previous run for the same name still in flight is skipped.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::collector::Collector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tidemark_series::{CompactionOutcome, Compactor, Reducer, RetentionCleaner, Series};
use tokio::sync::Mutex;

// =============================================================================
// Pipeline Settings
// =============================================================================

/// Agent-wide settings every pipeline run uses.
#[derive(Debug, Clone)]
pub(crate) struct PipelineSettings {
    pub collection_interval: Duration,
    pub retention: RetentionCleaner,
    /// `None` when the agent's intervals do not permit compaction.
    pub compactor: Option<Compactor>,
}

// =============================================================================
// Tick Outcome
// =============================================================================

/// What one pipeline run did for one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The previous run for this series was still in flight.
    Skipped,
    /// The collector had nothing to record.
    NoValue,
    /// The collector failed or produced an out of order sample.
    CollectionFailed,
    /// A sample was appended and maintenance ran.
    Processed {
        expired: usize,
        compaction: Option<CompactionOutcome>,
        reduction_failed: bool,
    },
}

impl TickOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

// =============================================================================
// Pipeline Statistics
// =============================================================================

/// Live counters for one series.
#[derive(Debug, Default)]
pub struct PipelineStats {
    ticks: AtomicU64,
    samples_collected: AtomicU64,
    empty_collections: AtomicU64,
    collection_failures: AtomicU64,
    overlaps_skipped: AtomicU64,
    points_expired: AtomicU64,
    compactions: AtomicU64,
    points_merged: AtomicU64,
    reduction_failures: AtomicU64,
    last_tick: SyncMutex<Option<DateTime<Utc>>>,
}

impl PipelineStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn add(counter: &AtomicU64, amount: usize) {
        counter.fetch_add(amount as u64, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            samples_collected: self.samples_collected.load(Ordering::Relaxed),
            empty_collections: self.empty_collections.load(Ordering::Relaxed),
            collection_failures: self.collection_failures.load(Ordering::Relaxed),
            overlaps_skipped: self.overlaps_skipped.load(Ordering::Relaxed),
            points_expired: self.points_expired.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            points_merged: self.points_merged.load(Ordering::Relaxed),
            reduction_failures: self.reduction_failures.load(Ordering::Relaxed),
            last_tick: *self.last_tick.lock(),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub ticks: u64,
    pub samples_collected: u64,
    pub empty_collections: u64,
    pub collection_failures: u64,
    pub overlaps_skipped: u64,
    pub points_expired: u64,
    pub compactions: u64,
    pub points_merged: u64,
    pub reduction_failures: u64,
    pub last_tick: Option<DateTime<Utc>>,
}

// =============================================================================
// In-Flight Guard
// =============================================================================

/// Clears the in-flight flag when a run finishes, including on panic.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// =============================================================================
// Pipeline Trait
// =============================================================================

/// Type-erased view of a registry entry.
#[async_trait]
pub(crate) trait Pipeline: Send + Sync {
    fn name(&self) -> &str;

    fn stats(&self) -> &PipelineStats;

    fn value_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Run collect, append, cleanup and compaction once.
    async fn process(&self, settings: &PipelineSettings) -> TickOutcome;
}

// =============================================================================
// Series Entry
// =============================================================================

/// Registry entry for a series holding values of type `T`.
pub(crate) struct SeriesEntry<T> {
    name: String,
    collector: Box<dyn Collector<T>>,
    reducer: Option<Arc<dyn Reducer<T>>>,
    series: Arc<Mutex<Series<T>>>,
    in_flight: AtomicBool,
    stats: PipelineStats,
}

impl<T> SeriesEntry<T> {
    pub fn new(
        name: impl Into<String>,
        collector: Box<dyn Collector<T>>,
        reducer: Option<Arc<dyn Reducer<T>>>,
    ) -> Self {
        let name = name.into();
        Self {
            series: Arc::new(Mutex::new(Series::new(name.clone()))),
            name,
            collector,
            reducer,
            in_flight: AtomicBool::new(false),
            stats: PipelineStats::default(),
        }
    }

    pub fn series(&self) -> Arc<Mutex<Series<T>>> {
        Arc::clone(&self.series)
    }

    pub fn has_reducer(&self) -> bool {
        self.reducer.is_some()
    }
}

#[async_trait]
impl<T> Pipeline for SeriesEntry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    fn value_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn process(&self, settings: &PipelineSettings) -> TickOutcome {
        let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight) else {
            PipelineStats::inc(&self.stats.overlaps_skipped);
            tracing::debug!(series = %self.name, "previous run still in flight, skipping tick");
            return TickOutcome::Skipped;
        };

        PipelineStats::inc(&self.stats.ticks);
        *self.stats.last_tick.lock() = Some(Utc::now());

        let mut series = self.series.lock().await;

        let metric = match self.collector.collect().await {
            Ok(Some(metric)) => metric,
            Ok(None) => {
                PipelineStats::inc(&self.stats.empty_collections);
                tracing::debug!(series = %self.name, "collector produced no value");
                return TickOutcome::NoValue;
            }
            Err(e) => {
                PipelineStats::inc(&self.stats.collection_failures);
                tracing::warn!(series = %self.name, error = %e, "collection failed, skipping tick");
                return TickOutcome::CollectionFailed;
            }
        };

        if let Err(e) = series.push(metric) {
            PipelineStats::inc(&self.stats.collection_failures);
            tracing::warn!(series = %self.name, error = %e, "rejected sample, skipping tick");
            return TickOutcome::CollectionFailed;
        }
        PipelineStats::inc(&self.stats.samples_collected);

        let expired = settings.retention.cleanup(&mut *series);
        if expired > 0 {
            PipelineStats::add(&self.stats.points_expired, expired);
            tracing::trace!(series = %self.name, expired, "dropped expired metrics");
        }

        let mut compaction = None;
        let mut reduction_failed = false;
        if let (Some(reducer), Some(compactor)) = (&self.reducer, &settings.compactor) {
            match compactor.reduce(&mut *series, settings.collection_interval, reducer.as_ref()) {
                Ok(outcome) => {
                    if let CompactionOutcome::Compacted { merged } = outcome {
                        PipelineStats::inc(&self.stats.compactions);
                        PipelineStats::add(&self.stats.points_merged, merged);
                    }
                    compaction = Some(outcome);
                }
                Err(e) => {
                    PipelineStats::inc(&self.stats.reduction_failures);
                    reduction_failed = true;
                    tracing::error!(
                        series = %self.name,
                        error = %e,
                        "reduction failed, keeping raw metrics until next tick"
                    );
                }
            }
        }

        TickOutcome::Processed {
            expired,
            compaction,
            reduction_failed,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
