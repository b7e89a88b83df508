//! Tidemark Agent - Periodic Collection
//!
//! Schedules collectors on a fixed interval and maintains one bounded
//! metric series per collector. Each tick appends a fresh sample, drops
//! samples past the retention horizon and downsamples aged samples.
//!
//! Key Features:
//! - One registry entry per series: collector, reducer, series, lock and stats
//! - Independent concurrent pipelines per series with per-series exclusion
//! - Overlapping ticks for a busy series are skipped, never queued
//! - Cancellation via `CancellationToken` with in-flight runs completing
//! - Snapshot-consistent read handles for exporters
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod agent;
pub mod collector;
pub mod handle;
pub mod pipeline;

pub use agent::Agent;
pub use collector::{Collector, FnCollector};
pub use handle::SeriesHandle;
pub use pipeline::{PipelineStats, PipelineStatsSnapshot, TickOutcome};
pub use tokio_util::sync::CancellationToken;
