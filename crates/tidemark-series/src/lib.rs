//! Tidemark Series - Metric Storage Engine
//!
//! In-memory storage for sampled metrics. Keeps recent samples at full
//! resolution, folds aged samples into coarser aggregates, and discards
//! samples past the retention horizon.
//!
//! Key Features:
//! - Typed, time ordered metric series
//! - Retention cleanup with early-exit front scan
//! - Completeness-gated downsampling of one bucket per call
//! - Pluggable reducers, with ready-made numeric and ordering reducers
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod aggregation;
pub mod compactor;
pub mod reducer;
pub mod retention;
pub mod types;

pub use aggregation::AggregateFunction;
pub use compactor::{CompactionOutcome, Compactor};
pub use reducer::{OrdReducer, Reducer};
pub use retention::RetentionCleaner;
pub use types::{Metric, Series};
