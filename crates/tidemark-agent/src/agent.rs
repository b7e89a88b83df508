//! Tidemark Agent - Collection Scheduler
//!
//! Owns the registry of named pipelines and drives them on a fixed tick.
//! Every tick fans out into one task per registered series; series never
//! wait on each other, and each series processes at most one tick at a time.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::collector::Collector;
use crate::handle::SeriesHandle;
use crate::pipeline::{Pipeline, PipelineSettings, PipelineStatsSnapshot, SeriesEntry, TickOutcome};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tidemark_common::{AgentConfig, Result, TidemarkError};
use tidemark_series::{Compactor, Reducer, RetentionCleaner};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Agent
// =============================================================================

/// Periodically collects, prunes and compacts every registered series.
pub struct Agent {
    config: AgentConfig,
    settings: Arc<PipelineSettings>,
    registry: RwLock<HashMap<String, Arc<dyn Pipeline>>>,
}

impl Agent {
    /// Create an agent after validating its intervals.
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;

        if config.collection_interval > config.retention_interval {
            tracing::warn!(
                collection_interval = ?config.collection_interval,
                retention_interval = ?config.retention_interval,
                "retention is shorter than the collection interval, series will hold at most one sample"
            );
        }

        let compactor = match config.validate_compaction() {
            Ok(()) => Some(Compactor::from_config(&config)?),
            Err(e) => {
                tracing::debug!(error = %e, "compaction unavailable for this agent");
                None
            }
        };

        let settings = PipelineSettings {
            collection_interval: config.collection_interval,
            retention: RetentionCleaner::new(config.retention()?),
            compactor,
        };

        Ok(Self {
            config,
            settings: Arc::new(settings),
            registry: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a series. Re-using a name replaces the old series and its history.
    ///
    /// A reducer enables compaction for the series and requires the agent's
    /// downsampling settings to be valid.
    pub fn add<T, C>(
        &self,
        name: impl Into<String>,
        collector: C,
        reducer: Option<Box<dyn Reducer<T>>>,
    ) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
        C: Collector<T> + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(TidemarkError::Configuration("series name must not be empty".to_string()));
        }
        if reducer.is_some() {
            self.config.validate_compaction()?;
        }

        let entry = SeriesEntry::new(
            name.clone(),
            Box::new(collector),
            reducer.map(Arc::<dyn Reducer<T>>::from),
        );
        let compacted = entry.has_reducer();

        let previous = self.registry.write().insert(name.clone(), Arc::new(entry));
        if previous.is_some() {
            tracing::warn!(series = %name, "replaced existing series, previous history discarded");
        } else {
            tracing::info!(series = %name, compacted, "registered series");
        }

        Ok(())
    }

    /// Unregister a series. Returns false if the name was unknown.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.registry.write().remove(name).is_some();
        if removed {
            tracing::info!(series = %name, "removed series");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.read().contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    // -------------------------------------------------------------------------
    // Read Access
    // -------------------------------------------------------------------------

    /// Get read access to a series holding values of type `T`.
    pub fn series<T: 'static>(&self, name: &str) -> Result<SeriesHandle<T>> {
        let registry = self.registry.read();
        let entry = registry
            .get(name)
            .ok_or_else(|| TidemarkError::SeriesNotFound(name.to_string()))?;

        let typed = entry
            .as_any()
            .downcast_ref::<SeriesEntry<T>>()
            .ok_or_else(|| {
                tracing::debug!(
                    series = %name,
                    registered = entry.value_type(),
                    "series requested with the wrong value type"
                );
                TidemarkError::TypeMismatch {
                    name: name.to_string(),
                    expected: std::any::type_name::<T>(),
                }
            })?;

        Ok(SeriesHandle::new(name, typed.series()))
    }

    /// Get the statistics of a series.
    pub fn stats(&self, name: &str) -> Option<PipelineStatsSnapshot> {
        self.registry.read().get(name).map(|entry| entry.stats().snapshot())
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    fn entries(&self) -> Vec<Arc<dyn Pipeline>> {
        self.registry.read().values().cloned().collect()
    }

    /// Run one round for every registered series and wait for all of them.
    pub async fn tick(&self) -> HashMap<String, TickOutcome> {
        let mut tasks = JoinSet::new();
        for entry in self.entries() {
            let settings = Arc::clone(&self.settings);
            tasks.spawn(async move {
                let outcome = entry.process(&settings).await;
                (entry.name().to_string(), outcome)
            });
        }

        let mut outcomes = HashMap::with_capacity(tasks.len());
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((name, outcome)) => {
                    outcomes.insert(name, outcome);
                }
                Err(e) => Self::log_join_error(e),
            }
        }
        outcomes
    }

    /// Tick every collection interval until `cancel` fires.
    ///
    /// The first round runs one interval after the call. On cancellation no
    /// further rounds start; runs already in flight are awaited.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.collection_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let mut in_flight: JoinSet<TickOutcome> = JoinSet::new();
        tracing::info!(
            series = self.len(),
            interval = ?self.config.collection_interval,
            "agent started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for entry in self.entries() {
                        let settings = Arc::clone(&self.settings);
                        in_flight.spawn(async move { entry.process(&settings).await });
                    }
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = result {
                        Self::log_join_error(e);
                    }
                }
            }
        }

        let pending = in_flight.len();
        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                Self::log_join_error(e);
            }
        }
        tracing::info!(pending, "agent stopped");
    }

    /// Run the agent on the current runtime until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        tokio::spawn(async move { agent.run(cancel).await })
    }

    fn log_join_error(e: JoinError) {
        tracing::error!(error = %e, "pipeline task did not complete");
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("series", &self.names())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
