//! Tidemark Config - Agent Configuration
//!
//! Interval settings for the collection agent. Supports loading from TOML
//! files and programmatic construction, with presets for local development
//! and long-running production agents.
//!
//! All four intervals share one unit system: the expected number of raw
//! samples per downsampling bucket is `downsample_interval /
//! collection_interval`, rounded down.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{Result, TidemarkError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest bucket population that still leaves something to reduce.
pub const MIN_BUCKET_SIZE: usize = 2;

// =============================================================================
// Agent Configuration
// =============================================================================

/// Configuration for a collection agent. Applies to every registered series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Time between two collection ticks.
    #[serde(rename = "collection_interval_ms", with = "duration_ms")]
    pub collection_interval: Duration,
    /// Age after which samples are discarded.
    #[serde(rename = "retention_interval_ms", with = "duration_ms")]
    pub retention_interval: Duration,
    /// Most recent span kept at full resolution.
    #[serde(rename = "high_res_interval_ms", with = "duration_ms")]
    pub high_res_interval: Duration,
    /// Width of one downsampling bucket.
    #[serde(rename = "downsample_interval_ms", with = "duration_ms")]
    pub downsample_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            collection_interval: Duration::from_secs(1),
            retention_interval: Duration::from_secs(60 * 60),
            high_res_interval: Duration::from_secs(5 * 60),
            downsample_interval: Duration::from_secs(60),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TidemarkError::Parse(e.to_string()))
    }

    /// Create configuration with fast development defaults.
    pub fn development() -> Self {
        Self {
            collection_interval: Duration::from_millis(150),
            retention_interval: Duration::from_secs(5),
            high_res_interval: Duration::from_secs(2),
            downsample_interval: Duration::from_millis(500),
        }
    }

    /// Create configuration suited to a long-running agent.
    pub fn production() -> Self {
        Self {
            collection_interval: Duration::from_secs(10),
            retention_interval: Duration::from_secs(24 * 60 * 60),
            high_res_interval: Duration::from_secs(60 * 60),
            downsample_interval: Duration::from_secs(5 * 60),
        }
    }

    pub fn with_collection_interval(mut self, interval: Duration) -> Self {
        self.collection_interval = interval;
        self
    }

    pub fn with_retention_interval(mut self, interval: Duration) -> Self {
        self.retention_interval = interval;
        self
    }

    pub fn with_high_res_interval(mut self, interval: Duration) -> Self {
        self.high_res_interval = interval;
        self
    }

    pub fn with_downsample_interval(mut self, interval: Duration) -> Self {
        self.downsample_interval = interval;
        self
    }

    /// Number of raw samples a complete downsampling bucket holds.
    pub fn expected_bucket_size(&self) -> usize {
        expected_bucket_size(self.collection_interval, self.downsample_interval)
    }

    /// Validate the settings every series depends on.
    pub fn validate(&self) -> Result<()> {
        if self.collection_interval.is_zero() {
            return Err(TidemarkError::Configuration(
                "collection interval must be greater than zero".to_string(),
            ));
        }
        to_chrono(self.retention_interval, "retention interval")?;
        Ok(())
    }

    /// Validate the settings only series with a reducer depend on.
    pub fn validate_compaction(&self) -> Result<()> {
        self.validate()?;

        if self.high_res_interval.is_zero() {
            return Err(TidemarkError::Configuration(
                "high resolution interval must be greater than zero".to_string(),
            ));
        }
        to_chrono(self.high_res_interval, "high resolution interval")?;
        to_chrono(self.downsample_interval, "downsample interval")?;

        let expected = self.expected_bucket_size();
        if expected < MIN_BUCKET_SIZE {
            return Err(TidemarkError::Configuration(format!(
                "downsample interval {:?} holds {} sample(s) at collection interval {:?}, need at least {}",
                self.downsample_interval, expected, self.collection_interval, MIN_BUCKET_SIZE
            )));
        }

        Ok(())
    }

    /// Retention interval as a calendar duration.
    pub fn retention(&self) -> Result<chrono::Duration> {
        to_chrono(self.retention_interval, "retention interval")
    }

    /// High resolution interval as a calendar duration.
    pub fn high_res(&self) -> Result<chrono::Duration> {
        to_chrono(self.high_res_interval, "high resolution interval")
    }

    /// Downsample interval as a calendar duration.
    pub fn downsample(&self) -> Result<chrono::Duration> {
        to_chrono(self.downsample_interval, "downsample interval")
    }
}

/// Number of samples collected every `collection` that fit into `downsample`.
pub fn expected_bucket_size(collection: Duration, downsample: Duration) -> usize {
    if collection.is_zero() {
        return 0;
    }
    (downsample.as_nanos() / collection.as_nanos()) as usize
}

fn to_chrono(duration: Duration, field: &str) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|_| TidemarkError::Configuration(format!("{} {:?} is out of range", field, duration)))
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// =============================================================================
// Tests
// =============================================================================
