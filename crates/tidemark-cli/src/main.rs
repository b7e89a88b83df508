//! Tidemark Demo Binary
//!
//! Samples the resident set size of this process into a Tidemark agent and
//! prints the buffered series once a second until Ctrl-C.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use async_trait::async_trait;
use chrono::SecondsFormat;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tidemark_agent::{Agent, Collector, SeriesHandle};
use tidemark_common::{AgentConfig, Result, TidemarkError};
use tidemark_series::{AggregateFunction, Metric, OrdReducer};
use tokio::signal;
use tokio_util::sync::CancellationToken;

const STATM_PATH: &str = "/proc/self/statm";
const PAGE_SIZE: u64 = 4096;

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Buffer process memory samples in a downsampling time series")]
struct Args {
    /// TOML file with agent intervals (flags below override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Collection interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Retention interval in milliseconds
    #[arg(long)]
    retention_ms: Option<u64>,

    /// High resolution window in milliseconds
    #[arg(long)]
    high_res_ms: Option<u64>,

    /// Downsampling bucket width in milliseconds
    #[arg(long)]
    downsample_ms: Option<u64>,
}

impl Args {
    fn agent_config(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)?,
            None => AgentConfig::development(),
        };

        if let Some(ms) = self.interval_ms {
            config = config.with_collection_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.retention_ms {
            config = config.with_retention_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.high_res_ms {
            config = config.with_high_res_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.downsample_ms {
            config = config.with_downsample_interval(Duration::from_millis(ms));
        }

        Ok(config)
    }
}

// =============================================================================
// Collectors
// =============================================================================

/// Resident set size of the current process in bytes.
struct ResidentMemory;

impl ResidentMemory {
    async fn read_bytes() -> Result<u64> {
        let statm = tokio::fs::read_to_string(STATM_PATH)
            .await
            .map_err(|e| TidemarkError::Collection(format!("cannot read {}: {}", STATM_PATH, e)))?;

        let pages = statm
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| TidemarkError::Collection(format!("{} has no resident field", STATM_PATH)))?
            .parse::<u64>()
            .map_err(|e| TidemarkError::Collection(format!("invalid resident page count: {}", e)))?;

        Ok(pages * PAGE_SIZE)
    }
}

#[async_trait]
impl Collector<u64> for ResidentMemory {
    async fn collect(&self) -> Result<Option<Metric<u64>>> {
        Ok(Some(Metric::now(Self::read_bytes().await?)))
    }
}

/// Same reading in MiB, averaged when downsampled.
struct ResidentMemoryMib;

#[async_trait]
impl Collector<f64> for ResidentMemoryMib {
    async fn collect(&self) -> Result<Option<Metric<f64>>> {
        let bytes = ResidentMemory::read_bytes().await?;
        Ok(Some(Metric::now(bytes as f64 / (1024.0 * 1024.0))))
    }
}

// =============================================================================
// Output
// =============================================================================

async fn print_series<T: Clone + std::fmt::Display>(handle: &SeriesHandle<T>) {
    let snapshot = handle.snapshot().await;
    let reduced = snapshot.iter().filter(|m| m.is_reduced()).count();
    println!("{} ({} points, {} reduced)", handle.name(), snapshot.len(), reduced);
    for metric in &snapshot {
        println!(
            "  {} {}{}",
            metric.generated_at().to_rfc3339_opts(SecondsFormat::Millis, true),
            metric.value(),
            if metric.is_reduced() { " *" } else { "" }
        );
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "tidemark failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.agent_config()?;
    tracing::info!(
        collection_interval = ?config.collection_interval,
        retention_interval = ?config.retention_interval,
        high_res_interval = ?config.high_res_interval,
        downsample_interval = ?config.downsample_interval,
        bucket = config.expected_bucket_size(),
        "starting tidemark"
    );

    let agent = Arc::new(Agent::new(config)?);
    agent.add("rss_bytes", ResidentMemory, Some(Box::new(OrdReducer::Max)))?;
    agent.add("rss_mib", ResidentMemoryMib, Some(Box::new(AggregateFunction::Avg)))?;

    let bytes = agent.series::<u64>("rss_bytes")?;
    let mib = agent.series::<f64>("rss_mib")?;

    let cancel = CancellationToken::new();
    let running = agent.spawn(cancel.clone());

    let mut report = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("shutdown signal received");
                break;
            }
            _ = report.tick() => {
                print_series(&bytes).await;
                print_series(&mib).await;
            }
        }
    }

    cancel.cancel();
    if let Err(e) = running.await {
        tracing::error!(error = %e, "agent task did not shut down cleanly");
    }

    for name in agent.names() {
        if let Some(stats) = agent.stats(&name) {
            tracing::info!(
                series = %name,
                ticks = stats.ticks,
                samples = stats.samples_collected,
                compactions = stats.compactions,
                failures = stats.collection_failures,
                "final statistics"
            );
        }
    }

    Ok(())
}
