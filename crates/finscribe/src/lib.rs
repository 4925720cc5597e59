//! finscribe - two-agent financial analysis with retries and telemetry
//!
//! A financial analyst agent turns a ticker's market trends into a structured
//! analysis, and a strategic writer agent turns that into a Markdown report.
//! Both run through the Claude CLI; this crate wires them to the security
//! filter, the metrics store and the transactional memory.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use finscribe::models::FinscribeConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let workflow = finscribe::build_workflow(&FinscribeConfig::default())?;
//! let result = workflow.execute_with_fallback("AAPL").await;
//! println!("{}", result.report.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub use finscribe_agents as agents;
pub use finscribe_models as models;
pub use finscribe_store as store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use finscribe_agents::{
    AnalysisWorkflow, BarsTrendTool, ClaudePipeline, SecurityFilter, TrendService,
};
use finscribe_models::config::{FinscribeConfig, LoggingConfig};
use finscribe_store::{MetricsStore, TransactionalMemory};
use tracing_subscriber::EnvFilter;

/// Read and validate a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<FinscribeConfig, anyhow::Error> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: FinscribeConfig =
        toml::from_str(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Build a workflow backed by the Claude CLI and the bar files of
/// `config.tool.data_directory`.
pub fn build_workflow(config: &FinscribeConfig) -> Result<AnalysisWorkflow, anyhow::Error> {
    config.validate().context("Invalid configuration")?;

    let metrics = Arc::new(MetricsStore::new(config.monitoring.clone()));
    let memory = Arc::new(TransactionalMemory::from_config(&config.memory));
    let security = SecurityFilter::new(&config.security, Arc::clone(&metrics))
        .context("Invalid security pattern")?;

    let bars = Arc::new(BarsTrendTool::new(&config.tool.data_directory));
    let tool = Arc::new(TrendService::new(bars, &config.tool));
    let pipeline = Arc::new(ClaudePipeline::new(&config.agents).with_metrics(Arc::clone(&metrics)));

    Ok(AnalysisWorkflow::new(pipeline, tool, security, metrics, memory)
        .with_pipeline_timeout(Duration::from_secs(config.agents.pipeline_timeout_seconds))
        .with_retry_delays(
            config
                .workflow
                .retry_delays_seconds
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        ))
}

/// Install the global subscriber, writing to stderr. `RUST_LOG` overrides
/// the configured level. Does nothing if a subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
