use serde::{Deserialize, Serialize};

/// Top-level configuration for finscribe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FinscribeConfig {
    pub agents: AgentsConfig,
    pub workflow: WorkflowConfig,
    pub monitoring: MonitoringConfig,
    pub memory: MemoryConfig,
    pub security: SecurityConfig,
    pub tool: ToolConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

impl FinscribeConfig {
    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.analyst_model.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "agents.analyst_model",
            });
        }
        if self.agents.writer_model.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "agents.writer_model",
            });
        }
        if self.agents.step_timeout_seconds == 0 || self.agents.pipeline_timeout_seconds == 0 {
            return Err(ConfigError::OutOfRange {
                field: "agents.*_timeout_seconds",
                reason: "timeouts must be at least one second".to_string(),
            });
        }

        let thresholds = &self.monitoring.alert_thresholds;
        if thresholds.max_latency_ms < 100.0 {
            return Err(ConfigError::OutOfRange {
                field: "monitoring.alert_thresholds.max_latency_ms",
                reason: format!("{} is below 100ms", thresholds.max_latency_ms),
            });
        }
        if !(0.0..=100.0).contains(&thresholds.min_success_rate) {
            return Err(ConfigError::OutOfRange {
                field: "monitoring.alert_thresholds.min_success_rate",
                reason: format!("{} is not a percentage", thresholds.min_success_rate),
            });
        }
        if self.monitoring.snapshot_every == 0 {
            return Err(ConfigError::OutOfRange {
                field: "monitoring.snapshot_every",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tool.max_retries == 0 {
            return Err(ConfigError::OutOfRange {
                field: "tool.max_retries",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.tool.data_directory.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "tool.data_directory",
            });
        }
        Ok(())
    }
}

/// Models and timeouts for the delegated agent pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    pub analyst_model: String,
    pub writer_model: String,
    /// Timeout for each individual LLM step.
    pub step_timeout_seconds: u64,
    /// Timeout for the whole pipeline call, enforced by the workflow.
    pub pipeline_timeout_seconds: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            analyst_model: "claude-3-5-haiku-latest".to_string(),
            writer_model: "claude-3-5-haiku-latest".to_string(),
            step_timeout_seconds: 60,
            pipeline_timeout_seconds: 120,
        }
    }
}

/// Retry policy of `execute_with_fallback`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Wait before each retry. The number of entries is the number of retries.
    pub retry_delays_seconds: Vec<u64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retry_delays_seconds: vec![2, 4],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// Write metric snapshots and alert logs to `log_directory`.
    pub persistence: bool,
    pub log_directory: String,
    /// Write a snapshot every this many metric records.
    pub snapshot_every: usize,
    pub alert_thresholds: AlertThresholds,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persistence: false,
            log_directory: "monitoring_logs".to_string(),
            snapshot_every: 10,
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertThresholds {
    pub max_latency_ms: f64,
    /// Percentage, 0 to 100.
    pub min_success_rate: f64,
    pub max_security_breaches: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_latency_ms: 5000.0,
            min_success_rate: 80.0,
            max_security_breaches: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Snapshot each transaction to `persistence_directory` before clearing it.
    pub persistence: bool,
    pub persistence_directory: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            persistence: false,
            persistence_directory: "memory_store".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    /// Extra case-insensitive patterns checked after the built-in ones.
    pub extra_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_patterns: Vec::new(),
        }
    }
}

/// Settings of the financial trends tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    /// Directory holding one `{TICKER}.json` bar file per symbol.
    pub data_directory: String,
    /// Total attempts per lookup.
    pub max_retries: u32,
    /// Wait before attempt 2, 3, ... Missing entries reuse the last one.
    pub retry_delays_seconds: Vec<u64>,
    pub cache_ttl_seconds: u64,
    pub cache_capacity: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            data_directory: "data/bars".to_string(),
            max_retries: 3,
            retry_delays_seconds: vec![2, 4],
            cache_ttl_seconds: 300,
            cache_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_config() {
        let config = FinscribeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: FinscribeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn default_config_is_valid() {
        let config = FinscribeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workflow.retry_delays_seconds, vec![2, 4]);
        assert_eq!(config.monitoring.snapshot_every, 10);
        assert!(!config.memory.persistence);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[agents]
analyst_model = "claude-sonnet-4-5-20250929"
pipeline_timeout_seconds = 90

[workflow]
retry_delays_seconds = [1, 1, 1]

[monitoring]
persistence = true
log_directory = "/tmp/finscribe-logs"

[monitoring.alert_thresholds]
max_latency_ms = 8000.0

[security]
extra_patterns = ["ignore.*instruction"]

[tool]
data_directory = "/srv/bars"
"#;

        let config: FinscribeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agents.analyst_model, "claude-sonnet-4-5-20250929");
        assert_eq!(config.agents.writer_model, "claude-3-5-haiku-latest");
        assert_eq!(config.agents.pipeline_timeout_seconds, 90);
        assert_eq!(config.workflow.retry_delays_seconds, vec![1, 1, 1]);
        assert!(config.monitoring.persistence);
        assert_eq!(config.monitoring.alert_thresholds.max_latency_ms, 8000.0);
        assert_eq!(config.monitoring.alert_thresholds.min_success_rate, 80.0);
        assert_eq!(config.security.extra_patterns.len(), 1);
        assert_eq!(config.tool.data_directory, "/srv/bars");
        assert_eq!(config.tool.cache_ttl_seconds, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: FinscribeConfig = toml::from_str("").unwrap();
        assert_eq!(config, FinscribeConfig::default());
    }

    #[test]
    fn validate_rejects_low_latency_threshold() {
        let mut config = FinscribeConfig::default();
        config.monitoring.alert_thresholds.max_latency_ms = 50.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_success_rate() {
        let mut config = FinscribeConfig::default();
        config.monitoring.alert_thresholds.min_success_rate = 800.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_model() {
        let mut config = FinscribeConfig::default();
        config.agents.writer_model = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::Empty {
                field: "agents.writer_model"
            })
        );
    }
}
