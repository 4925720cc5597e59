use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of event captured in the metric history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ResponseLatency,
    ToolCallSuccess,
    SecurityBreachAttempt,
    TokenUsage,
}

/// One immutable entry of the append-only metric history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: MetricKind,
    pub agent: String,
    pub value: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

impl MetricRecord {
    pub fn new(kind: MetricKind, agent: &str, value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            value,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }
}

/// Running aggregates for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_requests: u64,
    pub successful_completions: u64,
    pub failed_completions: u64,
    pub average_latency_ms: f64,
    /// `None` until the first request completes.
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub tool_calls_total: u64,
    pub tool_calls_successful: u64,
    pub tool_calls_failed: u64,
    pub security_breach_attempts: u64,
    pub total_tokens_used: u64,
}

impl PerformanceMetrics {
    pub fn completed(&self) -> u64 {
        self.successful_completions + self.failed_completions
    }

    /// Record the outcome and latency of one completed request.
    ///
    /// The mean is updated incrementally so the history never has to be replayed.
    pub fn observe_completion(&mut self, latency_ms: f64, success: bool) {
        if success {
            self.successful_completions += 1;
        } else {
            self.failed_completions += 1;
        }

        self.min_latency_ms = Some(self.min_latency_ms.map_or(latency_ms, |m| m.min(latency_ms)));
        self.max_latency_ms = Some(self.max_latency_ms.map_or(latency_ms, |m| m.max(latency_ms)));

        let n = self.completed() as f64;
        self.average_latency_ms += (latency_ms - self.average_latency_ms) / n;
    }

    pub fn observe_tool_call(&mut self, success: bool) {
        self.tool_calls_total += 1;
        if success {
            self.tool_calls_successful += 1;
        } else {
            self.tool_calls_failed += 1;
        }
    }

    /// Successful completions over total requests, in percent.
    pub fn task_completion_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_completions as f64 / self.total_requests as f64 * 100.0
    }

    /// Successful tool calls over total tool calls, in percent.
    pub fn tool_success_rate(&self) -> f64 {
        if self.tool_calls_total == 0 {
            return 0.0;
        }
        self.tool_calls_successful as f64 / self.tool_calls_total as f64 * 100.0
    }
}

/// Per-agent line of [`MetricsSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub total_requests: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub tool_success_rate: f64,
    pub security_breaches: u64,
    pub tokens_used: u64,
}

impl From<&PerformanceMetrics> for AgentSummary {
    fn from(m: &PerformanceMetrics) -> Self {
        Self {
            total_requests: m.total_requests,
            success_rate: m.task_completion_rate(),
            avg_latency_ms: m.average_latency_ms,
            tool_success_rate: m.tool_success_rate(),
            security_breaches: m.security_breach_attempts,
            tokens_used: m.total_tokens_used,
        }
    }
}

/// Aggregate view across agents, keyed by agent identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub agents: BTreeMap<String, AgentSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Latency,
    SuccessRate,
    Security,
}

/// Advisory alert raised when a threshold is crossed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub kind: AlertKind,
    pub message: String,
}

/// Content of a periodic metrics snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: f64,
    pub agent_metrics: BTreeMap<String, PerformanceMetrics>,
    pub history: Vec<MetricRecord>,
}

/// Format an uptime as `"{h}h {m}m {s}s"`.
pub fn format_uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
}
