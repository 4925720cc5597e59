use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use finscribe_models::agent_message::{FINANCIAL_ANALYST, STRATEGIC_WRITER};
use finscribe_models::config::MonitoringConfig;
use finscribe_models::telemetry::{
    AgentSummary, Alert, AlertKind, MetricKind, MetricRecord, MetricsSnapshot, MetricsSummary,
    PerformanceMetrics,
};
use tracing::{debug, warn};

use crate::snapshot::{file_stamp, SnapshotWriter};

struct MetricsState {
    agents: BTreeMap<String, PerformanceMetrics>,
    history: Vec<MetricRecord>,
    timers: HashMap<String, Instant>,
    alerts: Vec<Alert>,
    started: Instant,
}

impl MetricsState {
    fn new() -> Self {
        let mut agents = BTreeMap::new();
        agents.insert(FINANCIAL_ANALYST.to_string(), PerformanceMetrics::default());
        agents.insert(STRATEGIC_WRITER.to_string(), PerformanceMetrics::default());
        Self {
            agents,
            history: Vec::new(),
            timers: HashMap::new(),
            alerts: Vec::new(),
            started: Instant::now(),
        }
    }

    fn agent(&mut self, agent: &str) -> &mut PerformanceMetrics {
        self.agents.entry(agent.to_string()).or_default()
    }
}

/// Side effects to run once the state lock is released.
#[derive(Default)]
struct Pending {
    snapshot: Option<MetricsSnapshot>,
    alerts: Vec<Alert>,
}

/// Per-agent telemetry: request latency, outcomes, tool calls, security
/// breach attempts and token usage.
///
/// Every method is infallible. Telemetry must never abort the caller, so a
/// missing timer yields zero latency and persistence failures are only logged.
pub struct MetricsStore {
    state: Mutex<MetricsState>,
    config: MonitoringConfig,
    snapshots: Option<SnapshotWriter>,
}

impl MetricsStore {
    pub fn new(config: MonitoringConfig) -> Self {
        let snapshots = config
            .persistence
            .then(|| SnapshotWriter::new(PathBuf::from(&config.log_directory)));
        Self {
            state: Mutex::new(MetricsState::new()),
            config,
            snapshots,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start timing `request_id` and count a request for `agent`.
    pub fn start_request(&self, agent: &str, request_id: &str) {
        if !self.config.enabled {
            return;
        }
        let mut state = self.lock();
        state.timers.insert(request_id.to_string(), Instant::now());
        state.agent(agent).total_requests += 1;
    }

    /// Stop timing `request_id` and fold the outcome into the aggregates.
    /// Returns the latency in milliseconds, or 0 when no timer was started.
    pub fn end_request(&self, agent: &str, request_id: &str, success: bool) -> f64 {
        if !self.config.enabled {
            return 0.0;
        }

        let mut pending = Pending::default();
        let latency_ms = {
            let mut state = self.lock();
            let Some(started) = state.timers.remove(request_id) else {
                debug!(agent, request_id, "end_request without matching start");
                return 0.0;
            };
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            let metrics = state.agent(agent);
            metrics.observe_completion(latency_ms, success);
            let metrics = metrics.clone();

            let record = MetricRecord::new(MetricKind::ResponseLatency, agent, latency_ms)
                .with_tag("request_id", request_id)
                .with_tag("success", success);
            pending.snapshot = self.push_record(&mut state, record);

            let thresholds = &self.config.alert_thresholds;
            if let Some(max) = metrics.max_latency_ms.filter(|m| *m > thresholds.max_latency_ms) {
                pending.alerts.push(raise_alert(
                    &mut state,
                    agent,
                    AlertKind::Latency,
                    format!("Maximum latency exceeded: {max:.2}ms"),
                ));
            }
            let rate = metrics.task_completion_rate();
            if rate < thresholds.min_success_rate {
                pending.alerts.push(raise_alert(
                    &mut state,
                    agent,
                    AlertKind::SuccessRate,
                    format!("Low success rate: {rate:.2}%"),
                ));
            }
            latency_ms
        };

        self.flush(pending);
        latency_ms
    }

    pub fn record_tool_call(&self, agent: &str, tool: &str, success: bool) {
        if !self.config.enabled {
            return;
        }
        let pending = {
            let mut state = self.lock();
            state.agent(agent).observe_tool_call(success);
            let record = MetricRecord::new(
                MetricKind::ToolCallSuccess,
                agent,
                if success { 1.0 } else { 0.0 },
            )
            .with_tag("tool_name", tool);
            Pending {
                snapshot: self.push_record(&mut state, record),
                alerts: Vec::new(),
            }
        };
        self.flush(pending);
    }

    pub fn record_security_breach(&self, agent: &str, details: &str) {
        if !self.config.enabled {
            return;
        }
        let pending = {
            let mut state = self.lock();
            let metrics = state.agent(agent);
            metrics.security_breach_attempts += 1;
            let attempts = metrics.security_breach_attempts;

            let record = MetricRecord::new(MetricKind::SecurityBreachAttempt, agent, 1.0)
                .with_tag("details", details);
            let mut pending = Pending {
                snapshot: self.push_record(&mut state, record),
                alerts: Vec::new(),
            };

            if attempts > self.config.alert_thresholds.max_security_breaches {
                pending.alerts.push(raise_alert(
                    &mut state,
                    agent,
                    AlertKind::Security,
                    format!("Security breach attempts exceeded: {attempts}"),
                ));
            }
            pending
        };
        self.flush(pending);
    }

    pub fn record_token_usage(&self, agent: &str, tokens: u64) {
        if !self.config.enabled {
            return;
        }
        let pending = {
            let mut state = self.lock();
            state.agent(agent).total_tokens_used += tokens;
            let record = MetricRecord::new(MetricKind::TokenUsage, agent, tokens as f64);
            Pending {
                snapshot: self.push_record(&mut state, record),
                alerts: Vec::new(),
            }
        };
        self.flush(pending);
    }

    /// Aggregates per agent. Pure view: two calls without intervening events
    /// return equal values.
    pub fn summary(&self) -> MetricsSummary {
        let state = self.lock();
        MetricsSummary {
            agents: state
                .agents
                .iter()
                .map(|(name, m)| (name.clone(), AgentSummary::from(m)))
                .collect(),
        }
    }

    pub fn metrics(&self, agent: &str) -> Option<PerformanceMetrics> {
        self.lock().agents.get(agent).cloned()
    }

    pub fn history(&self) -> Vec<MetricRecord> {
        self.lock().history.clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().alerts.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.lock().started.elapsed()
    }

    /// Clear aggregates, history, timers and alerts, and restart the uptime clock.
    pub fn reset(&self) {
        *self.lock() = MetricsState::new();
    }

    fn push_record(&self, state: &mut MetricsState, record: MetricRecord) -> Option<MetricsSnapshot> {
        state.history.push(record);
        if self.snapshots.is_none() || state.history.len() % self.config.snapshot_every.max(1) != 0 {
            return None;
        }
        Some(MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_seconds: state.started.elapsed().as_secs_f64(),
            agent_metrics: state.agents.clone(),
            history: state.history.clone(),
        })
    }

    fn flush(&self, pending: Pending) {
        let Some(writer) = &self.snapshots else {
            return;
        };
        if let Some(snapshot) = pending.snapshot {
            match writer.write("metrics", snapshot.timestamp, &snapshot) {
                Ok(path) => debug!(path = %path.display(), "Metrics snapshot written"),
                Err(e) => warn!(error = %e, "Failed to write metrics snapshot"),
            }
        }
        for alert in pending.alerts {
            let day = file_stamp(alert.timestamp);
            let file_name = format!("alerts_{}.json", &day[..8]);
            if let Err(e) = writer.append_to_array(&file_name, alert) {
                warn!(error = %e, "Failed to persist alert");
            }
        }
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(MonitoringConfig::default())
    }
}

fn raise_alert(state: &mut MetricsState, agent: &str, kind: AlertKind, message: String) -> Alert {
    warn!(agent, kind = ?kind, "ALERT: {message}");
    let alert = Alert {
        timestamp: Utc::now(),
        agent: agent.to_string(),
        kind,
        message,
    };
    state.alerts.push(alert.clone());
    alert
}
