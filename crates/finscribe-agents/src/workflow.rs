use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use finscribe_models::agent_message::{PipelineRequest, FINANCIAL_ANALYST, STRATEGIC_WRITER};
use finscribe_models::analysis::{AnalysisResult, FailureKind, ResultMetrics};
use finscribe_models::config::FinscribeConfig;
use finscribe_models::memory::InteractionKind;
use finscribe_models::{InvalidTicker, Ticker};
use finscribe_store::{MetricsStore, TransactionalMemory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::parser::{extract_analysis_block, extract_report, parse_financial_analysis};
use crate::pipeline::AgentPipeline;
use crate::prompts::{analysis_task, report_task};
use crate::security::{SecurityFilter, TICKER_REQUIRED_MESSAGE};
use crate::tools::{tool_error_text, TrendTool};

/// Marker carried by the report synthesized after retries are exhausted.
pub const UNAVAILABLE_MARKER: &str = "Données Indisponibles";

static TICKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{1,5})\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Validating,
    Running,
    ParsingOutput,
    Recording,
    Done,
    Rejected,
    Failed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Validating => "validating",
            WorkflowState::Running => "running",
            WorkflowState::ParsingOutput => "parsing_output",
            WorkflowState::Recording => "recording",
            WorkflowState::Done => "done",
            WorkflowState::Rejected => "rejected",
            WorkflowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn transition(request_id: Uuid, from: WorkflowState, to: WorkflowState) -> WorkflowState {
    debug!(request_id = %request_id, from = %from, to = %to, "Workflow transition");
    to
}

/// Pull the ticker out of free-form input: the first standalone run of one
/// to five letters, otherwise the whole trimmed input.
pub fn extract_ticker(raw_input: &str) -> Result<Ticker, InvalidTicker> {
    let upper = raw_input.to_uppercase();
    match TICKER_RE.captures(&upper).and_then(|c| c.get(1)) {
        Some(m) => Ticker::parse(m.as_str()),
        None => Ticker::parse(&upper),
    }
}

/// Fixed report returned once every attempt has failed.
pub fn unavailable_report(ticker: &str) -> String {
    format!(
        "# Analyse Stratégique - {UNAVAILABLE_MARKER}\n\n\
         La récupération des données pour le ticker {ticker} a échoué après plusieurs tentatives.\n\n\
         ## Limitation des Données\n\
         - Les données de marché ne sont pas disponibles actuellement\n\
         - Veuillez réessayer ultérieurement ou vérifier la validité du ticker\n\n\
         ## Actions Recommandées\n\
         - Vérifier que le ticker est correct et actif\n\
         - S'assurer de la connectivité réseau\n\n\
         ## Support\n\
         - Pour plus d'assistance, veuillez contacter l'équipe support\n"
    )
}

/// Runs one analysis request end to end: security check, trends lookup,
/// delegated pipeline, output parsing and telemetry.
///
/// The stores are shared with the caller, which can inspect them between
/// runs. Only one request per agent should be in flight at a time, since each
/// agent has a single active memory transaction.
pub struct AnalysisWorkflow {
    pipeline: Arc<dyn AgentPipeline>,
    tool: Arc<dyn TrendTool>,
    security: SecurityFilter,
    metrics: Arc<MetricsStore>,
    memory: Arc<TransactionalMemory>,
    pipeline_timeout: Duration,
    retry_delays: Vec<Duration>,
    cancel: CancellationToken,
}

impl AnalysisWorkflow {
    pub fn new(
        pipeline: Arc<dyn AgentPipeline>,
        tool: Arc<dyn TrendTool>,
        security: SecurityFilter,
        metrics: Arc<MetricsStore>,
        memory: Arc<TransactionalMemory>,
    ) -> Self {
        let defaults = FinscribeConfig::default();
        Self {
            pipeline,
            tool,
            security,
            metrics,
            memory,
            pipeline_timeout: Duration::from_secs(defaults.agents.pipeline_timeout_seconds),
            retry_delays: defaults
                .workflow
                .retry_delays_seconds
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout = timeout;
        self
    }

    /// One retry per entry, each preceded by its delay.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Token that aborts the in-flight pipeline call and the fallback waits.
    /// Once cancelled, later runs fail immediately.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn memory(&self) -> &Arc<TransactionalMemory> {
        &self.memory
    }

    /// Run one attempt. Never fails: every error ends up in the result.
    pub async fn execute(&self, raw_input: &str) -> AnalysisResult {
        let request_id = Uuid::new_v4();
        let state = WorkflowState::Validating;

        let verdict = self.security.check(raw_input);
        if !verdict.allowed {
            transition(request_id, state, WorkflowState::Rejected);
            info!(request_id = %request_id, "Input rejected by security filter");
            return AnalysisResult::rejected(request_id, raw_input, &verdict.message);
        }

        let ticker = match extract_ticker(raw_input) {
            Ok(ticker) => ticker,
            Err(e) => {
                transition(request_id, state, WorkflowState::Rejected);
                info!(request_id = %request_id, error = %e, "No usable ticker in input");
                return AnalysisResult::rejected(request_id, raw_input, TICKER_REQUIRED_MESSAGE);
            }
        };

        let request_key = request_id.to_string();
        self.metrics.start_request(FINANCIAL_ANALYST, &request_key);
        self.memory.start_transaction(FINANCIAL_ANALYST);
        self.memory.append(
            FINANCIAL_ANALYST,
            InteractionKind::Input,
            json!({ "ticker": ticker.as_str() }),
        );

        let mut result = AnalysisResult::pending(request_id, ticker.as_str());
        let state = transition(request_id, state, WorkflowState::Running);
        info!(request_id = %request_id, ticker = %ticker, "Starting analysis");

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            outcome = self.tool.fetch(&ticker) => Some(outcome),
        };
        // A cancelled lookup leaves the token set, so the pipeline step below
        // fails with `Cancelled` without being invoked.
        let (tool_output, tool_ok) = match fetched {
            Some(Ok(text)) => (text, true),
            Some(Err(e)) => {
                warn!(ticker = %ticker, error = %e, "Trends tool failed, continuing without data");
                result.failure = Some(FailureKind::ToolFailure);
                (tool_error_text(&ticker, &e), false)
            }
            None => {
                info!(request_id = %request_id, "Trends lookup cancelled");
                (String::new(), false)
            }
        };

        let request = PipelineRequest {
            request_id,
            analysis_task: analysis_task(&ticker, &tool_output),
            report_task: report_task(),
            ticker,
            tool_output,
        };

        match self.run_pipeline(&request).await {
            Ok(raw) => {
                let state = transition(request_id, state, WorkflowState::ParsingOutput);
                if let Some(block) = extract_analysis_block(&raw) {
                    result.analysis = Some(block.to_string());
                    result.structured = parse_financial_analysis(block);
                    self.memory.append(
                        FINANCIAL_ANALYST,
                        InteractionKind::Output,
                        json!({ "analysis": block }),
                    );
                } else {
                    debug!(request_id = %request_id, "No analysis block in pipeline output");
                }
                result.report = extract_report(&raw);

                let state = transition(request_id, state, WorkflowState::Recording);
                self.metrics
                    .record_tool_call(FINANCIAL_ANALYST, self.tool.name(), tool_ok);
                self.complete_transactions();
                let latency_ms = self.metrics.end_request(FINANCIAL_ANALYST, &request_key, true);

                result.success = true;
                result.metrics = Some(ResultMetrics {
                    latency_ms,
                    memory_stats: self.memory.stats(),
                    monitoring_summary: self.metrics.summary(),
                });
                transition(request_id, state, WorkflowState::Done);
                info!(
                    request_id = %request_id,
                    latency_ms,
                    priority_trends = result
                        .structured
                        .as_ref()
                        .map_or(0, |s| s.priority_trends().count()),
                    "Analysis complete"
                );
            }
            Err(e) => {
                transition(request_id, state, WorkflowState::Failed);
                error!(request_id = %request_id, error = %e, "Agent pipeline failed");
                result.error = Some(e.to_string());
                result.failure = Some(FailureKind::ExecutionFailure);

                self.metrics.end_request(FINANCIAL_ANALYST, &request_key, false);
                self.metrics
                    .record_tool_call(FINANCIAL_ANALYST, self.tool.name(), false);
                self.complete_transactions();
            }
        }

        result
    }

    /// Run with retries; after the last failure return a degraded but
    /// successful result carrying the "data unavailable" report.
    pub async fn execute_with_fallback(&self, raw_input: &str) -> AnalysisResult {
        let mut result = self.execute(raw_input).await;
        let mut attempts = 1;

        for delay in &self.retry_delays {
            if result.success {
                break;
            }
            warn!(
                attempt = attempts,
                error = result.error.as_deref().unwrap_or_default(),
                delay_ms = delay.as_millis(),
                "Attempt failed, applying fallback"
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Fallback cancelled");
                    break;
                }
                _ = tokio::time::sleep(*delay) => {}
            }
            result = self.execute(raw_input).await;
            attempts += 1;
        }

        result.attempts = attempts;
        if !result.success {
            warn!(attempts, "All attempts failed, returning unavailable report");
            result.report = Some(unavailable_report(raw_input));
            result.success = true;
            result.degraded = true;
        }
        result
    }

    async fn run_pipeline(&self, request: &PipelineRequest) -> Result<String, AgentError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(self.pipeline_timeout, self.pipeline.run(request)) => {
                outcome.unwrap_or(Err(AgentError::Timeout(self.pipeline_timeout.as_secs())))
            }
        }
    }

    fn complete_transactions(&self) {
        self.memory.complete(FINANCIAL_ANALYST);
        self.memory.complete(STRATEGIC_WRITER);
    }
}
