use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use finscribe_models::agent_message::PipelineRequest;
use finscribe_models::config::AgentsConfig;
use finscribe_store::MetricsStore;
use tracing::info;

use crate::claude_cli::{invoke_claude, ClaudeCliConfig, ClaudeOutput};
use crate::error::AgentError;
use crate::prompts::{task_prompt, writer_user_prompt};

/// The delegated agent framework: runs the analysis step, then the report
/// step on the analysis output, and returns everything as one opaque string.
/// Mockable for testing.
#[async_trait]
pub trait AgentPipeline: Send + Sync {
    async fn run(&self, request: &PipelineRequest) -> Result<String, AgentError>;
}

/// Pipeline backed by the Claude CLI, one invocation per step.
pub struct ClaudePipeline {
    pub analyst: ClaudeCliConfig,
    pub writer: ClaudeCliConfig,
    metrics: Option<Arc<MetricsStore>>,
}

impl ClaudePipeline {
    pub fn new(config: &AgentsConfig) -> Self {
        let timeout = Duration::from_secs(config.step_timeout_seconds);
        Self {
            analyst: ClaudeCliConfig {
                model: config.analyst_model.clone(),
                timeout,
            },
            writer: ClaudeCliConfig {
                model: config.writer_model.clone(),
                timeout,
            },
            metrics: None,
        }
    }

    /// Report the token usage of each step to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsStore>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record_tokens(&self, agent: &str, output: &ClaudeOutput) {
        if let (Some(metrics), Some(tokens)) = (&self.metrics, output.tokens_used) {
            metrics.record_token_usage(agent, tokens);
        }
    }
}

#[async_trait]
impl AgentPipeline for ClaudePipeline {
    async fn run(&self, request: &PipelineRequest) -> Result<String, AgentError> {
        let analysis_task = &request.analysis_task;
        let report_task = &request.report_task;

        let start = Instant::now();
        let analysis = invoke_claude(
            &analysis_task.system_prompt,
            &task_prompt(analysis_task),
            &self.analyst,
        )
        .await?;
        self.record_tokens(&analysis_task.agent, &analysis);
        info!(
            request_id = %request.request_id,
            agent = %analysis_task.agent,
            elapsed_ms = start.elapsed().as_millis(),
            "Analysis step complete"
        );

        let start = Instant::now();
        let report = invoke_claude(
            &report_task.system_prompt,
            &writer_user_prompt(report_task, &analysis.text),
            &self.writer,
        )
        .await?;
        self.record_tokens(&report_task.agent, &report);
        info!(
            request_id = %request.request_id,
            agent = %report_task.agent,
            elapsed_ms = start.elapsed().as_millis(),
            "Report step complete"
        );

        Ok(format!("{}\n\n{}", analysis.text.trim(), report.text.trim()))
    }
}
