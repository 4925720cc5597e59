use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ticker::Ticker;

/// Agent identifier of the financial analyst (first pipeline step).
pub const FINANCIAL_ANALYST: &str = "financial_analyst";
/// Agent identifier of the strategic writer (second pipeline step).
pub const STRATEGIC_WRITER: &str = "strategic_writer";

/// One step handed to the delegated agent framework.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTask {
    /// Agent identifier, e.g. [`FINANCIAL_ANALYST`].
    pub agent: String,
    pub role: String,
    pub goal: String,
    pub system_prompt: String,
    /// Full task instructions, including any embedded data.
    pub description: String,
    pub expected_output: String,
    /// Tool names the agent may use. The analyst's tool output is already
    /// embedded in `description`.
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Sequential two-step plan: the writer consumes the analyst's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRequest {
    pub request_id: Uuid,
    pub ticker: Ticker,
    /// Text returned by the trends tool (or its formatted error).
    pub tool_output: String,
    pub analysis_task: AgentTask,
    pub report_task: AgentTask,
}
