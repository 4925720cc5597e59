pub mod claude_cli;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod security;
pub mod tools;
pub mod workflow;

pub mod test_support;

pub use error::{AgentError, ToolError};
pub use pipeline::{AgentPipeline, ClaudePipeline};
pub use security::{SecurityFilter, SecurityVerdict};
pub use tools::{BarsTrendTool, TrendService, TrendTool};
pub use workflow::{AnalysisWorkflow, WorkflowState};
