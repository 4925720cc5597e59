pub mod agent_message;
pub mod analysis;
pub mod config;
pub mod market;
pub mod memory;
pub mod telemetry;
pub mod ticker;

pub use agent_message::{AgentTask, PipelineRequest, FINANCIAL_ANALYST, STRATEGIC_WRITER};
pub use analysis::{
    AnalysisResult, FailureKind, FinancialAnalysis, FinancialTrend, ImportanceLevel,
    ResultMetrics,
};
pub use config::{
    AgentsConfig, AlertThresholds, ConfigError, FinscribeConfig, LoggingConfig, MemoryConfig,
    MonitoringConfig, SecurityConfig, ToolConfig, WorkflowConfig,
};
pub use market::Bar;
pub use memory::{InteractionKind, MemoryEntry, MemoryStats};
pub use telemetry::{
    AgentSummary, Alert, AlertKind, MetricKind, MetricRecord, MetricsSnapshot, MetricsSummary,
    PerformanceMetrics,
};
pub use ticker::{InvalidTicker, Ticker};
