use thiserror::Error;

/// Failures of the financial trends tool. These never abort a run: the
/// workflow turns them into text the analyst can describe.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("No data for {ticker}: {reason}")]
    NoData { ticker: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Agent timed out after {0} seconds")]
    Timeout(u64),

    #[error("Agent pipeline cancelled")]
    Cancelled,
}
