use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Text and token count of one CLI call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaudeOutput {
    pub text: String,
    /// Input plus output tokens, when the CLI reported them.
    pub tokens_used: Option<u64>,
}

#[derive(Deserialize)]
struct JsonEnvelope {
    result: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Invoke the `claude` CLI with a system prompt and user prompt.
///
/// The child process is killed if the returned future is dropped, so an
/// outer timeout or cancellation does not leave it running.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<ClaudeOutput, AgentError> {
    debug!(model = %config.model, "Invoking claude CLI");

    let result = tokio::time::timeout(config.timeout, async {
        Command::new("claude")
            .args([
                "-p",
                user_prompt,
                "--system-prompt",
                system_prompt,
                "--model",
                &config.model,
                "--output-format",
                "json",
            ])
            .kill_on_drop(true)
            .output()
            .await
    })
    .await
    .map_err(|_| AgentError::Timeout(config.timeout.as_secs()))?
    .map_err(|e| AgentError::Cli(format!("Failed to spawn claude: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "Claude CLI failed");
        return Err(AgentError::Cli(format!(
            "claude exited {}: {}",
            result.status, stderr
        )));
    }

    let output = parse_cli_output(&String::from_utf8_lossy(&result.stdout));
    if output.text.trim().is_empty() {
        return Err(AgentError::Cli("Claude returned empty response".to_string()));
    }

    Ok(output)
}

/// Unwrap the JSON envelope of `--output-format json`. Anything else is
/// taken as plain text.
pub fn parse_cli_output(stdout: &str) -> ClaudeOutput {
    match serde_json::from_str::<JsonEnvelope>(stdout.trim()) {
        Ok(envelope) => ClaudeOutput {
            text: envelope.result,
            tokens_used: envelope.usage.map(|u| u.input_tokens + u.output_tokens),
        },
        Err(_) => ClaudeOutput {
            text: stdout.to_string(),
            tokens_used: None,
        },
    }
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
