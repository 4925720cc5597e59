use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::MemoryStats;
use crate::telemetry::MetricsSummary;

/// Opening tag of the analyst's structured output block.
pub const ANALYSIS_OPEN_TAG: &str = "<analyse_financiere>";
/// Closing tag of the analyst's structured output block.
pub const ANALYSIS_CLOSE_TAG: &str = "</analyse_financiere>";
/// Top-level heading the writer's Markdown report starts with.
pub const REPORT_HEADING: &str = "# Analyse Stratégique";

/// How important a trend is, as graded by the analyst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceLevel {
    #[serde(rename = "Critique")]
    Critical,
    #[serde(rename = "Élevée")]
    High,
    #[serde(rename = "Modérée")]
    Moderate,
}

impl ImportanceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ImportanceLevel::Critical => "Critique",
            ImportanceLevel::High => "Élevée",
            ImportanceLevel::Moderate => "Modérée",
        }
    }
}

impl fmt::Display for ImportanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ImportanceLevel {
    type Err = String;

    /// Accepts the French labels (with or without accents) and English names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critique" | "critical" => Ok(ImportanceLevel::Critical),
            "élevée" | "elevee" | "élevé" | "eleve" | "high" => Ok(ImportanceLevel::High),
            "modérée" | "moderee" | "modéré" | "modere" | "moderate" => {
                Ok(ImportanceLevel::Moderate)
            }
            other => Err(format!("unknown importance level: {other}")),
        }
    }
}

/// One numbered trend inside the analyst's block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTrend {
    pub number: u8,
    pub title: String,
    /// `None` when the label was missing or not recognized.
    pub importance: Option<ImportanceLevel>,
    pub impact: String,
}

/// Parsed view of the `<analyse_financiere>` block. Best effort: missing
/// fields are left empty rather than failing the parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    pub executive_summary: String,
    pub trends: Vec<FinancialTrend>,
    /// Set when the analyst reported that data could not be obtained.
    pub data_limitation: Option<String>,
}

impl FinancialAnalysis {
    /// Trends graded critical or high.
    pub fn priority_trends(&self) -> impl Iterator<Item = &FinancialTrend> {
        self.trends.iter().filter(|t| {
            matches!(
                t.importance,
                Some(ImportanceLevel::Critical) | Some(ImportanceLevel::High)
            )
        })
    }
}

/// Which failure path produced an unsuccessful result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input failed the security or ticker check; no agent was called.
    RejectedInput,
    /// The trends tool returned no data; the run continued with an error text.
    ToolFailure,
    /// The delegated pipeline failed, timed out or was cancelled.
    ExecutionFailure,
}

/// Telemetry attached to a successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetrics {
    pub latency_ms: f64,
    pub memory_stats: MemoryStats,
    pub monitoring_summary: MetricsSummary,
}

/// Outcome of one workflow execution. Built fresh per call and handed to the
/// caller by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub request_id: Uuid,
    pub success: bool,
    pub ticker: String,
    /// Raw `<analyse_financiere>` block, when present in the output.
    pub analysis: Option<String>,
    /// Structured view of `analysis`.
    pub structured: Option<FinancialAnalysis>,
    pub report: Option<String>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub metrics: Option<ResultMetrics>,
    /// Number of executions performed to obtain this result.
    pub attempts: u32,
    /// True when the report was synthesized after retries were exhausted.
    pub degraded: bool,
}

impl AnalysisResult {
    /// An empty, unsuccessful result for `ticker`.
    pub fn pending(request_id: Uuid, ticker: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            ticker: ticker.into(),
            analysis: None,
            structured: None,
            report: None,
            error: None,
            failure: None,
            metrics: None,
            attempts: 1,
            degraded: false,
        }
    }

    pub fn rejected(request_id: Uuid, ticker: impl Into<String>, message: &str) -> Self {
        let mut result = Self::pending(request_id, ticker);
        result.error = Some(message.to_string());
        result.failure = Some(FailureKind::RejectedInput);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_parses_french_and_english_labels() {
        assert_eq!(
            "Critique".parse::<ImportanceLevel>().unwrap(),
            ImportanceLevel::Critical
        );
        assert_eq!(
            " élevée ".parse::<ImportanceLevel>().unwrap(),
            ImportanceLevel::High
        );
        assert_eq!(
            "Moderee".parse::<ImportanceLevel>().unwrap(),
            ImportanceLevel::Moderate
        );
        assert_eq!(
            "high".parse::<ImportanceLevel>().unwrap(),
            ImportanceLevel::High
        );
        assert!("urgent".parse::<ImportanceLevel>().is_err());
    }

    #[test]
    fn importance_serializes_as_french_label() {
        let json = serde_json::to_string(&ImportanceLevel::High).unwrap();
        assert_eq!(json, "\"Élevée\"");
    }

    #[test]
    fn priority_trends_skip_moderate_and_unknown() {
        let analysis = FinancialAnalysis {
            executive_summary: "Momentum haussier".to_string(),
            trends: vec![
                FinancialTrend {
                    number: 1,
                    title: "Prix".to_string(),
                    importance: Some(ImportanceLevel::Critical),
                    impact: "fort".to_string(),
                },
                FinancialTrend {
                    number: 2,
                    title: "Volume".to_string(),
                    importance: Some(ImportanceLevel::Moderate),
                    impact: "faible".to_string(),
                },
                FinancialTrend {
                    number: 3,
                    title: "Volatilité".to_string(),
                    importance: None,
                    impact: "?".to_string(),
                },
            ],
            data_limitation: None,
        };
        let numbers: Vec<u8> = analysis.priority_trends().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1]);
    }

    #[test]
    fn rejected_result_carries_message() {
        let result = AnalysisResult::rejected(Uuid::nil(), "AAPL", "nope");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("nope"));
        assert_eq!(result.failure, Some(FailureKind::RejectedInput));
        assert!(result.report.is_none());
        assert_eq!(result.attempts, 1);
    }
}
