use std::sync::Arc;

use finscribe_models::agent_message::FINANCIAL_ANALYST;
use finscribe_models::config::SecurityConfig;
use finscribe_models::ticker::is_ticker_token;
use finscribe_store::MetricsStore;
use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Returned for every prompt-extraction attempt, whichever pattern matched.
pub const DENIAL_MESSAGE: &str =
    "Ma fonction est d'analyser les données financières. Veuillez fournir un ticker.";

/// Returned when the input carries neither a ticker nor an analysis keyword.
pub const TICKER_REQUIRED_MESSAGE: &str =
    "Veuillez fournir un symbole boursier (ticker) valide pour l'analyse.";

/// Built-in prompt-extraction phrasings, matched case-insensitively.
pub const FORBIDDEN_PATTERNS: &[&str] = &[
    r"(montre|affiche|donne|show|display|give).*prompt",
    r"(system|système).*prompt",
    r"instructions?\s+internes?",
    r"internal\s+instructions?",
    r"configuration\s+interne",
    r"internal\s+configuration",
];

const ANALYSIS_KEYWORDS: &[&str] = &["analyse", "ticker", "action"];

/// Characters of the offending input kept in the breach record.
const BREACH_EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityVerdict {
    pub allowed: bool,
    /// Empty when allowed.
    pub message: String,
}

impl SecurityVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            message: String::new(),
        }
    }

    fn deny(message: &str) -> Self {
        Self {
            allowed: false,
            message: message.to_string(),
        }
    }
}

/// Pattern-based gate in front of the agent pipeline.
///
/// This only catches literal phrasings. A paraphrased extraction attempt goes
/// through; the agents' own system prompts are the second line.
pub struct SecurityFilter {
    patterns: Vec<Regex>,
    enabled: bool,
    metrics: Arc<MetricsStore>,
}

impl SecurityFilter {
    pub fn new(config: &SecurityConfig, metrics: Arc<MetricsStore>) -> Result<Self, regex::Error> {
        let patterns = FORBIDDEN_PATTERNS
            .iter()
            .copied()
            .chain(config.extra_patterns.iter().map(String::as_str))
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            enabled: config.enabled,
            metrics,
        })
    }

    pub fn check(&self, input: &str) -> SecurityVerdict {
        if self.enabled && self.patterns.iter().any(|p| p.is_match(input)) {
            let excerpt: String = input.chars().take(BREACH_EXCERPT_CHARS).collect();
            warn!(excerpt = %excerpt, "Prompt extraction attempt blocked");
            self.metrics.record_security_breach(
                FINANCIAL_ANALYST,
                &format!("Tentative d'accès au prompt: {excerpt}..."),
            );
            return SecurityVerdict::deny(DENIAL_MESSAGE);
        }

        let has_ticker = input
            .split_whitespace()
            .any(|word| is_ticker_token(&word.to_uppercase()));
        let lowered = input.to_lowercase();
        let has_keyword = ANALYSIS_KEYWORDS.iter().any(|k| lowered.contains(k));

        if has_ticker || has_keyword {
            SecurityVerdict::allow()
        } else {
            SecurityVerdict::deny(TICKER_REQUIRED_MESSAGE)
        }
    }
}
