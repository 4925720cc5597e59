use finscribe_models::analysis::{
    FinancialAnalysis, FinancialTrend, ANALYSIS_CLOSE_TAG, ANALYSIS_OPEN_TAG, REPORT_HEADING,
};
use once_cell::sync::Lazy;
use regex::Regex;

static SUMMARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<resume_executif>(.*?)</resume_executif>").unwrap());

static TREND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<tendance\s+numero\s*=\s*"(\d+)"\s*>(.*?)</tendance>"#).unwrap()
});

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<titre>(.*?)</titre>").unwrap());

static IMPORTANCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<importance>(.*?)</importance>").unwrap());

static IMPACT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<impact>(.*?)</impact>").unwrap());

static LIMITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<limitation_donnees>(.*?)</limitation_donnees>").unwrap());

/// Locate the first `<analyse_financiere>...</analyse_financiere>` block,
/// tags included.
pub fn extract_analysis_block(raw: &str) -> Option<&str> {
    let start = raw.find(ANALYSIS_OPEN_TAG)?;
    let close = raw[start..].find(ANALYSIS_CLOSE_TAG)?;
    Some(&raw[start..start + close + ANALYSIS_CLOSE_TAG.len()])
}

/// Extract the writer's Markdown report.
///
/// Everything from the report heading to the end of the output. Without the
/// heading, the last non-empty paragraph.
pub fn extract_report(raw: &str) -> Option<String> {
    if let Some(start) = raw.find(REPORT_HEADING) {
        return Some(raw[start..].trim_end().to_string());
    }

    raw.split("\n\n")
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|p| p.trim())
        .find(|p| !p.is_empty())
        .map(str::to_string)
}

/// Parse the structured view of an analysis block.
///
/// Missing fields are left empty. Returns `None` only when the block has
/// neither a summary nor a single trend.
pub fn parse_financial_analysis(block: &str) -> Option<FinancialAnalysis> {
    let executive_summary = capture(&SUMMARY_RE, block).unwrap_or_default();

    let trends: Vec<FinancialTrend> = TREND_RE
        .captures_iter(block)
        .filter_map(|caps| {
            let number = caps[1].parse().ok()?;
            let body = &caps[2];
            Some(FinancialTrend {
                number,
                title: capture(&TITLE_RE, body).unwrap_or_default(),
                importance: capture(&IMPORTANCE_RE, body).and_then(|s| s.parse().ok()),
                impact: capture(&IMPACT_RE, body).unwrap_or_default(),
            })
        })
        .collect();

    if executive_summary.is_empty() && trends.is_empty() {
        return None;
    }

    Some(FinancialAnalysis {
        executive_summary,
        trends,
        data_limitation: capture(&LIMITATION_RE, block).filter(|s| !s.is_empty()),
    })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
