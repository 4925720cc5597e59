use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use finscribe_models::analysis::{FinancialTrend, ImportanceLevel};
use finscribe_models::config::ToolConfig;
use finscribe_models::{Bar, Ticker};
use moka::future::Cache;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::prompts::TRENDS_TOOL_NAME;

/// Trading days per year, for annualizing volatility.
const TRADING_DAYS: f64 = 252.0;
/// Bars averaged for the "recent volume" figure.
const RECENT_VOLUME_BARS: usize = 5;
const LOOKBACK_DAYS: i64 = 30;

/// Source of the formatted trends text handed to the analyst.
#[async_trait]
pub trait TrendTool: Send + Sync {
    fn name(&self) -> &str {
        TRENDS_TOOL_NAME
    }

    async fn fetch(&self, ticker: &Ticker) -> Result<String, ToolError>;
}

/// Derives the trends from daily bars stored as `{data_dir}/{TICKER}.json`.
pub struct BarsTrendTool {
    data_dir: PathBuf,
}

impl BarsTrendTool {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    async fn load_bars(&self, ticker: &Ticker) -> Result<Vec<Bar>, ToolError> {
        let path = self.data_dir.join(format!("{ticker}.json"));
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NoData {
                    ticker: ticker.to_string(),
                    reason: format!("no bar file at {}", path.display()),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let mut bars: Vec<Bar> = serde_json::from_str(&json)?;
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

#[async_trait]
impl TrendTool for BarsTrendTool {
    async fn fetch(&self, ticker: &Ticker) -> Result<String, ToolError> {
        let bars = self.load_bars(ticker).await?;
        let trends = derive_trends(ticker, &bars)?;
        Ok(format_trends(&trends))
    }
}

/// Compute the three trends over the last month of bars: price change,
/// recent volume against the average, and annualized volatility.
pub fn derive_trends(ticker: &Ticker, bars: &[Bar]) -> Result<Vec<FinancialTrend>, ToolError> {
    let no_data = |reason: &str| ToolError::NoData {
        ticker: ticker.to_string(),
        reason: reason.to_string(),
    };

    let last_date = bars.last().ok_or_else(|| no_data("empty bar file"))?.date;
    let cutoff = last_date - ChronoDuration::days(LOOKBACK_DAYS);
    let window: Vec<&Bar> = bars.iter().filter(|b| b.date >= cutoff).collect();
    if window.len() < 2 {
        return Err(no_data("fewer than two bars in the last month"));
    }

    let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = window.iter().map(|b| b.volume).collect();

    let start_price = closes[0];
    let end_price = closes[closes.len() - 1];
    if start_price <= 0.0 {
        return Err(no_data("non-positive opening close"));
    }
    let price_change = (end_price - start_price) / start_price * 100.0;

    let avg_volume = mean(&volumes);
    let recent_volume = mean(&volumes[volumes.len().saturating_sub(RECENT_VOLUME_BARS)..]);
    let volume_change = if avg_volume > 0.0 {
        (recent_volume - avg_volume) / avg_volume * 100.0
    } else {
        0.0
    };

    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    let volatility = sample_std(&returns) * TRADING_DAYS.sqrt() * 100.0;

    Ok(vec![
        FinancialTrend {
            number: 1,
            title: format!("Variation du prix sur 30 jours: {price_change:.2}%"),
            importance: Some(grade(price_change.abs(), 10.0, 5.0)),
            impact: format!(
                "Le titre {} {:.2}% sur le dernier mois, indiquant une {}.",
                if price_change > 0.0 { "a gagné" } else { "a perdu" },
                price_change.abs(),
                if price_change > 0.0 {
                    "tendance haussière"
                } else {
                    "pression baissière"
                }
            ),
        },
        FinancialTrend {
            number: 2,
            title: format!("Activité du volume: {volume_change:.1}% vs moyenne"),
            importance: Some(if volume_change.abs() > 50.0 {
                ImportanceLevel::High
            } else {
                ImportanceLevel::Moderate
            }),
            impact: format!(
                "Le volume récent est {} de {:.1}% à la moyenne, suggérant {}.",
                if volume_change > 0.0 { "supérieur" } else { "inférieur" },
                volume_change.abs(),
                if volume_change > 0.0 {
                    "un intérêt accru"
                } else {
                    "un intérêt réduit"
                }
            ),
        },
        FinancialTrend {
            number: 3,
            title: format!("Volatilité annualisée: {volatility:.1}%"),
            importance: Some(grade(volatility, 40.0, 25.0)),
            impact: format!(
                "La volatilité de {volatility:.1}% indique un {} pour les investisseurs.",
                if volatility > 30.0 {
                    "risque élevé"
                } else {
                    "risque modéré"
                }
            ),
        },
    ])
}

fn grade(value: f64, critical_above: f64, high_above: f64) -> ImportanceLevel {
    if value > critical_above {
        ImportanceLevel::Critical
    } else if value > high_above {
        ImportanceLevel::High
    } else {
        ImportanceLevel::Moderate
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

pub fn format_trends(trends: &[FinancialTrend]) -> String {
    let mut out = String::from("Tendances financières identifiées:\n\n");
    for trend in trends {
        let importance = trend.importance.map(ImportanceLevel::label).unwrap_or("Inconnue");
        out.push_str(&format!(
            "Tendance {}:\n  Titre: {}\n  Importance: {}\n  Impact: {}\n\n",
            trend.number, trend.title, importance, trend.impact
        ));
    }
    out
}

/// Text fed to the analyst in place of the trends when the tool failed.
pub fn tool_error_text(ticker: &Ticker, error: &ToolError) -> String {
    format!(
        "ERREUR: La récupération des données pour le ticker {ticker} a échoué après \
         plusieurs tentatives. Détails: {error}"
    )
}

/// Wraps a [`TrendTool`] with retries and a TTL cache keyed by ticker.
///
/// Only successful lookups are cached.
pub struct TrendService {
    tool: Arc<dyn TrendTool>,
    cache: Cache<String, String>,
    max_attempts: u32,
    retry_delays: Vec<Duration>,
}

impl TrendService {
    pub fn new(tool: Arc<dyn TrendTool>, config: &ToolConfig) -> Self {
        Self {
            tool,
            cache: Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
                .build(),
            max_attempts: config.max_retries.max(1),
            retry_delays: config
                .retry_delays_seconds
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }

    /// Wait before `attempt` (2-based). Missing entries reuse the last delay.
    fn delay_before(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(2) as usize;
        self.retry_delays
            .get(idx)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl TrendTool for TrendService {
    fn name(&self) -> &str {
        self.tool.name()
    }

    async fn fetch(&self, ticker: &Ticker) -> Result<String, ToolError> {
        if let Some(hit) = self.cache.get(ticker.as_str()).await {
            debug!(ticker = %ticker, "Trends cache hit");
            return Ok(hit);
        }

        let mut attempt = 1;
        loop {
            match self.tool.fetch(ticker).await {
                Ok(text) => {
                    self.cache.insert(ticker.to_string(), text.clone()).await;
                    return Ok(text);
                }
                Err(e) if attempt < self.max_attempts => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    warn!(
                        ticker = %ticker,
                        error = %e,
                        next_attempt = attempt,
                        delay_ms = delay.as_millis(),
                        "Trends lookup failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubTrendTool;
    use chrono::NaiveDate;

    fn ticker() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    fn bars(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (c, v))| Bar {
                date: start + ChronoDuration::days(i as i64),
                close: *c,
                volume: *v,
            })
            .collect()
    }

    fn write_bars(dir: &std::path::Path, symbol: &str, bars: &[Bar]) {
        std::fs::write(
            dir.join(format!("{symbol}.json")),
            serde_json::to_string(bars).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn strong_rally_is_critical() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let trends = derive_trends(&ticker(), &bars(&closes, &[1_000.0; 20])).unwrap();

        assert_eq!(trends.len(), 3);
        assert_eq!(trends[0].title, "Variation du prix sur 30 jours: 19.00%");
        assert_eq!(trends[0].importance, Some(ImportanceLevel::Critical));
        assert!(trends[0].impact.contains("a gagné 19.00%"));
        assert!(trends[0].impact.contains("tendance haussière"));
    }

    #[test]
    fn flat_volume_and_price_are_moderate() {
        let trends = derive_trends(&ticker(), &bars(&[50.0; 10], &[2_000.0; 10])).unwrap();

        assert_eq!(trends[0].importance, Some(ImportanceLevel::Moderate));
        assert_eq!(trends[1].title, "Activité du volume: 0.0% vs moyenne");
        assert_eq!(trends[1].importance, Some(ImportanceLevel::Moderate));
        assert_eq!(trends[2].title, "Volatilité annualisée: 0.0%");
        assert!(trends[2].impact.contains("risque modéré"));
    }

    #[test]
    fn volume_spike_is_high() {
        let mut volumes = vec![1_000.0; 15];
        volumes.extend([5_000.0; 5]);
        let trends = derive_trends(&ticker(), &bars(&[10.0; 20], &volumes)).unwrap();
        assert_eq!(trends[1].importance, Some(ImportanceLevel::High));
        assert!(trends[1].impact.contains("supérieur"));
    }

    #[test]
    fn choppy_prices_are_volatile() {
        let closes: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 95.0 })
            .collect();
        let trends = derive_trends(&ticker(), &bars(&closes, &[1.0; 20])).unwrap();
        assert_eq!(trends[2].importance, Some(ImportanceLevel::Critical));
        assert!(trends[2].impact.contains("risque élevé"));
    }

    #[test]
    fn only_last_month_is_used() {
        let mut all = bars(&[10.0; 60], &[1.0; 60]);
        all[59].close = 11.0;
        all[0].close = 1.0;
        let trends = derive_trends(&ticker(), &all).unwrap();
        assert_eq!(trends[0].title, "Variation du prix sur 30 jours: 10.00%");
    }

    #[test]
    fn too_few_bars_is_no_data() {
        let err = derive_trends(&ticker(), &bars(&[10.0], &[1.0])).unwrap_err();
        assert!(matches!(err, ToolError::NoData { .. }));
        assert!(derive_trends(&ticker(), &[]).is_err());
    }

    #[test]
    fn format_matches_analyst_input_layout() {
        let trends = derive_trends(&ticker(), &bars(&[10.0, 12.0], &[1.0, 1.0])).unwrap();
        let text = format_trends(&trends);
        assert!(text.starts_with("Tendances financières identifiées:\n\nTendance 1:\n  Titre: "));
        assert!(text.contains("Tendance 3:\n  Titre: Volatilité annualisée"));
        assert!(text.contains("  Importance: Critique\n"));
    }

    #[test]
    fn error_text_has_failure_marker() {
        let err = ToolError::NoData {
            ticker: "ZZZZ".to_string(),
            reason: "no bar file".to_string(),
        };
        let text = tool_error_text(&Ticker::parse("ZZZZ").unwrap(), &err);
        assert!(text.starts_with("ERREUR: La récupération des données pour le ticker ZZZZ"));
        assert!(text.contains("no bar file"));
    }

    #[tokio::test]
    async fn bars_tool_reads_ticker_file() {
        let dir = tempfile::tempdir().unwrap();
        write_bars(dir.path(), "AAPL", &bars(&[100.0, 104.0, 103.0], &[10.0, 12.0, 9.0]));

        let tool = BarsTrendTool::new(dir.path());
        let text = tool.fetch(&ticker()).await.unwrap();
        assert!(text.contains("Variation du prix sur 30 jours: 3.00%"));
        assert_eq!(tool.name(), TRENDS_TOOL_NAME);
    }

    #[tokio::test]
    async fn bars_tool_missing_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = BarsTrendTool::new(dir.path()).fetch(&ticker()).await.unwrap_err();
        assert!(matches!(err, ToolError::NoData { .. }));
    }

    #[tokio::test]
    async fn bars_tool_corrupt_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AAPL.json"), "not json").unwrap();
        let err = BarsTrendTool::new(dir.path()).fetch(&ticker()).await.unwrap_err();
        assert!(matches!(err, ToolError::Json(_)));
    }

    #[tokio::test]
    async fn bars_tool_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("AAPL.json")).unwrap();
        let err = BarsTrendTool::new(dir.path()).fetch(&ticker()).await.unwrap_err();
        assert!(matches!(err, ToolError::Io(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn service_retries_then_caches() {
        let stub = Arc::new(StubTrendTool::flaky(2));
        let service = TrendService::new(stub.clone(), &ToolConfig::default());

        let started = tokio::time::Instant::now();
        let text = service.fetch(&ticker()).await.unwrap();
        assert!(text.starts_with("Tendances financières identifiées"));
        assert_eq!(stub.calls(), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(6) && waited < Duration::from_secs(7));

        service.fetch(&ticker()).await.unwrap();
        assert_eq!(stub.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn service_gives_up_after_max_attempts() {
        let stub = Arc::new(StubTrendTool::no_data());
        let config = ToolConfig {
            max_retries: 2,
            retry_delays_seconds: vec![1],
            ..ToolConfig::default()
        };
        let service = TrendService::new(stub.clone(), &config);

        assert!(service.fetch(&ticker()).await.is_err());
        assert_eq!(stub.calls(), 2);
        assert_eq!(service.cached_entries(), 0);
    }

    #[test]
    fn delay_schedule_reuses_last_entry() {
        let config = ToolConfig {
            max_retries: 5,
            retry_delays_seconds: vec![2, 4],
            ..ToolConfig::default()
        };
        let service = TrendService::new(Arc::new(StubTrendTool::no_data()), &config);
        assert_eq!(service.delay_before(2), Duration::from_secs(2));
        assert_eq!(service.delay_before(3), Duration::from_secs(4));
        assert_eq!(service.delay_before(5), Duration::from_secs(4));
    }
}
