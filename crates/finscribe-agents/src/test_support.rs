//! Stub collaborators for exercising the workflow without the Claude CLI or
//! bar files.
//!
//! `StubPipeline` stands in for the delegated agent framework and
//! `StubTrendTool` for the trends tool. Both count their calls so tests can
//! assert that a rejected input never reached them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use finscribe_models::agent_message::PipelineRequest;
use finscribe_models::config::SecurityConfig;
use finscribe_models::Ticker;
use finscribe_store::{MetricsStore, TransactionalMemory};

use crate::error::{AgentError, ToolError};
use crate::pipeline::AgentPipeline;
use crate::security::SecurityFilter;
use crate::tools::TrendTool;
use crate::workflow::AnalysisWorkflow;

/// Output shaped like a real two-step run: the analyst's XML block, then the
/// writer's Markdown report.
pub fn well_formed_output(ticker: &str) -> String {
    format!(
        r#"<analyse_financiere>
  <resume_executif>{ticker} montre une dynamique haussière portée par un volume soutenu.</resume_executif>
  <tendances>
    <tendance numero="1">
      <titre>Variation du prix sur 30 jours: 8.40%</titre>
      <importance>Élevée</importance>
      <impact>Le titre a gagné 8.40% sur le dernier mois.</impact>
    </tendance>
    <tendance numero="2">
      <titre>Activité du volume: 62.3% vs moyenne</titre>
      <importance>Élevée</importance>
      <impact>Intérêt accru des investisseurs.</impact>
    </tendance>
    <tendance numero="3">
      <titre>Volatilité annualisée: 21.7%</titre>
      <importance>Modérée</importance>
      <impact>Risque modéré.</impact>
    </tendance>
  </tendances>
  <limitation_donnees></limitation_donnees>
</analyse_financiere>

# Analyse Stratégique

{ticker} a progressé sur le mois écoulé. Les volumes confirment l'intérêt du marché.

## Une progression marquée
- Hausse de 8,4 % sur trente jours
- Momentum positif

## Un volume en forte hausse
- Volume récent supérieur de 62 % à la moyenne
- Participation accrue

## Une volatilité contenue
- Volatilité annualisée de 21,7 %
- Profil de risque modéré
"#
    )
}

enum Behavior {
    Respond(Option<String>),
    Fail(String),
    FailTimes(usize),
    Hang,
}

/// Scripted [`AgentPipeline`].
pub struct StubPipeline {
    behavior: Behavior,
    calls: AtomicUsize,
    last_request: Mutex<Option<PipelineRequest>>,
}

impl StubPipeline {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Returns [`well_formed_output`] for the requested ticker.
    pub fn well_formed() -> Self {
        Self::with(Behavior::Respond(None))
    }

    pub fn responding(output: &str) -> Self {
        Self::with(Behavior::Respond(Some(output.to_string())))
    }

    /// Always fails with `AgentError::Cli(message)`.
    pub fn failing(message: &str) -> Self {
        Self::with(Behavior::Fail(message.to_string()))
    }

    /// Fails the first `n` calls, then behaves like [`StubPipeline::well_formed`].
    pub fn fail_times(n: usize) -> Self {
        Self::with(Behavior::FailTimes(n))
    }

    /// Never returns.
    pub fn hanging() -> Self {
        Self::with(Behavior::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PipelineRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl AgentPipeline for StubPipeline {
    async fn run(&self, request: &PipelineRequest) -> Result<String, AgentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        match &self.behavior {
            Behavior::Respond(Some(output)) => Ok(output.clone()),
            Behavior::Respond(None) => Ok(well_formed_output(request.ticker.as_str())),
            Behavior::Fail(message) => Err(AgentError::Cli(message.clone())),
            Behavior::FailTimes(n) if call < *n => {
                Err(AgentError::Cli(format!("stub failure {}", call + 1)))
            }
            Behavior::FailTimes(_) => Ok(well_formed_output(request.ticker.as_str())),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

/// Scripted [`TrendTool`].
pub struct StubTrendTool {
    fail_first: usize,
    always_fail: bool,
    hang: bool,
    calls: AtomicUsize,
}

impl StubTrendTool {
    /// Always returns a three-trend text block.
    pub fn sample() -> Self {
        Self {
            fail_first: 0,
            always_fail: false,
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with `ToolError::NoData`.
    pub fn no_data() -> Self {
        Self {
            always_fail: true,
            ..Self::sample()
        }
    }

    /// Fails the first `n` calls, then succeeds.
    pub fn flaky(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::sample()
        }
    }

    /// Never returns.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::sample()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrendTool for StubTrendTool {
    async fn fetch(&self, ticker: &Ticker) -> Result<String, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            return std::future::pending().await;
        }
        if self.always_fail || call < self.fail_first {
            return Err(ToolError::NoData {
                ticker: ticker.to_string(),
                reason: "stub has no data".to_string(),
            });
        }
        Ok(format!(
            "Tendances financières identifiées:\n\n\
             Tendance 1:\n  Titre: Variation du prix sur 30 jours: 8.40%\n  Importance: Élevée\n  \
             Impact: Le titre {ticker} a gagné 8.40% sur le dernier mois.\n\n\
             Tendance 2:\n  Titre: Activité du volume: 62.3% vs moyenne\n  Importance: Élevée\n  \
             Impact: Le volume récent est supérieur de 62.3% à la moyenne.\n\n\
             Tendance 3:\n  Titre: Volatilité annualisée: 21.7%\n  Importance: Modérée\n  \
             Impact: La volatilité de 21.7% indique un risque modéré.\n\n"
        ))
    }
}

/// Workflow over fresh stores with default settings. Returns the stores for
/// inspection.
pub fn workflow_with(
    pipeline: impl Into<Arc<StubPipeline>>,
    tool: impl Into<Arc<StubTrendTool>>,
) -> (AnalysisWorkflow, Arc<MetricsStore>, Arc<TransactionalMemory>) {
    let metrics = Arc::new(MetricsStore::default());
    let memory = Arc::new(TransactionalMemory::new());
    let security = SecurityFilter::new(&SecurityConfig::default(), Arc::clone(&metrics))
        .unwrap_or_else(|e| panic!("built-in security patterns must compile: {e}"));

    let pipeline: Arc<StubPipeline> = pipeline.into();
    let tool: Arc<StubTrendTool> = tool.into();
    let workflow = AnalysisWorkflow::new(
        pipeline,
        tool,
        security,
        Arc::clone(&metrics),
        Arc::clone(&memory),
    );
    (workflow, metrics, memory)
}
