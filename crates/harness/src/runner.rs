//! Probe runner: executes probe specs in scoped sessions and aggregates results

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ProbeConfig, Timeouts};
use crate::driver::DriverFactory;
use crate::error::{ProbeError, ProbeResult};
use crate::evidence::EvidenceRecord;
use crate::indicator::IndicatorReport;
use crate::selector::Locator;
use crate::session::{ActionOutcome, ProbeStage, Session};
use crate::spec::ProbeSpec;

/// Results file written at the root of each run directory
pub const RESULTS_FILE: &str = "probe-results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeVerdict {
    Passed,
    /// The interaction could not be attempted as described
    Failed,
    /// Documentation-only probe; says nothing about the UI
    Documented,
    /// The harness itself broke (browser launch, artifact I/O)
    Errored,
}

/// Result of running a single probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub name: String,
    pub verdict: ProbeVerdict,
    pub duration_ms: u64,
    pub stage: ProbeStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<ActionOutcome>,
    pub indicators: IndicatorReport,
    pub evidence: Vec<EvidenceRecord>,
    pub error: Option<String>,
}

impl ProbeReport {
    fn new(name: &str, verdict: ProbeVerdict) -> Self {
        Self {
            name: name.to_string(),
            verdict,
            duration_ms: 0,
            stage: ProbeStage::NotNavigated,
            session_id: None,
            activated: None,
            input_matches: None,
            submit: None,
            indicators: IndicatorReport::default(),
            evidence: Vec::new(),
            error: None,
        }
    }

    fn errored(name: &str, error: &ProbeError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(name, ProbeVerdict::Errored)
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.verdict, ProbeVerdict::Passed | ProbeVerdict::Documented)
    }
}

/// Result of running a set of probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub documented: usize,
    pub errored: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub run_dir: PathBuf,
    pub results: Vec<ProbeReport>,
}

impl SuiteResult {
    fn from_reports(
        results: Vec<ProbeReport>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        run_dir: PathBuf,
    ) -> Self {
        let count = |verdict: ProbeVerdict| results.iter().filter(|r| r.verdict == verdict).count();
        Self {
            total: results.len(),
            passed: count(ProbeVerdict::Passed),
            failed: count(ProbeVerdict::Failed),
            documented: count(ProbeVerdict::Documented),
            errored: count(ProbeVerdict::Errored),
            started_at,
            duration_ms,
            run_dir,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    /// 0 when everything passed, 1 on probe failures, 2 on harness errors
    pub fn exit_code(&self) -> i32 {
        if self.errored > 0 {
            2
        } else if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

/// Configuration for the probe runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Spec file or directory
    pub specs_path: PathBuf,
    /// Root for run directories
    pub output_dir: PathBuf,
    pub timeouts: Timeouts,
    /// Sessions in flight at once
    pub concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_probe_config(&ProbeConfig::default(), PathBuf::from("probes"))
    }
}

impl RunnerConfig {
    pub fn from_probe_config(config: &ProbeConfig, specs_path: impl Into<PathBuf>) -> Self {
        Self {
            specs_path: specs_path.into(),
            output_dir: config.artifacts.dir.clone(),
            timeouts: config.timeouts.clone(),
            concurrency: config.runner.concurrency,
        }
    }
}

/// What a successful drive through a probe observed
struct Observed {
    activated: Option<bool>,
    input_matches: usize,
    submit: ActionOutcome,
    indicators: IndicatorReport,
}

/// Runs probe specs, one scoped session each
pub struct ProbeRunner {
    factory: Arc<dyn DriverFactory>,
    config: RunnerConfig,
    run_dir: PathBuf,
}

impl ProbeRunner {
    /// Create a runner; artifacts go to `<output_dir>/run_<timestamp>`
    pub fn new(factory: Arc<dyn DriverFactory>, config: RunnerConfig) -> Self {
        let run_dir = config
            .output_dir
            .join(Local::now().format("run_%Y%m%d_%H%M%S").to_string());
        Self {
            factory,
            config,
            run_dir,
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Run all probes under the specs path
    pub async fn run_all(&self) -> ProbeResult<SuiteResult> {
        let specs = ProbeSpec::load_all(&self.config.specs_path)?;
        self.run_specs(&specs).await
    }

    /// Run probes carrying `tag`
    pub async fn run_tagged(&self, tag: &str) -> ProbeResult<SuiteResult> {
        let specs = ProbeSpec::load_all(&self.config.specs_path)?;
        let filtered: Vec<ProbeSpec> = specs.into_iter().filter(|s| s.has_tag(tag)).collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific probe by name
    pub async fn run_named(&self, name: &str) -> ProbeResult<ProbeReport> {
        let specs = ProbeSpec::load_all(&self.config.specs_path)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ProbeError::SpecParse(format!("Probe not found: {}", name)))?;

        self.run_spec(&spec).await
    }

    /// Run a list of probe specs, keeping their order in the results.
    ///
    /// Specs whose names map to the same artifact directory are rejected
    /// before any browser starts.
    pub async fn run_specs(&self, specs: &[ProbeSpec]) -> ProbeResult<SuiteResult> {
        ProbeSpec::check_unique(specs)?;
        let started_at = Utc::now();
        let start = Instant::now();
        let concurrency = self.config.concurrency.max(1);

        info!(
            "Running {} probe(s) with {} ({} at a time)...",
            specs.len(),
            self.factory.name(),
            concurrency
        );

        let results: Vec<ProbeReport> = stream::iter(specs)
            .map(|spec| async move {
                let result = match self.run_spec(spec).await {
                    Ok(result) => result,
                    Err(e) => ProbeReport::errored(&spec.name, &e),
                };
                match result.verdict {
                    ProbeVerdict::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                    ProbeVerdict::Documented => info!("• {} (documentation)", result.name),
                    ProbeVerdict::Failed | ProbeVerdict::Errored => error!(
                        "✗ {} - {}",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    ),
                }
                result
            })
            .buffered(concurrency)
            .collect()
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let suite = SuiteResult::from_reports(results, started_at, duration_ms, self.run_dir.clone());

        info!("");
        info!(
            "Probe Results: {} passed, {} failed, {} documented, {} errored ({} ms)",
            suite.passed, suite.failed, suite.documented, suite.errored, suite.duration_ms
        );

        Ok(suite)
    }

    /// Run a single probe spec.
    ///
    /// Probe failures are reported in the returned [`ProbeReport`]; `Err`
    /// means no session could be opened.
    pub async fn run_spec(&self, spec: &ProbeSpec) -> ProbeResult<ProbeReport> {
        let start = Instant::now();
        debug!("Running probe: {}", spec.name);

        if spec.is_documentation() {
            info!("{}: {}", spec.name, spec.description);
            for line in spec.notes.lines().filter(|l| !l.trim().is_empty()) {
                info!("  {}", line);
            }
            return Ok(ProbeReport::new(&spec.name, ProbeVerdict::Documented));
        }

        let dir = self.run_dir.join(spec.dir_name());
        let owned = spec.clone();
        let scoped = Session::scoped(
            self.factory.as_ref(),
            &spec.name,
            self.config.timeouts.clone(),
            &dir,
            move |session| Box::pin(drive(session, owned)),
        )
        .await?;

        let mut report = ProbeReport::new(&spec.name, ProbeVerdict::Passed);
        report.session_id = Some(scoped.session_id);
        report.stage = scoped.stage;
        report.evidence = scoped.evidence;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match scoped.outcome {
            Ok(observed) => {
                report.activated = observed.activated;
                report.input_matches = Some(observed.input_matches);
                report.submit = Some(observed.submit);
                report.indicators = observed.indicators;
            }
            Err(e) => {
                report.verdict = if e.is_probe_failure() {
                    ProbeVerdict::Failed
                } else {
                    ProbeVerdict::Errored
                };
                report.error = Some(e.to_string());
            }
        }

        Ok(report)
    }

    /// Write results to `probe-results.json` in the run directory
    pub fn write_results(&self, results: &SuiteResult) -> ProbeResult<PathBuf> {
        std::fs::create_dir_all(&self.run_dir)?;

        let path = self.run_dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Navigate, activate, fill, submit, poll, capturing at each checkpoint
async fn drive(session: &mut Session, spec: ProbeSpec) -> ProbeResult<Observed> {
    let Some(mut request) = spec.request.clone() else {
        return Err(ProbeError::SpecParse(format!(
            "probe '{}' has no request",
            spec.name
        )));
    };

    let url = request.target_url()?;
    session.navigate(url.as_str()).await?;

    let mut activated = None;
    if let Some(activation) = &spec.activation {
        let ok = activation.activate(session, &mut request).await?;
        activated = Some(ok);
        if let Some(label) = spec.checkpoints.after_activation(activation) {
            session.capture(label).await?;
        }
        if !ok {
            if spec.require_activation {
                return Err(ProbeError::AssertionFailed(format!(
                    "activation via {} did not succeed",
                    activation.describe()
                )));
            }
            warn!("{}: activation via {} not confirmed", spec.name, activation.describe());
        }
    }

    let input = Locator::new(request.input.clone()).first();
    let located = session.locate(&input, None).await?;
    if !located.is_present() {
        return Err(ProbeError::AssertionFailed(format!(
            "input field {} not found",
            input
        )));
    }
    session.fill(&input, &request.input_text).await?;
    session.capture(&spec.checkpoints.filled).await?;

    let submit = session
        .submit(&Locator::new(request.submit.clone()).first())
        .await?;

    let indicators = if submit.acted() {
        session
            .poll_indicators(&spec.indicators, Duration::from_millis(spec.indicator_wait_ms))
            .await?
    } else {
        IndicatorReport::default()
    };

    session.capture(&spec.checkpoints.submitted).await?;

    Ok(Observed {
        activated,
        input_matches: located.resolved(),
        submit,
        indicators,
    })
}
