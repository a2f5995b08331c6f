//! Probe sessions
//!
//! A [`Session`] owns one driver for the length of one probe and walks it
//! through navigate, fill, submit, poll and capture. Soft conditions such as
//! a disabled send button or zero indicator matches are logged and reported
//! as values; only a missing required element or an unstable page is an
//! error.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Timeouts;
use crate::driver::{Driver, DriverFactory};
use crate::error::{ProbeError, ProbeResult};
use crate::evidence::{EvidenceLog, EvidenceRecord};
use crate::indicator::{Indicator, IndicatorCount, IndicatorReport, VariantCount};
use crate::request::ProbeRequest;
use crate::selector::{Located, Locator};

/// Furthest point a session has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStage {
    NotNavigated,
    Navigated,
    InputFilled,
    Skipped,
    Submitted,
    IndicatorsPolled,
    EvidenceCaptured,
    Closed,
}

/// What happened when the harness tried to act on an optional control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Present and enabled; acted on exactly once
    Acted,
    /// Present but disabled
    Skipped,
    /// No match on the page
    Absent,
}

impl ActionOutcome {
    pub fn acted(self) -> bool {
        self == ActionOutcome::Acted
    }
}

/// Result of [`Session::probe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Elements the input locator resolved to
    pub input_matches: usize,
    pub submit: ActionOutcome,
}

/// Everything a scoped session leaves behind
#[derive(Debug)]
pub struct SessionReport<T> {
    pub session_id: Uuid,
    /// What the body returned
    pub outcome: ProbeResult<T>,
    /// Stage reached before teardown
    pub stage: ProbeStage,
    pub evidence: Vec<EvidenceRecord>,
}

/// One browser context for one probe
pub struct Session {
    id: Uuid,
    name: String,
    driver: Option<Box<dyn Driver>>,
    stage: ProbeStage,
    evidence: EvidenceLog,
    timeouts: Timeouts,
}

impl Session {
    /// Wrap an already launched driver; evidence goes to `dir`
    pub fn new(
        driver: Box<dyn Driver>,
        name: impl Into<String>,
        timeouts: Timeouts,
        dir: impl Into<PathBuf>,
    ) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            driver: Some(driver),
            stage: ProbeStage::NotNavigated,
            evidence: EvidenceLog::new(dir),
            timeouts,
        };
        debug!("Session {} opened for '{}'", session.id, session.name);
        session
    }

    /// Launch a driver from `factory` and wrap it
    pub async fn open(
        factory: &dyn DriverFactory,
        name: impl Into<String>,
        timeouts: Timeouts,
        dir: impl Into<PathBuf>,
    ) -> ProbeResult<Self> {
        let driver = factory.launch().await?;
        Ok(Self::new(driver, name, timeouts, dir))
    }

    /// Run `body` against a fresh session and close it on every exit path.
    ///
    /// A panic inside `body` is resumed once the browser has been released.
    /// Only a launch failure is returned as `Err`; errors from `body` end up
    /// in [`SessionReport::outcome`].
    pub async fn scoped<T, F>(
        factory: &dyn DriverFactory,
        name: &str,
        timeouts: Timeouts,
        dir: &Path,
        body: F,
    ) -> ProbeResult<SessionReport<T>>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, ProbeResult<T>>,
    {
        let mut session = Self::open(factory, name, timeouts, dir).await?;

        let result = AssertUnwindSafe(body(&mut session)).catch_unwind().await;

        let stage = session.stage;
        if let Err(e) = session.close().await {
            warn!("Closing session '{}' failed: {}", session.name, e);
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        Ok(SessionReport {
            session_id: session.id,
            outcome,
            stage,
            evidence: session.evidence.records().to_vec(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ProbeStage {
        self.stage
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn evidence(&self) -> &[EvidenceRecord] {
        self.evidence.records()
    }

    /// Directory screenshots are written to
    pub fn dir(&self) -> &Path {
        self.evidence.dir()
    }

    pub fn is_closed(&self) -> bool {
        self.driver.is_none()
    }

    fn driver(&mut self) -> ProbeResult<&mut Box<dyn Driver>> {
        self.driver.as_mut().ok_or(ProbeError::SessionClosed)
    }

    fn advance(&mut self, stage: ProbeStage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    /// Load `url` and wait until the UI stops changing
    pub async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        let limit = self.timeouts.navigation();
        let poll = self.timeouts.stable_poll();
        let needed = self.timeouts.stable_samples.max(1);
        let deadline = Instant::now() + limit;

        info!("Navigating to {}", url);
        let driver = self.driver()?;

        match timeout(limit, driver.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(ProbeError::Navigation { reason, .. })) | Ok(Err(ProbeError::Driver(reason))) => {
                return Err(ProbeError::Navigation {
                    url: url.to_string(),
                    reason,
                })
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ProbeError::Navigation {
                    url: url.to_string(),
                    reason: format!("page did not load within {} ms", limit.as_millis()),
                })
            }
        }

        let mut last_count: Option<usize> = None;
        let mut streak = 0u32;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let sample = match timeout(remaining, driver.metrics()).await {
                Ok(sample) => sample,
                Err(_) => {
                    return Err(ProbeError::Navigation {
                        url: url.to_string(),
                        reason: format!("UI did not stabilise within {} ms", limit.as_millis()),
                    })
                }
            };
            match sample {
                Ok(metrics) if metrics.is_complete() => {
                    if last_count == Some(metrics.element_count) {
                        streak += 1;
                    } else {
                        last_count = Some(metrics.element_count);
                        streak = 1;
                    }
                    if streak >= needed {
                        break;
                    }
                }
                Ok(metrics) => {
                    debug!("Document state '{}', waiting", metrics.ready_state);
                    last_count = None;
                    streak = 0;
                }
                Err(ProbeError::SessionClosed) => return Err(ProbeError::SessionClosed),
                Err(e) => {
                    debug!("Metrics unavailable while loading: {}", e);
                    last_count = None;
                    streak = 0;
                }
            }

            if Instant::now() >= deadline {
                return Err(ProbeError::Navigation {
                    url: url.to_string(),
                    reason: format!("UI did not stabilise within {} ms", limit.as_millis()),
                });
            }
            sleep(poll).await;
        }

        debug!("UI stable after {} identical samples", needed);
        self.advance(ProbeStage::Navigated);
        Ok(())
    }

    /// URL of the current document
    pub async fn current_url(&mut self) -> ProbeResult<Option<String>> {
        self.driver()?.current_url().await
    }

    /// Count matches for `locator`, waiting up to `limit` (default from config)
    /// for at least one to appear. Zero matches is a valid answer, and so is
    /// the last good count when the driver errors or stalls.
    pub async fn locate(
        &mut self,
        locator: &Locator,
        limit: Option<Duration>,
    ) -> ProbeResult<Located> {
        let limit = limit.unwrap_or_else(|| self.timeouts.locate());
        let poll = self.timeouts.locate_poll();
        let deadline = Instant::now() + limit;
        let driver = self.driver()?;

        let mut count = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, driver.count(&locator.selector)).await {
                Ok(Ok(n)) => count = n,
                Ok(Err(e)) => warn!("Counting {} failed: {}", locator, e),
                Err(_) => {
                    warn!("Counting {} did not answer within {} ms", locator, limit.as_millis());
                    break;
                }
            }
            if count > 0 || Instant::now() >= deadline {
                break;
            }
            sleep(poll).await;
        }

        let located = Located {
            locator: locator.clone(),
            count,
        };
        debug!("{} -> {} match(es)", locator, located.resolved());
        Ok(located)
    }

    /// Resolve the single element `locator` refers to
    async fn resolve_one(&mut self, locator: &Locator) -> ProbeResult<Option<usize>> {
        let count = self.driver()?.count(&locator.selector).await?;
        if locator.nth.is_none() && count > 1 {
            return Err(ProbeError::StrictModeViolation {
                selector: locator.selector.to_string(),
                count,
            });
        }
        Ok(locator.index_within(count))
    }

    /// Replace the content of the element `locator` refers to
    pub async fn fill(&mut self, locator: &Locator, text: &str) -> ProbeResult<()> {
        let index = self
            .resolve_one(locator)
            .await?
            .ok_or_else(|| ProbeError::ElementNotFound(locator.to_string()))?;

        let driver = self.driver()?;
        driver.fill(&locator.selector, index, text).await?;

        let content = driver.content(&locator.selector, index).await?;
        if content.as_deref() != Some(text) {
            warn!(
                "{} holds {:?} after fill, expected {} chars",
                locator,
                content,
                text.chars().count()
            );
        }

        info!("Filled {} ({} chars)", locator, text.chars().count());
        self.advance(ProbeStage::InputFilled);
        Ok(())
    }

    /// Current content of the element `locator` refers to
    pub async fn content(&mut self, locator: &Locator) -> ProbeResult<Option<String>> {
        match self.resolve_one(locator).await? {
            Some(index) => self.driver()?.content(&locator.selector, index).await,
            None => Ok(None),
        }
    }

    /// Click `locator` once if it is present and enabled
    pub async fn submit(&mut self, locator: &Locator) -> ProbeResult<ActionOutcome> {
        let outcome = self.click_if_ready(locator).await?;
        match outcome {
            ActionOutcome::Acted => info!("Submitted via {}", locator),
            ActionOutcome::Skipped => warn!("Submit control {} is disabled, skipping", locator),
            ActionOutcome::Absent => warn!("Submit control {} not found, skipping", locator),
        }
        self.advance(if outcome.acted() {
            ProbeStage::Submitted
        } else {
            ProbeStage::Skipped
        });
        Ok(outcome)
    }

    /// Click `locator` once if it is present and enabled, without touching the stage
    pub async fn click_if_ready(&mut self, locator: &Locator) -> ProbeResult<ActionOutcome> {
        let Some(index) = self.resolve_one(locator).await? else {
            return Ok(ActionOutcome::Absent);
        };

        let driver = self.driver()?;
        if !driver.is_enabled(&locator.selector, index).await? {
            return Ok(ActionOutcome::Skipped);
        }
        driver.click(&locator.selector, index).await?;
        Ok(ActionOutcome::Acted)
    }

    /// Wait `wait`, then count matches for every variant of every indicator
    pub async fn poll_indicators(
        &mut self,
        indicators: &[Indicator],
        wait: Duration,
    ) -> ProbeResult<IndicatorReport> {
        self.driver()?;
        debug!("Waiting {} ms before polling indicators", wait.as_millis());
        sleep(wait).await;

        let mut report = IndicatorReport {
            waited_ms: wait.as_millis() as u64,
            indicators: Vec::with_capacity(indicators.len()),
        };

        for indicator in indicators {
            let mut variants = Vec::with_capacity(indicator.patterns.len());
            for pattern in &indicator.patterns {
                let count = match pattern.selector() {
                    Ok(selector) => match self.driver()?.count(&selector).await {
                        Ok(count) => count,
                        Err(ProbeError::SessionClosed) => return Err(ProbeError::SessionClosed),
                        Err(e) => {
                            warn!("Counting '{}' ({}) failed: {}", indicator.name, pattern.locale, e);
                            0
                        }
                    },
                    Err(e) => {
                        warn!("Skipping '{}' ({}): {}", indicator.name, pattern.locale, e);
                        0
                    }
                };
                variants.push(VariantCount {
                    locale: pattern.locale.clone(),
                    pattern: pattern.pattern.clone(),
                    count,
                });
            }

            let counted = IndicatorCount {
                name: indicator.name.clone(),
                variants,
            };
            info!(
                "{} indicators found: {} ({})",
                counted.name,
                counted.total(),
                counted.breakdown()
            );
            report.indicators.push(counted);
        }

        self.advance(ProbeStage::IndicatorsPolled);
        Ok(report)
    }

    /// Screenshot the page as the next evidence record
    pub async fn capture(&mut self, label: &str) -> ProbeResult<EvidenceRecord> {
        let png = self.driver()?.screenshot().await?;
        let record = self.evidence.record(label, &png)?;
        info!("Captured '{}' -> {}", label, record.path.display());

        if self.stage >= ProbeStage::Skipped {
            self.advance(ProbeStage::EvidenceCaptured);
        }
        Ok(record)
    }

    /// Navigate, fill the input and try to submit.
    ///
    /// A missing input is a hard failure; a missing or disabled submit control
    /// is reported in the outcome.
    pub async fn probe(&mut self, request: &ProbeRequest) -> ProbeResult<ProbeOutcome> {
        let url = request.target_url()?;
        self.navigate(url.as_str()).await?;
        self.fill_and_submit(request).await
    }

    /// The part of [`probe`](Self::probe) after navigation
    pub async fn fill_and_submit(&mut self, request: &ProbeRequest) -> ProbeResult<ProbeOutcome> {
        let input = Locator::new(request.input.clone()).first();
        let located = self.locate(&input, None).await?;
        if !located.is_present() {
            return Err(ProbeError::ElementNotFound(format!(
                "input field {} not found",
                input
            )));
        }
        self.fill(&input, &request.input_text).await?;

        let submit = self
            .submit(&Locator::new(request.submit.clone()).first())
            .await?;

        Ok(ProbeOutcome {
            input_matches: located.resolved(),
            submit,
        })
    }

    /// Release the browser and write the evidence manifest. Closing twice is a no-op.
    pub async fn close(&mut self) -> ProbeResult<()> {
        let Some(mut driver) = self.driver.take() else {
            return Ok(());
        };
        self.stage = ProbeStage::Closed;

        let closed = driver.close().await;
        if !self.evidence.records().is_empty() {
            self.evidence.write_manifest()?;
        }
        debug!("Session {} closed", self.id);
        closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!("Session '{}' dropped without close", self.name);
        }
    }
}
