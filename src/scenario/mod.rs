//! Scenario orchestration
//!
//! Sequences fixture generation, client invocations, verification and
//! cleanup. Three scenarios exist:
//!
//! - **sequential**: one fixture at a time, upload then download, random mode
//! - **dual client**: a large and a small upload running side by side
//! - **identical target**: N concurrent uploads of one byte to one name
//!
//! Every scenario is its own failure domain. A fixture that cannot be
//! written aborts that scenario only; client failures and mismatches are
//! recorded in the [`ScenarioReport`] and never stop the run.
//!
//! # Example
//!
//! ```no_run
//! use tftp_conformance::config::HarnessConfig;
//! use tftp_conformance::scenario::{Orchestrator, ScenarioKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarnessConfig::load("harness.yaml")?;
//! let orchestrator = Orchestrator::with_external_client(config);
//!
//! let report = orchestrator.run(ScenarioKind::DualClient).await;
//! println!("{}: {:?}", report.scenario, report.status());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn, Instrument};

use crate::config::HarnessConfig;
use crate::fixture::{FixtureError, TestFixture};
use crate::invoker::{ExternalClient, Invocation, InvocationReport, Operation, TransferClient};
use crate::metrics;
use crate::verify::{ComparisonResult, RoundTripVerifier};

mod dual;
mod identical_target;
mod sequential;

/// Scenario-fatal errors
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Fixture generation failed: {0}")]
    Fixture(#[from] FixtureError),

    #[error("Invocation worker panicked: {0}")]
    Worker(String),
}

/// Which scenario to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Sequential,
    DualClient,
    IdenticalTarget { clients: usize },
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Sequential => "sequential",
            ScenarioKind::DualClient => "dual_client",
            ScenarioKind::IdenticalTarget { .. } => "identical_target",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scenario verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Every comparison matched
    Passed,
    /// At least one comparison mismatched
    Failed,
    /// Stopped early by a fatal error
    Aborted,
}

impl ScenarioStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Failed => "failed",
            ScenarioStatus::Aborted => "aborted",
        }
    }
}

/// Everything one scenario observed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: ScenarioKind,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub invocations: usize,
    pub failed_invocations: Vec<InvocationReport>,
    pub comparisons: Vec<ComparisonResult>,
    pub aborted: Option<String>,
}

impl ScenarioReport {
    fn start(scenario: ScenarioKind) -> Self {
        Self {
            scenario,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            invocations: 0,
            failed_invocations: Vec::new(),
            comparisons: Vec::new(),
            aborted: None,
        }
    }

    pub fn status(&self) -> ScenarioStatus {
        if self.aborted.is_some() {
            ScenarioStatus::Aborted
        } else if self.comparisons.iter().all(ComparisonResult::is_success) {
            ScenarioStatus::Passed
        } else {
            ScenarioStatus::Failed
        }
    }

    pub fn passed(&self) -> bool {
        self.status() == ScenarioStatus::Passed
    }

    pub fn mismatches(&self) -> usize {
        self.comparisons.iter().filter(|c| !c.is_success()).count()
    }

    fn record_invocation(&mut self, report: InvocationReport) {
        self.invocations += 1;
        if !report.is_success() {
            self.failed_invocations.push(report);
        }
    }

    fn record_comparison(&mut self, result: ComparisonResult) {
        self.comparisons.push(result);
    }

    fn finish(&mut self, result: Result<(), ScenarioError>, started: Instant) {
        let elapsed = started.elapsed();
        self.duration = elapsed;
        if let Err(e) = result {
            self.aborted = Some(e.to_string());
        }

        let status = self.status();
        match status {
            ScenarioStatus::Passed => info!(
                comparisons = self.comparisons.len(),
                invocations = self.invocations,
                failed_invocations = self.failed_invocations.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Scenario passed"
            ),
            ScenarioStatus::Failed => error!(
                mismatches = self.mismatches(),
                comparisons = self.comparisons.len(),
                failed_invocations = self.failed_invocations.len(),
                "Scenario failed"
            ),
            ScenarioStatus::Aborted => error!(
                reason = self.aborted.as_deref().unwrap_or_default(),
                "Scenario aborted"
            ),
        }
        metrics::record_scenario(self.scenario.name(), status.as_str());
    }
}

/// Reports of a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    pub fn passed(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }
}

/// Drives scenarios against one server with one client
///
/// Holds the immutable configuration and a bounded pool of invocation
/// permits shared by every concurrent scenario.
pub struct Orchestrator {
    config: Arc<HarnessConfig>,
    client: Arc<dyn TransferClient>,
    verifier: RoundTripVerifier,
    limiter: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(config: HarnessConfig, client: Arc<dyn TransferClient>) -> Self {
        let verifier = RoundTripVerifier::new(
            config.directories.client_dir.clone(),
            config.directories.server_dir.clone(),
        );
        let limiter = Arc::new(Semaphore::new(config.scenarios.max_concurrency.max(1)));
        Self {
            config: Arc::new(config),
            client,
            verifier,
            limiter,
        }
    }

    /// Orchestrator backed by the configured client binary
    pub fn with_external_client(config: HarnessConfig) -> Self {
        let client = Arc::new(ExternalClient::from_config(&config));
        Self::new(config, client)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario with its default fixtures
    pub async fn run(&self, kind: ScenarioKind) -> ScenarioReport {
        match kind {
            ScenarioKind::Sequential => self.sequential(&self.sequential_fixtures()).await,
            ScenarioKind::DualClient => {
                self.dual_client(&TestFixture::big_ascii(), &TestFixture::line_endings())
                    .await
            }
            ScenarioKind::IdenticalTarget { clients } => self.identical_target(clients).await,
        }
    }

    /// Run sequential, dual client and identical target, in that order
    pub async fn run_all(&self) -> RunSummary {
        let kinds = [
            ScenarioKind::Sequential,
            ScenarioKind::DualClient,
            ScenarioKind::IdenticalTarget {
                clients: self.config.scenarios.parallel_clients,
            },
        ];

        let mut summary = RunSummary::default();
        for kind in kinds {
            summary.reports.push(self.run(kind).await);
        }
        summary
    }

    /// Catalog fixtures selected by configuration, or the whole catalog
    pub fn sequential_fixtures(&self) -> Vec<TestFixture> {
        match &self.config.scenarios.fixtures {
            Some(names) => names
                .iter()
                .filter_map(|name| TestFixture::by_name(name))
                .collect(),
            None => TestFixture::catalog(),
        }
    }

    /// Invocation with a mode drawn from configuration and the configured
    /// client options
    fn invocation(&self, operation: Operation, name: &str) -> Invocation {
        Invocation::new(operation, name, self.config.scenarios.mode.pick())
            .with_options(self.config.invoke_options())
    }

    /// Launch every invocation concurrently and wait for all of them.
    ///
    /// At most `max_concurrency` clients run at once. Nothing is returned
    /// until the last invocation has finished.
    async fn launch_all(
        &self,
        invocations: Vec<Invocation>,
    ) -> Result<Vec<InvocationReport>, ScenarioError> {
        self.launch(invocations, Some(&self.limiter)).await
    }

    /// Launch every invocation at once, outside the worker pool, so the
    /// sessions overlap whatever `max_concurrency` is set to.
    async fn launch_together(
        &self,
        invocations: Vec<Invocation>,
    ) -> Result<Vec<InvocationReport>, ScenarioError> {
        self.launch(invocations, None).await
    }

    async fn launch(
        &self,
        invocations: Vec<Invocation>,
        limiter: Option<&Arc<Semaphore>>,
    ) -> Result<Vec<InvocationReport>, ScenarioError> {
        let handles: Vec<_> = invocations
            .into_iter()
            .map(|invocation| {
                let client = Arc::clone(&self.client);
                let limiter = limiter.cloned();
                tokio::spawn(
                    async move {
                        let _permit = match limiter {
                            Some(limiter) => limiter.acquire_owned().await.ok(),
                            None => None,
                        };
                        client.invoke(&invocation).await
                    }
                    .in_current_span(),
                )
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            reports.push(joined.map_err(|e| ScenarioError::Worker(e.to_string()))?);
        }
        Ok(reports)
    }

    fn client_path(&self, name: &str) -> PathBuf {
        self.config.directories.client_dir.join(name)
    }

    fn server_path(&self, name: &str) -> PathBuf {
        self.config.directories.server_dir.join(name)
    }
}

/// Remove a file, treating an absent file as already removed
pub(crate) async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}
