//! Sequential round trip
//!
//! For each fixture, strictly one at a time:
//! generate, purge server copy, put, verify, drop client copy, get, verify,
//! drop both copies. No concurrency, so content and mode effects are seen
//! in isolation.

use std::time::Instant;
use tracing::{info_span, warn, Instrument};

use super::{remove_if_exists, Orchestrator, ScenarioError, ScenarioKind, ScenarioReport};
use crate::fixture::TestFixture;
use crate::invoker::{Operation, TransferMode};
use crate::verify::{ComparisonOutcome, ComparisonResult};

const TRANSLATION_HINT: &str = "netascii translation expected for this profile";

impl Orchestrator {
    /// Round-trip every fixture in order
    pub async fn sequential(&self, fixtures: &[TestFixture]) -> ScenarioReport {
        let kind = ScenarioKind::Sequential;
        async {
            let mut report = ScenarioReport::start(kind);
            let started = Instant::now();
            let result = self.sequential_steps(fixtures, &mut report).await;
            report.finish(result, started);
            report
        }
        .instrument(info_span!("scenario", name = kind.name()))
        .await
    }

    async fn sequential_steps(
        &self,
        fixtures: &[TestFixture],
        report: &mut ScenarioReport,
    ) -> Result<(), ScenarioError> {
        for fixture in fixtures {
            self.round_trip(fixture, report)
                .instrument(info_span!("fixture", name = %fixture.name))
                .await?;
        }
        Ok(())
    }

    async fn round_trip(
        &self,
        fixture: &TestFixture,
        report: &mut ScenarioReport,
    ) -> Result<(), ScenarioError> {
        let name = fixture.name.as_str();
        let client_copy = self.client_path(name);
        let server_copy = self.server_path(name);

        if let Err(e) = fixture.materialize(&self.config.directories.client_dir).await {
            remove_if_exists(&client_copy).await;
            return Err(e.into());
        }
        remove_if_exists(&server_copy).await;

        let put = self.invocation(Operation::Put, name);
        report.record_invocation(self.client.invoke(&put).await);
        let mut uploaded = self.verifier.compare(name, Operation::Put.label()).await;
        annotate_translation(&mut uploaded, fixture, put.mode);
        report.record_comparison(uploaded);

        remove_if_exists(&client_copy).await;

        let get = self.invocation(Operation::Get, name);
        report.record_invocation(self.client.invoke(&get).await);
        let mut downloaded = self.verifier.compare(name, Operation::Get.label()).await;
        annotate_translation(&mut downloaded, fixture, get.mode);
        report.record_comparison(downloaded);

        remove_if_exists(&server_copy).await;
        remove_if_exists(&client_copy).await;
        Ok(())
    }
}

/// Tag a mismatch that netascii line-ending translation can account for
fn annotate_translation(result: &mut ComparisonResult, fixture: &TestFixture, mode: TransferMode) {
    if mode != TransferMode::Netascii || !fixture.profile.is_translation_sensitive() {
        return;
    }
    if let ComparisonOutcome::Mismatch(detail) = &mut result.outcome {
        warn!(
            fixture = %fixture.name,
            operation = %result.operation,
            "Netascii translation expected for this profile"
        );
        detail.note = Some(match detail.note.take() {
            Some(note) => format!("{}; {}", note, TRANSLATION_HINT),
            None => TRANSLATION_HINT.to_string(),
        });
    }
}
