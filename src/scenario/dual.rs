//! Dual-client concurrent upload
//!
//! A large and a small fixture are uploaded at the same time. Both uploads
//! must finish before either is verified, and each server copy must equal
//! its own source: no bytes may bleed between the two transfer sessions.
//! The pair bypasses the worker pool, so the sessions always overlap.

use std::time::Instant;
use tracing::{info_span, Instrument};

use super::{remove_if_exists, Orchestrator, ScenarioError, ScenarioKind, ScenarioReport};
use crate::fixture::TestFixture;
use crate::invoker::Operation;

impl Orchestrator {
    /// Upload `large` and `small` concurrently, then verify both
    pub async fn dual_client(&self, large: &TestFixture, small: &TestFixture) -> ScenarioReport {
        let kind = ScenarioKind::DualClient;
        async {
            let mut report = ScenarioReport::start(kind);
            let started = Instant::now();
            let result = self.dual_client_steps(large, small, &mut report).await;
            report.finish(result, started);
            report
        }
        .instrument(info_span!("scenario", name = kind.name()))
        .await
    }

    async fn dual_client_steps(
        &self,
        large: &TestFixture,
        small: &TestFixture,
        report: &mut ScenarioReport,
    ) -> Result<(), ScenarioError> {
        let result = self.dual_client_transfer(large, small, report).await;

        for fixture in [large, small] {
            remove_if_exists(&self.server_path(&fixture.name)).await;
            remove_if_exists(&self.client_path(&fixture.name)).await;
        }
        result
    }

    async fn dual_client_transfer(
        &self,
        large: &TestFixture,
        small: &TestFixture,
        report: &mut ScenarioReport,
    ) -> Result<(), ScenarioError> {
        let client_dir = &self.config.directories.client_dir;
        large.materialize(client_dir).await?;
        small.materialize(client_dir).await?;

        remove_if_exists(&self.server_path(&large.name)).await;
        remove_if_exists(&self.server_path(&small.name)).await;

        let invocations = vec![
            self.invocation(Operation::Put, &large.name).labelled("lazy"),
            self.invocation(Operation::Put, &small.name).labelled("quick"),
        ];
        for outcome in self.launch_together(invocations).await? {
            report.record_invocation(outcome);
        }

        for fixture in [large, small] {
            let label = Operation::Put.label();
            report.record_comparison(self.verifier.compare(&fixture.name, label).await);
        }
        Ok(())
    }
}
