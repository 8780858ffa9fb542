//! N-way identical-target upload
//!
//! One single-byte fixture is uploaded by N concurrent clients, all naming
//! the same destination file. Once every client has exited, the server file
//! is compared against a reference built from the configured
//! [`WriteConflictPolicy`]: N copies of the payload under `append`, one copy
//! under `last_writer_wins`. A server that behaves otherwise fails loudly.
//!
//! [`WriteConflictPolicy`]: crate::config::WriteConflictPolicy

use std::time::Instant;
use tracing::{error, info_span, Instrument};

use super::{remove_if_exists, Orchestrator, ScenarioError, ScenarioKind, ScenarioReport};
use crate::fixture::{self, TestFixture};
use crate::invoker::Operation;
use crate::verify::ComparisonOutcome;

/// Local file holding the expected server content
pub const REFERENCE_FILE: &str = "appended.txt";

/// Label of the single comparison this scenario makes
pub const COMPARISON_LABEL: &str = "Parallel clients";

impl Orchestrator {
    /// Upload one byte to the same name from `clients` concurrent clients
    pub async fn identical_target(&self, clients: usize) -> ScenarioReport {
        let kind = ScenarioKind::IdenticalTarget { clients };
        async {
            let mut report = ScenarioReport::start(kind);
            let started = Instant::now();
            let result = self.identical_target_steps(clients, &mut report).await;
            report.finish(result, started);
            report
        }
        .instrument(info_span!("scenario", name = kind.name(), clients))
        .await
    }

    async fn identical_target_steps(
        &self,
        clients: usize,
        report: &mut ScenarioReport,
    ) -> Result<(), ScenarioError> {
        let target = TestFixture::parallel_target();
        let result = self.identical_target_transfer(&target, clients, report).await;

        remove_if_exists(&self.server_path(&target.name)).await;
        remove_if_exists(&self.client_path(&target.name)).await;
        remove_if_exists(&self.client_path(REFERENCE_FILE)).await;
        result
    }

    async fn identical_target_transfer(
        &self,
        target: &TestFixture,
        clients: usize,
        report: &mut ScenarioReport,
    ) -> Result<(), ScenarioError> {
        remove_if_exists(&self.server_path(&target.name)).await;
        let payload = target
            .materialize(&self.config.directories.client_dir)
            .await?;

        let invocations: Vec<_> = (0..clients)
            .map(|i| {
                self.invocation(Operation::Put, &target.name)
                    .labelled(&format!("writer-{}", i))
                    .quiet()
            })
            .collect();
        for outcome in self.launch_all(invocations).await? {
            report.record_invocation(outcome);
        }

        let policy = self.config.scenarios.write_conflict_policy;
        let reference = payload.repeat(policy.expected_repetitions(clients));
        let reference_path = self.client_path(REFERENCE_FILE);
        fixture::write_file(&reference_path, &reference).await?;

        let result = self
            .verifier
            .compare_paths(
                &reference_path,
                &self.server_path(&target.name),
                &target.name,
                COMPARISON_LABEL,
            )
            .await;

        if let ComparisonOutcome::Mismatch(detail) = &result.outcome {
            error!(
                expected_policy = policy.as_str(),
                clients,
                expected_len = reference.len(),
                observed_len = ?detail.actual_len,
                "Server write-conflict policy differs from expected"
            );
        }
        report.record_comparison(result);
        Ok(())
    }
}
