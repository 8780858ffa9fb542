//! Concurrency stress tests through the real external-client invoker
//!
//! Covers the dual-client scenario and the N-way identical-target scenario,
//! including control-script isolation at N = 150.

#![cfg(unix)]

mod common;

use common::{StandIn, TestEnv};
use serial_test::serial;
use tftp_conformance::config::WriteConflictPolicy;
use tftp_conformance::fixture::{ContentProfile, TestFixture};
use tftp_conformance::scenario::{Orchestrator, ScenarioKind, ScenarioStatus};
use tftp_conformance::verify::ComparisonOutcome;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_dual_client_large_and_small_do_not_interfere() {
    let env = TestEnv::new(StandIn::Overwrite);
    let orchestrator = Orchestrator::with_external_client(env.config());

    let large = TestFixture::new("big_file.txt", ContentProfile::LargeUniformAscii, 4 * 1024 * 1024);
    let report = orchestrator
        .dual_client(&large, &TestFixture::line_endings())
        .await;

    assert_eq!(report.status(), ScenarioStatus::Passed, "{:?}", report);
    assert_eq!(report.invocations, 2);
    let names: Vec<_> = report.comparisons.iter().map(|c| c.fixture_name.as_str()).collect();
    assert_eq!(names, vec!["big_file.txt", "file1.txt"]);
    env.assert_clean();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_150_writers_append_without_script_collisions() {
    let env = TestEnv::new(StandIn::Append);
    let orchestrator = Orchestrator::with_external_client(env.config());

    let report = orchestrator
        .run(ScenarioKind::IdenticalTarget { clients: 150 })
        .await;

    assert_eq!(report.status(), ScenarioStatus::Passed, "{:?}", report);
    assert_eq!(report.invocations, 150);
    // A colliding control script would surface as a failed invocation
    assert!(report.failed_invocations.is_empty());
    // No orphaned control scripts, fixtures or reference file
    env.assert_clean();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_last_writer_wins_server_fails_append_expectation() {
    let env = TestEnv::new(StandIn::Overwrite);
    let orchestrator = Orchestrator::with_external_client(env.config());

    let report = orchestrator.identical_target(30).await;

    assert_eq!(report.status(), ScenarioStatus::Failed);
    match &report.comparisons[0].outcome {
        ComparisonOutcome::Mismatch(detail) => {
            assert_eq!(detail.expected_len, Some(30));
            assert_eq!(detail.actual_len, Some(1));
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
    env.assert_clean();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_last_writer_wins_policy_accepts_overwriting_server() {
    let env = TestEnv::new(StandIn::Overwrite);
    let mut config = env.config();
    config.scenarios.write_conflict_policy = WriteConflictPolicy::LastWriterWins;
    config.scenarios.max_concurrency = 10;
    let orchestrator = Orchestrator::with_external_client(config);

    let report = orchestrator.identical_target(30).await;

    assert_eq!(report.status(), ScenarioStatus::Passed, "{:?}", report);
    env.assert_clean();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_identical_target_back_to_back() {
    let env = TestEnv::new(StandIn::Append);
    let orchestrator = Orchestrator::with_external_client(env.config());

    let first = orchestrator.identical_target(25).await;
    let second = orchestrator.identical_target(25).await;

    assert_eq!(first.status(), ScenarioStatus::Passed);
    assert_eq!(second.status(), ScenarioStatus::Passed);
    env.assert_clean();
}
