//! Sequential round-trip tests through the real external-client invoker
//!
//! A shell stand-in plays client and server; these tests check that every
//! content profile survives put then get byte for byte, that failures are
//! reported rather than raised, and that nothing is left behind.

#![cfg(unix)]

mod common;

use common::{StandIn, TestEnv};
use serial_test::serial;
use std::sync::Arc;
use tftp_conformance::config::ModeSelection;
use tftp_conformance::fixture::{ContentProfile, TestFixture};
use tftp_conformance::invoker::{
    ExternalClient, Invocation, InvocationStatus, Operation, TransferClient, TransferMode,
};
use tftp_conformance::scenario::{Orchestrator, ScenarioStatus};

fn small_catalog() -> Vec<TestFixture> {
    vec![
        TestFixture::line_endings(),
        TestFixture::single_char(),
        TestFixture::non_ascii(),
        TestFixture::control_chars(),
        TestFixture::new("rnd_1m.bin", ContentProfile::LargeRandomBytes, 1024 * 1024),
        TestFixture::new("ascii_1m.txt", ContentProfile::LargeUniformAscii, 1024 * 1024),
    ]
}

#[tokio::test]
#[serial]
async fn test_every_profile_round_trips_in_both_modes() {
    for mode in [ModeSelection::Netascii, ModeSelection::Octet] {
        let env = TestEnv::new(StandIn::Overwrite);
        let mut config = env.config();
        config.scenarios.mode = mode;
        let orchestrator = Orchestrator::with_external_client(config);

        let report = orchestrator.sequential(&small_catalog()).await;

        assert_eq!(report.status(), ScenarioStatus::Passed, "{:?}: {:?}", mode, report);
        assert_eq!(report.invocations, 12);
        assert_eq!(report.comparisons.len(), 12);
        env.assert_clean();
    }
}

#[tokio::test]
#[serial]
async fn test_verbose_and_trace_scripts_are_accepted() {
    let env = TestEnv::new(StandIn::Overwrite);
    let mut config = env.config();
    config.client.verbose = true;
    config.client.trace = true;
    let orchestrator = Orchestrator::with_external_client(config);

    let report = orchestrator.sequential(&[TestFixture::single_char()]).await;

    assert!(report.passed(), "{:?}", report);
    env.assert_clean();
}

#[tokio::test]
#[serial]
async fn test_broken_client_is_reported_and_cleaned_up() {
    let env = TestEnv::new(StandIn::Broken);
    let orchestrator = Orchestrator::with_external_client(env.config());

    let fixtures = [TestFixture::single_char(), TestFixture::control_chars()];
    let report = orchestrator.sequential(&fixtures).await;

    assert_eq!(report.status(), ScenarioStatus::Failed);
    assert!(report.aborted.is_none());
    assert_eq!(report.failed_invocations.len(), 4);
    for failed in &report.failed_invocations {
        assert_eq!(
            failed.status,
            InvocationStatus::ClientFailed { exit_code: Some(1) }
        );
    }
    assert_eq!(report.mismatches(), 4);
    env.assert_clean();
}

#[tokio::test]
#[serial]
async fn test_single_invocation_removes_its_control_script() {
    let env = TestEnv::new(StandIn::Overwrite);
    std::fs::write(env.client.path().join("afile.txt"), b"a").unwrap();
    let client = ExternalClient::from_config(&env.config());

    let report = client
        .invoke(&Invocation::new(Operation::Put, "afile.txt", TransferMode::Octet))
        .await;

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(env.client_files(), vec!["afile.txt".to_string()]);
    assert_eq!(env.server_files(), vec!["afile.txt".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_control_scripts_can_live_in_their_own_directory() {
    let env = TestEnv::new(StandIn::Overwrite);
    let control = tempfile::TempDir::new().unwrap();
    let mut config = env.config();
    config.directories.control_dir = Some(control.path().to_path_buf());
    let orchestrator = Orchestrator::new(config.clone(), Arc::new(ExternalClient::from_config(&config)));

    let report = orchestrator.sequential(&[TestFixture::line_endings()]).await;

    assert!(report.passed(), "{:?}", report);
    assert_eq!(std::fs::read_dir(control.path()).unwrap().count(), 0);
    env.assert_clean();
}

#[tokio::test]
#[serial]
async fn test_rerun_gives_same_verdict() {
    let env = TestEnv::new(StandIn::Overwrite);
    let orchestrator = Orchestrator::with_external_client(env.config());
    let fixtures = [TestFixture::line_endings(), TestFixture::non_ascii()];

    let first = orchestrator.sequential(&fixtures).await;
    let second = orchestrator.sequential(&fixtures).await;

    assert_eq!(first.status(), ScenarioStatus::Passed);
    assert_eq!(first.status(), second.status());
    env.assert_clean();
}
