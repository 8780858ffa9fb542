//! Round-trip verification
//!
//! Byte-exact comparison of the client-side and server-side copies of a
//! fixture. A mismatch is a result, not an error: it is logged at ERROR
//! level and handed back to the scenario, which records it and moves on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::metrics;

/// What differed between the two sides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchDetail {
    /// Size of the expected (client-side) file, `None` if unreadable
    pub expected_len: Option<usize>,
    /// Size of the actual (server-side) file, `None` if unreadable
    pub actual_len: Option<usize>,
    /// Offset of the first differing byte within the common prefix
    pub first_difference: Option<usize>,
    pub expected_sha256: Option<String>,
    pub actual_sha256: Option<String>,
    /// Read error when one side could not be read, or a netascii hint
    pub note: Option<String>,
}

/// Comparison outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Success,
    Mismatch(MismatchDetail),
}

/// Result of one comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub fixture_name: String,
    /// "Upload", "Download", or a scenario-specific label
    pub operation: String,
    pub outcome: ComparisonOutcome,
}

impl ComparisonResult {
    pub fn is_success(&self) -> bool {
        self.outcome == ComparisonOutcome::Success
    }
}

/// Compares client and server copies of the same file name
#[derive(Debug, Clone)]
pub struct RoundTripVerifier {
    client_dir: PathBuf,
    server_dir: PathBuf,
}

impl RoundTripVerifier {
    pub fn new(client_dir: impl Into<PathBuf>, server_dir: impl Into<PathBuf>) -> Self {
        Self {
            client_dir: client_dir.into(),
            server_dir: server_dir.into(),
        }
    }

    /// Compare `client_dir/<name>` against `server_dir/<name>`
    pub async fn compare(&self, fixture_name: &str, operation: &str) -> ComparisonResult {
        let expected = self.client_dir.join(fixture_name);
        let actual = self.server_dir.join(fixture_name);
        self.compare_paths(&expected, &actual, fixture_name, operation)
            .await
    }

    /// Compare two arbitrary files, reporting under `fixture_name`
    pub async fn compare_paths(
        &self,
        expected: &Path,
        actual: &Path,
        fixture_name: &str,
        operation: &str,
    ) -> ComparisonResult {
        let outcome = compare_files(expected, actual).await;

        match &outcome {
            ComparisonOutcome::Success => {
                info!(fixture = %fixture_name, "{} succeeded, filename = {}", operation, fixture_name);
            }
            ComparisonOutcome::Mismatch(detail) => {
                error!(
                    fixture = %fixture_name,
                    expected_len = ?detail.expected_len,
                    actual_len = ?detail.actual_len,
                    first_difference = ?detail.first_difference,
                    expected_sha256 = ?detail.expected_sha256,
                    actual_sha256 = ?detail.actual_sha256,
                    note = ?detail.note,
                    "{} failed, filename = {}",
                    operation,
                    fixture_name
                );
            }
        }
        metrics::record_comparison(operation, outcome == ComparisonOutcome::Success);

        ComparisonResult {
            fixture_name: fixture_name.to_string(),
            operation: operation.to_string(),
            outcome,
        }
    }
}

async fn compare_files(expected: &Path, actual: &Path) -> ComparisonOutcome {
    let (expected_bytes, actual_bytes) =
        tokio::join!(tokio::fs::read(expected), tokio::fs::read(actual));

    match (expected_bytes, actual_bytes) {
        (Ok(a), Ok(b)) if a == b => ComparisonOutcome::Success,
        (Ok(a), Ok(b)) => ComparisonOutcome::Mismatch(MismatchDetail {
            expected_len: Some(a.len()),
            actual_len: Some(b.len()),
            first_difference: first_difference(&a, &b),
            expected_sha256: Some(sha256_hex(&a)),
            actual_sha256: Some(sha256_hex(&b)),
            note: None,
        }),
        (a, b) => {
            let note = [
                a.as_ref().err().map(|e| format!("{}: {}", expected.display(), e)),
                b.as_ref().err().map(|e| format!("{}: {}", actual.display(), e)),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("; ");

            ComparisonOutcome::Mismatch(MismatchDetail {
                expected_len: a.as_ref().ok().map(Vec::len),
                actual_len: b.as_ref().ok().map(Vec::len),
                first_difference: None,
                expected_sha256: a.as_ref().ok().map(|d| sha256_hex(d)),
                actual_sha256: b.as_ref().ok().map(|d| sha256_hex(d)),
                note: Some(note),
            })
        }
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter().zip(b.iter()).position(|(x, y)| x != y)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
