//! Transfer invoker
//!
//! Runs exactly one upload or download through the external TFTP client.
//! The client is launched with `(host, port)` as positional arguments, reads
//! a control script on stdin and reports back through its exit status only.
//!
//! A failing client is never an error for the caller: every invocation
//! yields an [`InvocationReport`] and the scenario carries on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::HarnessConfig;
use crate::metrics;

pub mod control_script;

pub use control_script::ControlScript;

/// Invocation errors
///
/// These never escape [`TransferClient::invoke`]; they are folded into the
/// report as [`InvocationStatus::LaunchFailed`].
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Failed to create control script {path}: {source}")]
    ControlScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open control script: {0}")]
    OpenScript(#[source] std::io::Error),

    #[error("Failed to launch client '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// TFTP transfer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Text mode, line endings may be translated in transit
    Netascii,
    /// Binary mode, bytes pass untouched
    Octet,
}

impl TransferMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferMode::Netascii => "netascii",
            TransferMode::Octet => "octet",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Put,
    Get,
}

impl Operation {
    /// Client command word
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Put => "put",
            Operation::Get => "get",
        }
    }

    /// Human label used in comparison reports
    pub fn label(self) -> &'static str {
        match self {
            Operation::Put => "Upload",
            Operation::Get => "Download",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side diagnostics switched on in the control script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeOptions {
    pub verbose: bool,
    pub trace: bool,
}

/// One put or get of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub operation: Operation,
    pub fixture_name: String,
    pub mode: TransferMode,
    /// Unique among concurrently running invocations
    pub isolation_key: String,
    #[serde(default)]
    pub options: InvokeOptions,
    /// Announce the transfer at DEBUG instead of INFO
    #[serde(default)]
    pub quiet: bool,
}

impl Invocation {
    /// Create an invocation with a fresh isolation key
    pub fn new(operation: Operation, fixture_name: impl Into<String>, mode: TransferMode) -> Self {
        Self {
            operation,
            fixture_name: fixture_name.into(),
            mode,
            isolation_key: uuid::Uuid::new_v4().simple().to_string(),
            options: InvokeOptions::default(),
            quiet: false,
        }
    }

    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    /// Keep the transfer line out of INFO output, for runs with many clients
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Prefix the isolation key with a worker label for readable file names
    pub fn labelled(mut self, label: &str) -> Self {
        self.isolation_key = format!("{}-{}", label, self.isolation_key);
        self
    }
}

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationStatus {
    /// Client exited with status 0
    Completed,
    /// Client exited non-zero, or was killed by a signal (`exit_code: None`)
    ClientFailed { exit_code: Option<i32> },
    /// The client never ran
    LaunchFailed { reason: String },
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Completed => "completed",
            InvocationStatus::ClientFailed { .. } => "client_failed",
            InvocationStatus::LaunchFailed { .. } => "launch_failed",
        }
    }
}

/// Report of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationReport {
    pub invocation: Invocation,
    pub status: InvocationStatus,
    pub duration: Duration,
}

impl InvocationReport {
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Completed
    }
}

/// Transfer client trait
///
/// The call resolves only once the transfer has finished; there is no
/// concurrency inside a single invocation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Run one invocation to completion
    async fn invoke(&self, invocation: &Invocation) -> InvocationReport;
}

/// Client that shells out to a TFTP client binary (tftp-hpa compatible)
#[derive(Debug, Clone)]
pub struct ExternalClient {
    binary: String,
    host: String,
    port: u16,
    working_dir: PathBuf,
    control_dir: PathBuf,
}

impl ExternalClient {
    /// Create a client from the harness configuration
    ///
    /// The client process runs inside `client_dir`, so `put` reads and `get`
    /// writes fixtures there.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            binary: config.client.binary.clone(),
            host: config.server.host.clone(),
            port: config.server.port,
            working_dir: config.directories.client_dir.clone(),
            control_dir: config.directories.control_dir().to_path_buf(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, invocation: &Invocation) -> Result<InvocationStatus, InvokeError> {
        let script = ControlScript::create(&self.control_dir, invocation)?;
        let stdin = script.open().map_err(InvokeError::OpenScript)?;

        let status = Command::new(&self.binary)
            .arg(&self.host)
            .arg(self.port.to_string())
            .current_dir(&self.working_dir)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| InvokeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        drop(script);

        if status.success() {
            Ok(InvocationStatus::Completed)
        } else {
            Ok(InvocationStatus::ClientFailed {
                exit_code: status.code(),
            })
        }
    }
}

#[async_trait]
impl TransferClient for ExternalClient {
    #[tracing::instrument(
        name = "transfer.invoke",
        skip(self, invocation),
        fields(
            operation = %invocation.operation,
            fixture = %invocation.fixture_name,
            mode = %invocation.mode,
            isolation_key = %invocation.isolation_key,
        )
    )]
    async fn invoke(&self, invocation: &Invocation) -> InvocationReport {
        if invocation.quiet {
            debug!("{} {}({})", invocation.operation, invocation.fixture_name, invocation.mode);
        } else {
            info!("{} {}({})", invocation.operation, invocation.fixture_name, invocation.mode);
        }
        let start = Instant::now();

        let status = match self.run(invocation).await {
            Ok(status) => status,
            Err(e) => InvocationStatus::LaunchFailed {
                reason: e.to_string(),
            },
        };
        let duration = start.elapsed();

        match &status {
            InvocationStatus::Completed => {
                debug!(elapsed_ms = duration.as_millis() as u64, "Transfer client finished");
            }
            InvocationStatus::ClientFailed { exit_code } => {
                error!(exit_code = ?exit_code, binary = %self.binary, "Transfer client failed");
            }
            InvocationStatus::LaunchFailed { reason } => {
                error!(%reason, binary = %self.binary, "Transfer client could not be launched");
            }
        }

        metrics::record_invocation(invocation.operation.as_str(), status.as_str(), duration);

        InvocationReport {
            invocation: invocation.clone(),
            status,
            duration,
        }
    }
}
