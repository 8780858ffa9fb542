//! Configuration module for the TFTP conformance harness
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. The resulting
//! [`HarnessConfig`] is immutable and shared by every scenario.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::invoker::{InvokeOptions, TransferMode};

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with an uppercase letter or underscore and
/// contain only uppercase letters, digits, and underscores.
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("CLIENT_ROOT", "/srv/tftp-client");
/// let result = expand_env_vars("${CLIENT_ROOT}/in");
/// assert_eq!(result, "/srv/tftp-client/in");
///
/// let result = expand_env_vars("${MISSING:-4567}");
/// assert_eq!(result, "4567");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: ServerEndpoint,
    pub directories: DirectoryConfig,
    #[serde(default)]
    pub scenarios: ScenarioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HarnessConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Build a configuration with defaults for everything except the two
    /// directory roots.
    pub fn with_directories(client_dir: impl Into<PathBuf>, server_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: ClientConfig::default(),
            server: ServerEndpoint::default(),
            directories: DirectoryConfig {
                client_dir: client_dir.into(),
                server_dir: server_dir.into(),
                control_dir: None,
            },
            scenarios: ScenarioConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.binary.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Client binary cannot be empty".into(),
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Server host cannot be empty".into(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be non-zero".into(),
            ));
        }

        if self.directories.client_dir.as_os_str().is_empty()
            || self.directories.server_dir.as_os_str().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "Both client_dir and server_dir must be set".into(),
            ));
        }

        if self.directories.client_dir == self.directories.server_dir {
            return Err(ConfigError::ValidationError(format!(
                "client_dir and server_dir must differ (both are {})",
                self.directories.client_dir.display()
            )));
        }

        if self.scenarios.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrency must be at least 1".into(),
            ));
        }

        if self.scenarios.parallel_clients == 0 {
            return Err(ConfigError::ValidationError(
                "parallel_clients must be at least 1".into(),
            ));
        }

        if let Some(ref names) = self.scenarios.fixtures {
            for name in names {
                if crate::fixture::TestFixture::by_name(name).is_none() {
                    return Err(ConfigError::ValidationError(format!(
                        "Unknown fixture '{}'",
                        name
                    )));
                }
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level '{}': must be trace, debug, info, warn or error",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Options passed to every client invocation
    pub fn invoke_options(&self) -> InvokeOptions {
        InvokeOptions {
            verbose: self.client.verbose,
            trace: self.client.trace,
        }
    }
}

/// External client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client executable, resolved through `PATH` when not absolute.
    /// Default: "tftp" (tftp-hpa)
    #[serde(default = "default_client_binary")]
    pub binary: String,
    /// Emit `verbose` in every control script
    #[serde(default)]
    pub verbose: bool,
    /// Emit `trace` in every control script
    #[serde(default)]
    pub trace: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary: default_client_binary(),
            verbose: false,
            trace: false,
        }
    }
}

fn default_client_binary() -> String {
    "tftp".to_string()
}

/// Server endpoint the client is told to contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEndpoint {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerEndpoint {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    4567
}

/// Filesystem roots visible to the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Working directory of the client; fixtures are written here.
    pub client_dir: PathBuf,
    /// Server storage root, read directly for verification.
    pub server_dir: PathBuf,
    /// Where control scripts live. Defaults to `client_dir`.
    #[serde(default)]
    pub control_dir: Option<PathBuf>,
}

impl DirectoryConfig {
    pub fn control_dir(&self) -> &Path {
        self.control_dir.as_deref().unwrap_or(&self.client_dir)
    }
}

/// How the transfer mode is picked for each invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSelection {
    /// Uniformly random per invocation
    #[default]
    Random,
    Netascii,
    Octet,
}

impl ModeSelection {
    /// Resolve to a concrete mode, drawing from the thread RNG when random
    pub fn pick(self) -> TransferMode {
        match self {
            ModeSelection::Random => {
                if rand::random::<bool>() {
                    TransferMode::Netascii
                } else {
                    TransferMode::Octet
                }
            }
            ModeSelection::Netascii => TransferMode::Netascii,
            ModeSelection::Octet => TransferMode::Octet,
        }
    }
}

/// What the server is expected to do with N concurrent writes to one name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteConflictPolicy {
    /// Every write is appended: result is N copies of the payload
    #[default]
    Append,
    /// Writes replace each other: result is one copy of the payload
    LastWriterWins,
}

impl WriteConflictPolicy {
    /// Number of payload repetitions expected after `writers` uploads
    pub fn expected_repetitions(self, writers: usize) -> usize {
        match self {
            WriteConflictPolicy::Append => writers,
            WriteConflictPolicy::LastWriterWins => writers.min(1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WriteConflictPolicy::Append => "append",
            WriteConflictPolicy::LastWriterWins => "last_writer_wins",
        }
    }
}

/// Scenario tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Upper bound on client processes alive at once. Default: 64
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Writers in the identical-target scenario. Default: 150
    #[serde(default = "default_parallel_clients")]
    pub parallel_clients: usize,
    #[serde(default)]
    pub write_conflict_policy: WriteConflictPolicy,
    #[serde(default)]
    pub mode: ModeSelection,
    /// Restrict the sequential scenario to these catalog fixtures
    #[serde(default)]
    pub fixtures: Option<Vec<String>>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            parallel_clients: default_parallel_clients(),
            write_conflict_policy: WriteConflictPolicy::default(),
            mode: ModeSelection::default(),
            fixtures: None,
        }
    }
}

fn default_max_concurrency() -> usize {
    64
}

fn default_parallel_clients() -> usize {
    150
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset. Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn test_config() -> HarnessConfig {
        HarnessConfig::with_directories("/tmp/tftp-client", "/tmp/tftp-server")
    }

    #[test]
    fn test_defaults_match_reference_setup() {
        let config = test_config();
        assert_eq!(config.client.binary, "tftp");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4567);
        assert_eq!(config.scenarios.parallel_clients, 150);
        assert_eq!(config.scenarios.write_conflict_policy, WriteConflictPolicy::Append);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_control_dir_defaults_to_client_dir() {
        let mut config = test_config();
        assert_eq!(config.directories.control_dir(), Path::new("/tmp/tftp-client"));

        config.directories.control_dir = Some("/tmp/ctl".into());
        assert_eq!(config.directories.control_dir(), Path::new("/tmp/ctl"));
    }

    #[test]
    fn test_validation_rejects_same_directories() {
        let config = HarnessConfig::with_directories("/tmp/same", "/tmp/same");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = test_config();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let mut config = test_config();
        config.scenarios.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_fixture() {
        let mut config = test_config();
        config.scenarios.fixtures = Some(vec!["file1.txt".into(), "nope.bin".into()]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("nope.bin"));
    }

    #[test]
    fn test_expected_repetitions() {
        assert_eq!(WriteConflictPolicy::Append.expected_repetitions(150), 150);
        assert_eq!(WriteConflictPolicy::LastWriterWins.expected_repetitions(150), 1);
        assert_eq!(WriteConflictPolicy::LastWriterWins.expected_repetitions(0), 0);
    }

    #[test]
    fn test_fixed_mode_selection() {
        assert_eq!(ModeSelection::Octet.pick(), TransferMode::Octet);
        assert_eq!(ModeSelection::Netascii.pick(), TransferMode::Netascii);
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("TFTP_TEST_UNSET_PORT");
        assert_eq!(expand_env_vars("port: ${TFTP_TEST_UNSET_PORT:-6969}"), "port: 6969");
        assert_eq!(expand_env_vars("x: ${TFTP_TEST_UNSET_PORT}"), "x: ${TFTP_TEST_UNSET_PORT}");
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_set() {
        std::env::set_var("TFTP_TEST_ROOT", "/srv/tftp");
        assert_eq!(expand_env_vars("${TFTP_TEST_ROOT}/client"), "/srv/tftp/client");
        std::env::remove_var("TFTP_TEST_ROOT");
    }
}
