//! Configuration loader with environment variable expansion

use super::{expand_env_vars, ConfigError, HarnessConfig};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<HarnessConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<HarnessConfig, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: HarnessConfig = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModeSelection, WriteConflictPolicy};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_load_expands_env_vars() {
        std::env::set_var("TFTP_LOADER_SERVER_DIR", "/srv/tftp");
        let yaml = r#"
directories:
  client_dir: /tmp/client
  server_dir: ${TFTP_LOADER_SERVER_DIR}
"#;
        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.directories.server_dir, Path::new("/srv/tftp"));
        std::env::remove_var("TFTP_LOADER_SERVER_DIR");
    }

    #[test]
    fn test_load_full_document() {
        let yaml = r#"
client:
  binary: /usr/bin/tftp
  verbose: true
server:
  host: 10.0.0.5
  port: 6969
directories:
  client_dir: /tmp/client
  server_dir: /tmp/server
  control_dir: /tmp/control
scenarios:
  max_concurrency: 8
  parallel_clients: 20
  write_conflict_policy: last_writer_wins
  mode: octet
  fixtures: [file1.txt, ctrl_file.bin]
logging:
  level: debug
  format: json
"#;
        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.client.binary, "/usr/bin/tftp");
        assert!(config.client.verbose);
        assert!(!config.client.trace);
        assert_eq!(config.server.port, 6969);
        assert_eq!(config.scenarios.max_concurrency, 8);
        assert_eq!(
            config.scenarios.write_conflict_policy,
            WriteConflictPolicy::LastWriterWins
        );
        assert_eq!(config.scenarios.mode, ModeSelection::Octet);
        assert_eq!(config.scenarios.fixtures.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_load_rejects_missing_directories() {
        let yaml = "server:\n  port: 69\n";
        assert!(matches!(
            ConfigLoader::from_yaml(yaml),
            Err(ConfigError::ParseError(_))
        ));
    }
}
