//! Shared integration test infrastructure
//!
//! Provides a stand-in for the external TFTP client: a POSIX shell script
//! that honours the control-script grammar and moves files between the
//! client directory (its working directory) and the server directory.
//! Only the server-side write policy is configurable.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tftp_conformance::config::HarnessConfig;

/// How the stand-in treats puts to an existing name
#[derive(Debug, Clone, Copy)]
pub enum StandIn {
    /// Concurrent puts append to the destination
    Append,
    /// Each put replaces the destination
    Overwrite,
    /// Every invocation exits with status 1
    Broken,
}

/// Temporary client/server/tool directories plus a stand-in client
pub struct TestEnv {
    pub client: TempDir,
    pub server: TempDir,
    tools: TempDir,
    binary: PathBuf,
}

impl TestEnv {
    pub fn new(kind: StandIn) -> Self {
        let client = TempDir::new().unwrap();
        let server = TempDir::new().unwrap();
        let tools = TempDir::new().unwrap();
        let binary = tools.path().join("fake-tftp");

        std::fs::write(&binary, script(server.path(), kind)).unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            client,
            server,
            tools,
            binary,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::with_directories(self.client.path(), self.server.path());
        config.client.binary = self.binary.display().to_string();
        config
    }

    /// Config file contents pointing at this environment
    pub fn yaml(&self, extra: &str) -> String {
        format!(
            "client:\n  binary: {}\ndirectories:\n  client_dir: {}\n  server_dir: {}\n{}",
            self.binary.display(),
            self.client.path().display(),
            self.server.path().display(),
            extra
        )
    }

    pub fn client_files(&self) -> Vec<String> {
        list(self.client.path())
    }

    pub fn server_files(&self) -> Vec<String> {
        list(self.server.path())
    }

    pub fn assert_clean(&self) {
        assert!(self.client_files().is_empty(), "client leftovers: {:?}", self.client_files());
        assert!(self.server_files().is_empty(), "server leftovers: {:?}", self.server_files());
    }
}

fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn script(server_dir: &Path, kind: StandIn) -> String {
    let put = match kind {
        StandIn::Append => r#"cat "$2" >> "$SERVER_DIR/$2" || exit 1"#,
        StandIn::Overwrite => r#"cp "$2" "$SERVER_DIR/$2" || exit 1"#,
        StandIn::Broken => "exit 1",
    };
    let get = match kind {
        StandIn::Broken => "exit 1",
        _ => r#"cp "$SERVER_DIR/$2" "$2" || exit 1"#,
    };

    format!(
        r#"#!/bin/sh
# Stand-in TFTP client: fake-tftp HOST PORT < control-script
[ "$#" -eq 2 ] || exit 2
SERVER_DIR='{server}'
mode=""
while IFS= read -r line || [ -n "$line" ]; do
  set -- $line
  case "$1" in
    verbose|trace) ;;
    mode)
      case "$2" in netascii|octet) mode="$2" ;; *) exit 3 ;; esac ;;
    put)
      [ -n "$mode" ] || exit 4
      {put} ;;
    get)
      [ -n "$mode" ] || exit 4
      {get} ;;
    quit) exit 0 ;;
    *) exit 5 ;;
  esac
done
exit 6
"#,
        server = server_dir.display(),
        put = put,
        get = get,
    )
}
