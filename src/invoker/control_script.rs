//! Ephemeral control scripts fed to the external client
//!
//! One script exists per invocation, named after the invocation's isolation
//! key and created exclusively, so two concurrent invocations can never
//! share a file. The script is removed when dropped (RAII pattern), which
//! covers the paths where the client failed or never launched.
//!
//! # Grammar
//!
//! ```text
//! [verbose]
//! [trace]
//! mode {netascii|octet}
//! {put|get} <filename>
//! quit
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{InvokeError, Invocation};

/// File name prefix of every control script
pub const CONTROL_SCRIPT_PREFIX: &str = "cmd_file.";

/// Control script on disk
///
/// Automatically deleted when dropped.
#[derive(Debug)]
pub struct ControlScript {
    path: PathBuf,
}

impl ControlScript {
    /// Render the script text for one invocation
    pub fn render(invocation: &Invocation) -> String {
        let options = &invocation.options;
        let mut script = String::new();
        if options.verbose {
            script.push_str("verbose\n");
        }
        if options.trace {
            script.push_str("trace\n");
        }
        script.push_str(&format!("mode {}\n", invocation.mode));
        script.push_str(&format!(
            "{} {}\n",
            invocation.operation, invocation.fixture_name
        ));
        script.push_str("quit\n");
        script
    }

    /// Path of the script for `isolation_key` under `dir`
    pub fn path_for(dir: &Path, isolation_key: &str) -> PathBuf {
        dir.join(format!("{}{}", CONTROL_SCRIPT_PREFIX, isolation_key))
    }

    /// Write the script for `invocation` into `dir`.
    ///
    /// Fails with [`InvokeError::ControlScript`] if a file with the same
    /// isolation key already exists.
    pub fn create(dir: &Path, invocation: &Invocation) -> Result<Self, InvokeError> {
        let path = Self::path_for(dir, &invocation.isolation_key);
        let contents = Self::render(invocation);

        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
            file.write_all(contents.as_bytes())?;
            file.flush()
        };

        match write() {
            Ok(()) => Ok(Self { path }),
            Err(source) => {
                // Only remove what this call created
                if source.kind() != io::ErrorKind::AlreadyExists {
                    let _ = std::fs::remove_file(&path);
                }
                Err(InvokeError::ControlScript { path, source })
            }
        }
    }

    /// Get the path to the script
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the script for reading, to be handed to the client as stdin
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

impl Drop for ControlScript {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove control script"
                );
            }
        }
    }
}
