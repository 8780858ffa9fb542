//! Tracing subscriber setup
//!
//! Layers an `EnvFilter` (RUST_LOG, falling back to the configured level)
//! over a fmt layer. Events at WARN and above are written to stderr and the
//! rest to stdout, so a wrapping test runner can tell passing output from
//! failures without parsing log levels.
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG or logging.level)
//!   └── Fmt Layer (text or JSON)
//!         ├── WARN, ERROR  -> stderr
//!         └── INFO and below -> stdout
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Errors that can occur during subscriber initialization
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}'")]
    InvalidFilter(String),

    #[error("Failed to set global subscriber (may already be initialized): {0}")]
    AlreadyInitialized(String),
}

fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|_| LoggingError::InvalidFilter(level.into())),
    }
}

/// Install the global subscriber
///
/// # Example
///
/// ```no_run
/// use tftp_conformance::config::LoggingConfig;
/// use tftp_conformance::logging::init_subscriber;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// init_subscriber(&LoggingConfig::default())?;
/// tracing::info!("Upload succeeded, filename = file1.txt");
/// # Ok(())
/// # }
/// ```
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = env_filter(&config.level)?;
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(writer);

            let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(writer);

            let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        }
    }

    Ok(())
}
