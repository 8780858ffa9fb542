//! TFTP Conformance Harness Library
//!
//! Round-trip and concurrency stress harness for TFTP servers. The harness
//! never speaks the protocol itself: it drives an external client binary
//! (tftp-hpa compatible) and checks the files that land on either side.
//!
//! # Features
//!
//! - **Edge-case fixtures**: alternating CR/LF, control bytes, full-range
//!   random bytes and multi-megabyte payloads
//! - **Byte-exact verification**: client copy against server copy, after
//!   both upload and download
//! - **Concurrency stress**: two simultaneous uploads of different sizes,
//!   and N clients writing the same file name at once
//! - **Re-runnable**: every scenario purges residue and cleans up after itself
//!
//! # Example
//!
//! ```no_run
//! use tftp_conformance::{config::HarnessConfig, scenario::Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarnessConfig::load("harness.yaml")?;
//!     let orchestrator = Orchestrator::with_external_client(config);
//!     let summary = orchestrator.run_all().await;
//!     std::process::exit(if summary.passed() { 0 } else { 1 });
//! }
//! ```

pub mod config;
pub mod fixture;
pub mod invoker;
pub mod logging;
pub mod metrics;
pub mod scenario;
pub mod verify;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use scenario::Orchestrator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
