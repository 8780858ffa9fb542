//! TFTP Conformance - round-trip and concurrency stress harness
//!
//! Drives an external TFTP client against a server under test and verifies
//! that every transferred byte survives.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tftp_conformance::{
    config::HarnessConfig,
    logging,
    metrics,
    scenario::{Orchestrator, RunSummary, ScenarioKind},
};
use tracing::info;

/// TFTP Conformance - round-trip and concurrency stress harness
#[derive(Parser, Debug)]
#[command(name = "tftp-conformance")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "harness.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print Prometheus metrics to stdout when the run ends
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    scenario: Option<ScenarioCommand>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ScenarioCommand {
    /// Upload then download every fixture, one at a time
    Sequential,
    /// Upload a large and a small fixture concurrently
    Dual,
    /// Upload one byte to the same name from many concurrent clients
    Parallel {
        /// Number of concurrent clients (defaults to scenarios.parallel_clients)
        #[arg(short = 'n', long)]
        clients: Option<usize>,
    },
    /// Run sequential, dual and parallel in order
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut config = HarnessConfig::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
        config.validate()?;
    }

    logging::init_subscriber(&config.logging)?;
    info!("Starting TFTP conformance harness v{}", tftp_conformance::VERSION);
    info!("Loaded configuration from {:?}", args.config);

    let default_clients = config.scenarios.parallel_clients;
    let orchestrator = Orchestrator::with_external_client(config);

    let summary = match args.scenario.unwrap_or(ScenarioCommand::All) {
        ScenarioCommand::All => orchestrator.run_all().await,
        ScenarioCommand::Sequential => single(&orchestrator, ScenarioKind::Sequential).await,
        ScenarioCommand::Dual => single(&orchestrator, ScenarioKind::DualClient).await,
        ScenarioCommand::Parallel { clients } => {
            let clients = clients.unwrap_or(default_clients);
            single(&orchestrator, ScenarioKind::IdenticalTarget { clients }).await
        }
    };

    if let Some(path) = args.report {
        std::fs::write(&path, serde_json::to_vec_pretty(&summary)?)?;
        info!("Wrote run summary to {:?}", path);
    }

    if args.print_metrics {
        print!("{}", metrics::render());
    }

    for report in &summary.reports {
        info!(
            scenario = report.scenario.name(),
            status = report.status().as_str(),
            mismatches = report.mismatches(),
            failed_invocations = report.failed_invocations.len(),
            "Scenario finished"
        );
    }

    Ok(if summary.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn single(orchestrator: &Orchestrator, kind: ScenarioKind) -> RunSummary {
    RunSummary {
        reports: vec![orchestrator.run(kind).await],
    }
}
