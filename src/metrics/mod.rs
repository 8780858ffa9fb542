//! Metrics module
//!
//! Prometheus counters for invocations, comparisons and scenarios. The
//! harness is a batch job, so metrics are rendered once at the end of a run
//! instead of being scraped.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    // Invocation metrics
    pub static ref INVOCATIONS_TOTAL: CounterVec = register_counter_vec!(
        "tftp_invocations_total",
        "Total client invocations",
        &["operation", "status"]
    ).unwrap();

    pub static ref INVOCATION_DURATION: HistogramVec = register_histogram_vec!(
        "tftp_invocation_duration_seconds",
        "Client process lifetime in seconds",
        &["operation"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 120.0]
    ).unwrap();

    // Comparison metrics
    pub static ref COMPARISONS_TOTAL: CounterVec = register_counter_vec!(
        "tftp_comparisons_total",
        "Round-trip comparisons",
        &["operation", "outcome"]
    ).unwrap();

    // Scenario metrics
    pub static ref SCENARIOS_TOTAL: CounterVec = register_counter_vec!(
        "tftp_scenarios_total",
        "Scenario runs",
        &["scenario", "status"]
    ).unwrap();
}

/// Record a finished invocation
pub fn record_invocation(operation: &str, status: &str, duration: Duration) {
    INVOCATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    INVOCATION_DURATION
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a comparison outcome
pub fn record_comparison(operation: &str, matched: bool) {
    let outcome = if matched { "success" } else { "mismatch" };
    COMPARISONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record a finished scenario
pub fn record_scenario(scenario: &str, status: &str) {
    SCENARIOS_TOTAL.with_label_values(&[scenario, status]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
