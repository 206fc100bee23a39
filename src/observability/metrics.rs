//! Metrics collection and exposition.
//!
//! # Metrics
//! - `waf_requests_total` (counter): requests by method, status, outcome
//! - `waf_request_duration_seconds` (histogram): latency by outcome
//! - `waf_verdicts_total` (counter): oracle verdicts, malicious or benign
//! - `waf_oracle_failures_total` (counter): degraded oracle calls by kind
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests, disabled metrics)
//! - Prometheus exposition runs on its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// What happened to a request, for labelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    Blocked,
    Misconfigured,
    Rejected,
    UpstreamError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Forwarded => "forwarded",
            Outcome::Blocked => "blocked",
            Outcome::Misconfigured => "misconfigured",
            Outcome::Rejected => "rejected",
            Outcome::UpstreamError => "upstream_error",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, outcome: Outcome, start: Instant) {
    counter!(
        "waf_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("waf_request_duration_seconds", "outcome" => outcome.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_verdict(is_malicious: bool) {
    let verdict = if is_malicious { "malicious" } else { "benign" };
    counter!("waf_verdicts_total", "verdict" => verdict).increment(1);
}

pub fn record_oracle_failure(kind: &'static str) {
    counter!("waf_oracle_failures_total", "kind" => kind).increment(1);
}
