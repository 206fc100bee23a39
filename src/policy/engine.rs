//! Allow/block decisions.
//!
//! # Responsibilities
//! - Run extraction, body interpretation and oracle analysis in order
//! - Turn the single verdict into an allow/block decision with a message
//!
//! # Design Decisions
//! - Sole place a verdict becomes a decision; callers never re-derive it
//! - Every decision has a verdict behind it, even if only the fail-open default

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::request::Parts;

use crate::inspect::{ExtractError, InterpretedBody, RequestSnapshot};
use crate::observability::metrics;
use crate::oracle::{Analyzer, OracleVerdict};

/// Message attached to allowed requests.
pub const ALLOWED_MESSAGE: &str = "Request allowed";

/// Outcome of policy evaluation for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub message: String,
    pub verdict: OracleVerdict,
}

impl Decision {
    pub fn from_verdict(verdict: OracleVerdict) -> Self {
        let (allowed, message) = if verdict.is_malicious {
            (false, format!("Potential security threat: {}", verdict.rationale))
        } else {
            (true, ALLOWED_MESSAGE.to_string())
        };
        Self {
            allowed,
            message,
            verdict,
        }
    }
}

/// Orchestrates the inspection pipeline.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    analyzer: Analyzer,
    max_body_size: usize,
}

impl PolicyEngine {
    pub fn new(analyzer: Analyzer, max_body_size: usize) -> Self {
        Self {
            analyzer,
            max_body_size,
        }
    }

    /// Capture the raw request and decide on it.
    ///
    /// The snapshot is returned alongside the decision because it owns the
    /// only copy of the body.
    pub async fn inspect(
        &self,
        parts: &Parts,
        body: Body,
        client: SocketAddr,
    ) -> Result<(RequestSnapshot, Decision), ExtractError> {
        let snapshot = RequestSnapshot::extract(parts, body, client, self.max_body_size).await?;
        let decision = self.decide(&snapshot).await;
        Ok((snapshot, decision))
    }

    pub async fn decide(&self, snapshot: &RequestSnapshot) -> Decision {
        tracing::info!(
            method = %snapshot.method(),
            path = %snapshot.path(),
            client_ip = %snapshot.client_ip(),
            "Analyzing request"
        );

        let body = InterpretedBody::interpret(snapshot.body_text());
        let verdict = self.analyzer.analyze(snapshot, &body).await;
        metrics::record_verdict(verdict.is_malicious);

        Decision::from_verdict(verdict)
    }
}
