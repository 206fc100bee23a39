//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rebuild the inbound request against `target_url + path?query`
//! - Replay method, headers and the cached body
//! - Relay the upstream response (status, headers, body) untouched
//!
//! # Design Decisions
//! - One upstream, no retries, no health checks
//! - Hop-by-hop request headers are not replayed; response headers are
//! - The upstream timeout covers the whole exchange; responses are buffered
//!   before they are relayed

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, Method, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

/// Connection-scoped headers that never travel to the upstream.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Errors that can occur while forwarding.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    ResponseBody(axum::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Replays allowed requests against the configured origin.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    target: String,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder for an absolute `http://` base URL.
    pub fn new(target_url: &str, connect_timeout: Duration, timeout: Duration) -> Result<Self, ForwardError> {
        parse_target(target_url)?;
        let target = target_url.trim_end_matches('/').to_string();

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            target,
            timeout,
        })
    }

    /// Base URL with any trailing `/` removed.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Map an inbound URI onto the upstream, keeping path and query.
    pub fn upstream_uri(&self, original: &Uri) -> Result<Uri, ForwardError> {
        let path_and_query = original.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let joined = format!("{}{}", self.target, path_and_query);
        joined
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| ForwardError::InvalidUri {
                uri: joined.clone(),
                reason: e.to_string(),
            })
    }

    pub async fn forward(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response<Body>, ForwardError> {
        let upstream = self.upstream_uri(uri)?;

        let mut builder = Request::builder().method(method.clone()).uri(upstream.clone());
        if let Some(outbound) = builder.headers_mut() {
            for (name, value) in headers {
                if !is_hop_by_hop(name) {
                    outbound.append(name.clone(), value.clone());
                }
            }
        }
        let request = builder.body(Body::from(body))?;

        tracing::debug!(method = %method, upstream = %upstream, "Forwarding request");

        // Headers and body share one deadline; a stalled body must not pin the worker.
        let exchange = async {
            let response: Response<Incoming> = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), usize::MAX)
                .await
                .map_err(ForwardError::ResponseBody)?;
            Ok::<_, ForwardError>(Response::from_parts(parts, Body::from(bytes)))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))?
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parse an upstream base URL the way requests will be built against it.
///
/// Only `http://host[:port][/prefix]` is accepted; the inbound path and query
/// are appended verbatim, so the base carries neither query nor fragment.
pub fn parse_target(target_url: &str) -> Result<Uri, ForwardError> {
    let invalid = |reason: String| ForwardError::InvalidUri {
        uri: target_url.to_string(),
        reason,
    };

    if target_url.contains(['?', '#']) {
        return Err(invalid("query and fragment are not allowed".to_string()));
    }
    let uri: Uri = target_url
        .trim_end_matches('/')
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;
    match uri.scheme_str() {
        Some("http") if uri.authority().is_some() => Ok(uri),
        Some(other) if uri.authority().is_some() => Err(invalid(format!(
            "unsupported scheme '{}' (only http is forwarded)",
            other
        ))),
        _ => Err(invalid("expected an absolute http:// URL".to_string())),
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}
