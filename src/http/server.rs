//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the single inspection handler
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Bind server to listener with peer addresses available
//! - Gate every request on a policy decision
//! - Forward allowed requests to the upstream, reject the rest

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{util::MapRequestLayer, ServiceBuilder};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::response;
use crate::lifecycle::shutdown;
use crate::observability::metrics::{self, Outcome};
use crate::oracle::{Analyzer, HttpOracle, Oracle, OracleError, PromptBuilder, VerdictParser};
use crate::policy::PolicyEngine;

const REQUEST_ID: &str = "x-request-id";

/// Marks requests whose `x-request-id` was minted here rather than sent by the client.
#[derive(Debug, Clone, Copy)]
struct GeneratedRequestId;

fn mark_generated_id(mut request: Request<Body>) -> Request<Body> {
    if !request.headers().contains_key(REQUEST_ID) {
        request.extensions_mut().insert(GeneratedRequestId);
    }
    request
}

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid rationale marker: {0}")]
    Marker(#[from] regex::Error),

    #[error("failed to build oracle client: {0}")]
    Oracle(#[from] OracleError),

    #[error("invalid upstream target: {0}")]
    Upstream(#[from] ForwardError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PolicyEngine>,
    /// `None` when no target URL is configured.
    pub forwarder: Option<Forwarder>,
}

/// HTTP server for the WAF proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a server that consults the configured HTTP oracle.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let oracle = Arc::new(HttpOracle::new(&config.oracle)?);
        Self::with_oracle(config, oracle)
    }

    /// Create a server around any oracle implementation.
    pub fn with_oracle(config: ProxyConfig, oracle: Arc<dyn Oracle>) -> Result<Self, ServerError> {
        let analyzer = Analyzer::new(
            oracle,
            PromptBuilder::new(config.oracle.prompt_mode),
            VerdictParser::from_config(&config.oracle)?,
        );
        let engine = Arc::new(PolicyEngine::new(analyzer, config.security.max_body_size));

        let forwarder = match config.upstream.target_url.as_deref() {
            Some(target) => Some(Forwarder::new(
                target,
                Duration::from_secs(config.timeouts.connect_secs),
                Duration::from_secs(config.upstream.timeout_secs),
            )?),
            None => {
                tracing::warn!("No upstream target configured, requests will be answered with 500");
                None
            }
        };

        let state = AppState { engine, forwarder };
        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config: Arc::new(config),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(REQUEST_ID);

        Router::new()
            .route("/{*path}", any(waf_handler))
            .route("/", any(waf_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(MapRequestLayer::new(mark_generated_id))
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get(REQUEST_ID)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            request_id = %request_id,
                            method = %request.method(),
                            uri = %request.uri(),
                        )
                    }))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = ?self.config.upstream.target_url,
            oracle = %self.config.oracle.endpoint,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Inspect, decide, then forward or reject.
async fn waf_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let Some(forwarder) = state.forwarder.as_ref() else {
        tracing::error!(method = %method, path = %request.uri().path(), "No upstream target configured");
        metrics::record_request(method.as_str(), 500, Outcome::Misconfigured, start);
        return response::misconfigured();
    };

    let (mut parts, body) = request.into_parts();

    // A minted id differs on every request and would make prompts non-repeatable.
    let minted_id = match parts.extensions.get::<GeneratedRequestId>() {
        Some(_) => parts.headers.remove(REQUEST_ID),
        None => None,
    };
    let inspected = state.engine.inspect(&parts, body, client).await;
    restore_request_id(&mut parts, minted_id);

    let (snapshot, decision) = match inspected {
        Ok(inspected) => inspected,
        Err(e) => {
            tracing::warn!(client_ip = %client.ip(), error = %e, "Request could not be captured");
            let response = e.into_response();
            metrics::record_request(method.as_str(), response.status().as_u16(), Outcome::Rejected, start);
            return response;
        }
    };

    if !decision.allowed {
        tracing::warn!(
            client_ip = %snapshot.client_ip(),
            path = %snapshot.path(),
            message = %decision.message,
            "Request blocked"
        );
        metrics::record_request(method.as_str(), 403, Outcome::Blocked, start);
        return response::forbidden();
    }

    match forwarder
        .forward(&parts.method, &parts.uri, &parts.headers, snapshot.body().clone())
        .await
    {
        Ok(response) => {
            tracing::debug!(status = %response.status(), "Upstream responded");
            metrics::record_request(method.as_str(), response.status().as_u16(), Outcome::Forwarded, start);
            response
        }
        Err(e) => {
            tracing::error!(upstream = %forwarder.target(), error = %e, "Error forwarding request");
            let response = e.into_response();
            metrics::record_request(method.as_str(), response.status().as_u16(), Outcome::UpstreamError, start);
            response
        }
    }
}

fn restore_request_id(parts: &mut axum::http::request::Parts, id: Option<HeaderValue>) {
    if let Some(id) = id {
        parts.headers.insert(HeaderName::from_static(REQUEST_ID), id);
    }
}
