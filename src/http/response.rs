//! Synthetic responses.
//!
//! # Responsibilities
//! - Fixed 403 page for blocked requests
//! - 500 when no upstream target is configured
//! - Map extraction and forwarding errors to bounded per-request statuses
//!
//! # Design Decisions
//! - The rejection body never echoes the rationale back to the client
//! - Forwarding failures carry the error text; timeouts map to 504

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::forward::ForwardError;
use crate::inspect::ExtractError;

/// Body sent with every blocked request.
pub const FORBIDDEN_BODY: &str = "
<html>
<head><title>403 Forbidden</title></head>
<body>
<h1>Forbidden</h1>
<p>The request was blocked by the web application firewall.</p>
</body>
</html>
";

/// Body sent when no upstream target is configured.
pub const MISCONFIGURED_BODY: &str = "WAF misconfiguration: No target URL specified";

fn html(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/html")], body).into_response()
}

/// 403 rejection for a blocked request.
pub fn forbidden() -> Response {
    html(StatusCode::FORBIDDEN, FORBIDDEN_BODY.to_string())
}

/// 500 for a server started without an upstream target.
pub fn misconfigured() -> Response {
    html(StatusCode::INTERNAL_SERVER_ERROR, MISCONFIGURED_BODY.to_string())
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        html(self.status(), format!("Error forwarding request: {}", self))
    }
}

impl ExtractError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExtractError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ExtractError::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
