//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require an upstream target and a well-formed oracle endpoint
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check that the request budget covers the oracle and upstream deadlines
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::ProxyConfig;
use crate::http::forward::parse_target;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `upstream.target_url`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be nonzero"));
    }
    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }

    match config.upstream.target_url.as_deref() {
        None => errors.push(ValidationError::new("upstream.target_url", "is required")),
        Some(raw) => {
            if let Err(e) = parse_target(raw) {
                errors.push(ValidationError::new("upstream.target_url", e.to_string()));
            }
        }
    }

    if let Err(e) = Url::parse(&config.oracle.endpoint) {
        errors.push(ValidationError::new(
            "oracle.endpoint",
            format!("invalid URL '{}': {}", config.oracle.endpoint, e),
        ));
    }
    if config.oracle.model.trim().is_empty() {
        errors.push(ValidationError::new("oracle.model", "must not be empty"));
    }
    if config.oracle.malicious_markers.iter().all(|m| m.is_empty()) {
        errors.push(ValidationError::new(
            "oracle.malicious_markers",
            "at least one non-empty marker is required",
        ));
    }
    if config.oracle.rationale_marker.is_empty() {
        errors.push(ValidationError::new("oracle.rationale_marker", "must not be empty"));
    }
    if !(0.0..=2.0).contains(&config.oracle.temperature) {
        errors.push(ValidationError::new("oracle.temperature", "must be within [0, 2]"));
    }

    for (field, secs) in [
        ("oracle.timeout_secs", config.oracle.timeout_secs),
        ("upstream.timeout_secs", config.upstream.timeout_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be nonzero"));
        }
    }

    let inner_budget = config
        .oracle
        .timeout_secs
        .saturating_add(config.upstream.timeout_secs);
    if config.timeouts.request_secs <= inner_budget {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!(
                "must exceed oracle.timeout_secs + upstream.timeout_secs ({}s)",
                inner_budget
            ),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be nonzero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
