//! Oracle client with timeout and error handling.
//!
//! # Responsibilities
//! - Send decision prompts to the generate endpoint
//! - Bound every call with a hard deadline and bounded generation options
//! - Recover the answer from slightly malformed payloads
//! - Turn every failure into a text answer; nothing propagates past `query`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OracleConfig;
use crate::observability::metrics;

/// Answer returned when the oracle does not reply in time.
pub const TIMEOUT_ANSWER: &str = "Analysis timed out - allowing request by default";
/// Answer returned for a non-success HTTP status.
pub const STATUS_ANSWER: &str = "Error connecting to oracle";
/// Answer returned when no response field can be recovered.
pub const MALFORMED_ANSWER: &str = "Error parsing oracle response";
/// Answer returned for connection or protocol failures.
pub const TRANSPORT_ANSWER: &str = "Error processing request";

/// A free-text answering service. Implementations must not fail: every
/// problem is expressed as answer text the verdict parser can read.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn query(&self, prompt: &str) -> String;
}

/// Errors that can occur while calling the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle returned status {0}")]
    Status(StatusCode),

    #[error("oracle payload malformed: {0}")]
    Malformed(String),

    #[error("oracle transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl OracleError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Timeout(_) => "timeout",
            OracleError::Status(_) => "status",
            OracleError::Malformed(_) => "malformed",
            OracleError::Transport(_) => "transport",
        }
    }

    /// Sentinel answer handed to the verdict parser in place of a real one.
    pub fn fallback_answer(&self) -> &'static str {
        match self {
            OracleError::Timeout(_) => TIMEOUT_ANSWER,
            OracleError::Status(_) => STATUS_ANSWER,
            OracleError::Malformed(_) => MALFORMED_ANSWER,
            OracleError::Transport(_) => TRANSPORT_ANSWER,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    num_ctx: u32,
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: &'a GenerateOptions,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Oracle reached over HTTP at a generate-style endpoint.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    options: GenerateOptions,
    timeout: Duration,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        tracing::info!(
            endpoint = %config.endpoint,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Oracle client initialized"
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            options: GenerateOptions {
                num_ctx: config.context_limit,
                num_predict: config.max_output_tokens,
                temperature: config.temperature,
            },
            timeout,
        })
    }

    /// Send one prompt and return the raw answer, or the reason there is none.
    pub async fn try_query(&self, prompt: &str) -> Result<String, OracleError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            options: &self.options,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        extract_answer(&body)
    }

    fn classify(&self, error: reqwest::Error) -> OracleError {
        if error.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else {
            OracleError::Transport(error)
        }
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn query(&self, prompt: &str) -> String {
        match self.try_query(prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                match &e {
                    OracleError::Timeout(_) => {
                        tracing::warn!(error = %e, "Oracle timed out, allowing request in degraded mode")
                    }
                    _ => tracing::error!(error = %e, "Oracle query failed"),
                }
                metrics::record_oracle_failure(e.kind());
                e.fallback_answer().to_string()
            }
        }
    }
}

/// Pull the `response` field out of a generate payload.
///
/// If the whole body is not valid JSON, the first well-formed JSON object
/// embedded in it is used instead.
pub fn extract_answer(raw: &str) -> Result<String, OracleError> {
    match serde_json::from_str::<GenerateResponse>(raw) {
        Ok(parsed) => Ok(parsed.response),
        Err(e) => match first_embedded_object(raw) {
            Some(parsed) => {
                tracing::debug!(error = %e, "Recovered oracle answer from embedded object");
                Ok(parsed.response)
            }
            None => Err(OracleError::Malformed(e.to_string())),
        },
    }
}

fn first_embedded_object(raw: &str) -> Option<GenerateResponse> {
    raw.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&raw[start..])
            .into_iter::<GenerateResponse>()
            .next()?
            .ok()
    })
}
