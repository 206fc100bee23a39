//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the WAF proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the WAF proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// The single origin that allowed requests are replayed against.
    pub upstream: UpstreamConfig,

    /// Anomaly-detection oracle settings.
    pub oracle: OracleConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "127.0.0.1").
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Upstream (origin) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the origin, e.g. "http://127.0.0.1:3000".
    /// Required for a valid config; a server built without it answers 500.
    pub target_url: Option<String>,

    /// Deadline for the upstream to produce response headers, in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            timeout_secs: 30,
        }
    }
}

/// Which parts of the request are placed in the oracle prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Path, query parameters, filtered headers and the interpreted body.
    #[default]
    Full,
    /// Only the interpreted body.
    BodyOnly,
}

impl std::str::FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(PromptMode::Full),
            "body_only" | "body-only" => Ok(PromptMode::BodyOnly),
            other => Err(format!("unknown prompt mode '{}' (expected full or body_only)", other)),
        }
    }
}

/// Oracle endpoint and decoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Generate endpoint accepting `{model, prompt, options, stream}`.
    pub endpoint: String,

    /// Model identifier sent with every prompt.
    pub model: String,

    /// Hard deadline for a single oracle call, in seconds.
    pub timeout_secs: u64,

    /// Context window limit passed to the oracle.
    pub context_limit: u32,

    /// Maximum number of tokens the oracle may generate.
    pub max_output_tokens: u32,

    /// Sampling temperature; kept low so identical prompts give identical verdicts.
    pub temperature: f32,

    /// Prompt composition mode.
    pub prompt_mode: PromptMode,

    /// Substrings that mark an answer as malicious (case-sensitive).
    pub malicious_markers: Vec<String>,

    /// Marker preceding the rationale line.
    pub rationale_marker: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "llama3:8b".to_string(),
            timeout_secs: 90,
            context_limit: 2048,
            max_output_tokens: 300,
            temperature: 0.1,
            prompt_mode: PromptMode::Full,
            malicious_markers: vec!["RESULT: MALICIOUS".to_string()],
            rationale_marker: "REASON:".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total time budget for one inbound request (oracle + upstream) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 150,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes that will be buffered for inspection.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
