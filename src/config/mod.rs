//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)         CLI flags
//!     → loader.rs (parse)        │
//!     → merge overrides ◀────────┘
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, OracleConfig, PromptMode, ProxyConfig,
    SecurityConfig, TimeoutConfig, UpstreamConfig,
};
