//! Oracle-gated reverse proxy library.
//!
//! Every inbound request is captured, described to a language-model oracle,
//! and either replayed to the upstream or rejected with 403.

pub mod config;
pub mod http;
pub mod inspect;
pub mod lifecycle;
pub mod observability;
pub mod oracle;
pub mod policy;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
