//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → policy engine (inspect, consult oracle, decide)
//!     → forward.rs (replay to upstream) or response.rs (403 / 500)
//!     → Send to client
//! ```

pub mod forward;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use server::{HttpServer, ServerError};
