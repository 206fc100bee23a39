//! Request inspection subsystem.
//!
//! # Data Flow
//! ```text
//! Request<Body> + peer address
//!     → extract.rs (query, filtered headers, body read once)
//!     → RequestSnapshot (immutable)
//!     → multipart.rs (body text → InterpretedBody)
//!     → handed to the oracle prompt builder
//! ```

pub mod extract;
pub mod multipart;

pub use extract::{ExtractError, QueryValue, RequestSnapshot};
pub use multipart::{FormField, InterpretedBody, MultipartError};
