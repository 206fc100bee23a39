//! Policy subsystem.
//!
//! # Data Flow
//! ```text
//! Request parts + body
//!     → engine.rs (extract → interpret → analyze)
//!     → Decision { allowed, message, verdict }
//!     → http layer forwards or rejects
//! ```

pub mod engine;

pub use engine::{Decision, PolicyEngine, ALLOWED_MESSAGE};
