//! Decision oracle subsystem.
//!
//! # Data Flow
//! ```text
//! RequestSnapshot + InterpretedBody
//!     → prompt.rs (DecisionPrompt, full or body-only)
//!     → client.rs (Oracle::query, deadline-bounded, never fails)
//!     → verdict.rs (free text → OracleVerdict)
//! ```
//!
//! # Design Decisions
//! - The oracle is an injectable trait object so tests substitute a stub
//! - Every failure becomes sentinel text; the parser maps it to "not malicious"
//! - No retries: a failed call degrades immediately to keep latency bounded

pub mod analyzer;
pub mod client;
pub mod prompt;
pub mod verdict;

pub use analyzer::Analyzer;
pub use client::{HttpOracle, Oracle, OracleError};
pub use prompt::{DecisionPrompt, PromptBuilder};
pub use verdict::{OracleVerdict, VerdictParser, DEFAULT_RATIONALE};
