//! Decision prompt construction.

use std::fmt;

use crate::config::PromptMode;
use crate::inspect::{InterpretedBody, RequestSnapshot};

const ANSWER_FORMAT: &str = "Consider common web attacks like SQL Injection, XSS, Command Injection, or Path Traversal.
Respond with:
RESULT: [MALICIOUS/BENIGN]
REASON: [Your explanation]
";

/// Prompt text for a single oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionPrompt(String);

impl DecisionPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecisionPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders snapshots into prompts according to the configured mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder {
    mode: PromptMode,
}

impl PromptBuilder {
    pub fn new(mode: PromptMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    pub fn build(&self, snapshot: &RequestSnapshot, body: &InterpretedBody) -> DecisionPrompt {
        let text = match self.mode {
            PromptMode::Full => format!(
                "As a security expert, analyze this web request for potential security threats:

Method: {method}
URL Path: {path}
Query Parameters: {query}
Headers: {headers}
Body: {body}

Is this request potentially malicious? {format}",
                method = snapshot.method(),
                path = snapshot.path(),
                query = serde_json::to_string(snapshot.query_params()).unwrap_or_default(),
                headers = serde_json::to_string(snapshot.headers()).unwrap_or_default(),
                body = body.render(),
                format = ANSWER_FORMAT,
            ),
            PromptMode::BodyOnly => format!(
                "As a security expert, analyze this HTTP request body for potential security threats:

Body: {body}

Is this body potentially malicious? {format}",
                body = body.render(),
                format = ANSWER_FORMAT,
            ),
        };
        DecisionPrompt(text)
    }
}
