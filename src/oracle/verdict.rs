//! Verdict parsing.
//!
//! The oracle answers in free text. A verdict is malicious when the answer
//! contains any accepted marker (case-sensitive); the rationale is the rest of
//! the line after the rationale marker. Anything else yields the default,
//! non-malicious verdict: parsing never fails the request.

use regex::Regex;
use serde::Serialize;

use crate::config::OracleConfig;

/// Rationale used when the answer carries none.
pub const DEFAULT_RATIONALE: &str = "No clear explanation provided";

/// Binary decision plus a short rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleVerdict {
    pub is_malicious: bool,
    pub rationale: String,
}

impl Default for OracleVerdict {
    fn default() -> Self {
        Self {
            is_malicious: false,
            rationale: DEFAULT_RATIONALE.to_string(),
        }
    }
}

/// Tolerant parser for oracle answers.
#[derive(Debug, Clone)]
pub struct VerdictParser {
    markers: Vec<String>,
    rationale: Regex,
}

impl VerdictParser {
    /// Build a parser from accepted malicious markers and a rationale marker.
    ///
    /// Empty markers are ignored. Marker text is matched literally.
    pub fn new<I, S>(markers: I, rationale_marker: &str) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let markers = markers
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.is_empty())
            .collect();
        let rationale = Regex::new(&format!(
            r"{}[ \t]*([^\r\n]*)",
            regex::escape(rationale_marker)
        ))?;

        Ok(Self { markers, rationale })
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self, regex::Error> {
        Self::new(config.malicious_markers.iter().cloned(), &config.rationale_marker)
    }

    pub fn parse(&self, answer: &str) -> OracleVerdict {
        let is_malicious = self.markers.iter().any(|m| answer.contains(m.as_str()));

        let rationale = self
            .rationale
            .captures(answer)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RATIONALE);

        OracleVerdict {
            is_malicious,
            rationale: rationale.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> VerdictParser {
        VerdictParser::from_config(&OracleConfig::default()).unwrap()
    }

    #[test]
    fn test_malicious_with_reason() {
        let verdict = parser().parse("RESULT: MALICIOUS\nREASON: SQL injection pattern\n");
        assert!(verdict.is_malicious);
        assert_eq!(verdict.rationale, "SQL injection pattern");
    }

    #[test]
    fn test_benign_with_reason() {
        let verdict = parser().parse("RESULT: BENIGN\nREASON:   plain page load  ");
        assert!(!verdict.is_malicious);
        assert_eq!(verdict.rationale, "plain page load");
    }

    #[test]
    fn test_marker_is_case_sensitive() {
        assert!(!parser().parse("result: malicious").is_malicious);
        assert!(!parser().parse("RESULT: Malicious").is_malicious);
    }

    #[test]
    fn test_unparseable_answer_defaults() {
        for answer in ["", "I cannot help with that.", "Error parsing oracle response", "REASON:"] {
            assert_eq!(parser().parse(answer), OracleVerdict::default());
        }
    }

    #[test]
    fn test_rationale_stops_at_line_end() {
        let verdict = parser().parse("REASON: first line\r\nsecond line\nRESULT: MALICIOUS");
        assert!(verdict.is_malicious);
        assert_eq!(verdict.rationale, "first line");
    }

    #[test]
    fn test_idempotent_and_whitespace_independent() {
        let p = parser();
        let answer = "RESULT: MALICIOUS\nREASON: path traversal via ../";
        let verdict = p.parse(answer);
        assert_eq!(p.parse(answer), verdict);
        assert_eq!(p.parse(&format!("\n\n  {}  \n\t", answer)), verdict);
        assert_eq!(p.parse(&format!("{}\n", answer)), verdict);
    }

    #[test]
    fn test_additional_markers() {
        let p = VerdictParser::new(["RESULT: MALICIOUS", "**Malicious:** YES", ""], "**Reason:**").unwrap();
        let verdict = p.parse("**Malicious:** YES\n**Reason:** XSS payload in q");
        assert!(verdict.is_malicious);
        assert_eq!(verdict.rationale, "XSS payload in q");
        assert!(!p.parse("**Malicious:** NO").is_malicious);
    }
}
