//! Body interpretation.
//!
//! Multipart form bodies are decoded into a field map; everything else is
//! passed through as opaque text. File uploads keep only their filename and
//! content type: the file bytes never reach the oracle prompt.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Minimum run of hyphens a body must start with to be considered multipart.
const BOUNDARY_PREFIX: &str = "------";

/// Literal that must appear somewhere in a multipart body.
const DISPOSITION_MARKER: &str = "Content-Disposition: form-data;";

/// A decoded form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormField {
    /// Plain value, trimmed.
    Text(String),
    /// File upload descriptor. Content bytes are intentionally dropped.
    File {
        filename: String,
        content_type: String,
    },
}

/// The body as presented to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InterpretedBody {
    /// Not a multipart body; the original text unchanged.
    Opaque(String),
    /// Multipart fields by name.
    Form(BTreeMap<String, FormField>),
    /// Looked like multipart but could not be decoded.
    Unparseable { error: String, body: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("first line carries no boundary token")]
    MissingBoundary,
}

impl InterpretedBody {
    /// Classify and, where structured, decode a body.
    ///
    /// Never fails: a body that looks like multipart but does not decode is
    /// returned as [`InterpretedBody::Unparseable`] with the original text.
    pub fn interpret(text: &str) -> Self {
        if !is_multipart(text) {
            return InterpretedBody::Opaque(text.to_string());
        }

        match parse_multipart(text) {
            Ok(fields) => InterpretedBody::Form(fields),
            Err(e) => {
                tracing::warn!(error = %e, "Multipart body could not be parsed");
                InterpretedBody::Unparseable {
                    error: e.to_string(),
                    body: text.to_string(),
                }
            }
        }
    }

    /// Text form used inside the oracle prompt.
    pub fn render(&self) -> String {
        match self {
            InterpretedBody::Opaque(text) => text.clone(),
            structured => serde_json::to_string(structured).unwrap_or_default(),
        }
    }
}

/// Both a leading hyphen run and a form-data disposition are required.
pub fn is_multipart(text: &str) -> bool {
    text.starts_with(BOUNDARY_PREFIX) && text.contains(DISPOSITION_MARKER)
}

/// Decode a multipart form body whose boundary is its first line.
pub fn parse_multipart(text: &str) -> Result<BTreeMap<String, FormField>, MultipartError> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let boundary = normalized.lines().next().unwrap_or_default().trim();
    if boundary.trim_start_matches('-').is_empty() {
        return Err(MultipartError::MissingBoundary);
    }

    let mut fields = BTreeMap::new();
    for fragment in normalized.split(boundary) {
        if fragment.trim().is_empty() || fragment.starts_with("--") {
            continue;
        }

        let part = fragment.strip_prefix('\n').unwrap_or(fragment);
        let (head, content) = part.split_once("\n\n").unwrap_or((part, ""));

        let disposition = head
            .lines()
            .find(|line| line.to_ascii_lowercase().contains("content-disposition"));
        let Some(name) = disposition.and_then(|line| quoted_attribute(line, "name")) else {
            tracing::debug!(head = %head, "Skipping multipart part without a field name");
            continue;
        };

        let field = match disposition.and_then(|line| quoted_attribute(line, "filename")) {
            Some(filename) => FormField::File {
                filename: filename.to_string(),
                content_type: header_value(head, "content-type").unwrap_or_default(),
            },
            None => FormField::Text(content.trim().to_string()),
        };
        fields.insert(name.to_string(), field);
    }

    Ok(fields)
}

/// Find `key="value"` in a header line, where `key` starts an attribute.
fn quoted_attribute<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", key);
    let mut search = 0;
    while let Some(found) = line[search..].find(&needle) {
        let start = search + found;
        let value_start = start + needle.len();
        let starts_attribute = line[..start]
            .chars()
            .next_back()
            .map_or(true, |c| c == ';' || c.is_whitespace());
        if starts_attribute {
            let len = line[value_start..].find('"')?;
            return Some(&line[value_start..value_start + len]);
        }
        search = value_start;
    }
    None
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}
