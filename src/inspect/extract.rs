//! Canonical request capture.
//!
//! # Responsibilities
//! - Parse the query string, keeping single values scalar and repeats ordered
//! - Drop high-noise headers before they reach the oracle prompt
//! - Read exactly `Content-Length` body bytes, once, and keep them for replay
//!
//! # Design Decisions
//! - The snapshot is immutable after construction (private fields, accessors only)
//! - Body text is decoded lossily; a bad encoding never fails the request
//! - Maps are ordered so identical requests render identical prompts

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, Method};
use serde::Serialize;
use thiserror::Error;

/// Headers removed before the snapshot is built (compared lower-cased).
pub const EXCLUDED_HEADERS: [&str; 4] = ["user-agent", "accept", "accept-encoding", "connection"];

/// A query parameter value. The variant follows the key's cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// The key appeared once.
    Single(String),
    /// The key repeated; every occurrence in request order.
    Multiple(Vec<String>),
}

/// Errors raised while capturing a request.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Declared body is larger than the inspection buffer.
    #[error("request body of {declared} bytes exceeds the {limit} byte limit")]
    TooLarge { declared: usize, limit: usize },

    /// The body stream failed before `Content-Length` bytes arrived.
    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),
}

/// Immutable capture of one inbound request.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: Method,
    path: String,
    query_params: BTreeMap<String, QueryValue>,
    headers: BTreeMap<String, String>,
    body: Bytes,
    body_text: String,
    client_ip: IpAddr,
}

impl RequestSnapshot {
    /// Read the body (if any) and build the snapshot.
    ///
    /// The body stream is consumed here and nowhere else; the forwarder replays
    /// [`RequestSnapshot::body`].
    pub async fn extract(
        parts: &Parts,
        body: Body,
        client: SocketAddr,
        max_body_size: usize,
    ) -> Result<Self, ExtractError> {
        let declared = declared_length(&parts.headers);

        let raw = if declared == 0 {
            Bytes::new()
        } else if declared > max_body_size {
            return Err(ExtractError::TooLarge {
                declared,
                limit: max_body_size,
            });
        } else {
            axum::body::to_bytes(body, declared).await?
        };

        Ok(Self::from_parts(parts, raw, client))
    }

    /// Build a snapshot from already-buffered body bytes.
    pub fn from_parts(parts: &Parts, body: Bytes, client: SocketAddr) -> Self {
        let body_text = String::from_utf8_lossy(&body).into_owned();
        if !body_text.is_empty() {
            let preview: String = body_text.chars().take(100).collect();
            tracing::debug!(body = %preview, "Request body captured");
        }

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query_params: parse_query(parts.uri.query().unwrap_or_default()),
            headers: filter_headers(&parts.headers),
            body,
            body_text,
            client_ip: client.ip(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &BTreeMap<String, QueryValue> {
        &self.query_params
    }

    /// Lower-cased header names with [`EXCLUDED_HEADERS`] removed.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Raw body bytes exactly as received.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8 with invalid sequences replaced.
    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn client_ip(&self) -> IpAddr {
        self.client_ip
    }
}

/// Declared `Content-Length`, or 0 when absent or unparseable.
fn declared_length(headers: &HeaderMap) -> usize {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Parse a raw query string.
///
/// Keys with empty values are dropped. A key seen once maps to
/// [`QueryValue::Single`]; a repeated key maps to [`QueryValue::Multiple`].
pub fn parse_query(query: &str) -> BTreeMap<String, QueryValue> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        grouped
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                QueryValue::Single(values.remove(0))
            } else {
                QueryValue::Multiple(values)
            };
            (key, value)
        })
        .collect()
}

/// Lower-case header names and drop [`EXCLUDED_HEADERS`].
///
/// Repeated headers are joined with `", "`.
pub fn filter_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut filtered: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str().to_ascii_lowercase();
        if EXCLUDED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes());
        filtered
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn client() -> SocketAddr {
        "10.0.0.7:51000".parse().unwrap()
    }

    fn parts_for(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_single_query_value_is_scalar() {
        let params = parse_query("id=1%20OR%201%3D1&page=2");
        assert_eq!(params["id"], QueryValue::Single("1 OR 1=1".into()));
        assert_eq!(params["page"], QueryValue::Single("2".into()));
    }

    #[test]
    fn test_repeated_query_key_is_ordered_sequence() {
        let params = parse_query("tag=b&x=1&tag=a&tag=c");
        assert_eq!(
            params["tag"],
            QueryValue::Multiple(vec!["b".into(), "a".into(), "c".into()])
        );
        assert_eq!(params["x"], QueryValue::Single("1".into()));
    }

    #[test]
    fn test_blank_query_values_dropped() {
        let params = parse_query("a=&b=2&flag");
        assert!(!params.contains_key("a"));
        assert!(!params.contains_key("flag"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_query_serializes_by_cardinality() {
        let params = parse_query("a=1&b=2&b=3");
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"a":"1","b":["2","3"]}"#);
    }

    #[test]
    fn test_header_filtering() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "curl/8".parse().unwrap());
        headers.insert("accept", "*/*".parse().unwrap());
        headers.insert("accept-encoding", "gzip".parse().unwrap());
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("x-custom", "yes".parse().unwrap());
        headers.insert("cookie", "session=1".parse().unwrap());
        headers.append("x-forwarded-for", "1.1.1.1".parse().unwrap());
        headers.append("x-forwarded-for", "2.2.2.2".parse().unwrap());

        let filtered = filter_headers(&headers);
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered["x-custom"], "yes");
        assert_eq!(filtered["cookie"], "session=1");
        assert_eq!(filtered["x-forwarded-for"], "1.1.1.1, 2.2.2.2");
    }

    #[test]
    fn test_snapshot_from_parts() {
        let parts = parts_for(
            Request::builder()
                .method("POST")
                .uri("/login?next=%2Fhome")
                .header("Content-Type", "text/plain")
                .body(())
                .unwrap(),
        );
        let body = Bytes::from_static(b"user=admin\xff");
        let snapshot = RequestSnapshot::from_parts(&parts, body.clone(), client());

        assert_eq!(snapshot.method(), Method::POST);
        assert_eq!(snapshot.path(), "/login");
        assert_eq!(snapshot.query_params()["next"], QueryValue::Single("/home".into()));
        assert_eq!(snapshot.headers()["content-type"], "text/plain");
        assert_eq!(snapshot.body(), &body);
        assert_eq!(snapshot.body_text(), "user=admin\u{FFFD}");
        assert_eq!(snapshot.client_ip().to_string(), "10.0.0.7");
    }

    #[tokio::test]
    async fn test_extract_reads_declared_length() {
        let parts = parts_for(
            Request::builder()
                .method("PUT")
                .uri("/items/1")
                .header("Content-Length", "5")
                .body(())
                .unwrap(),
        );
        let snapshot = RequestSnapshot::extract(&parts, Body::from("hello"), client(), 1024)
            .await
            .unwrap();
        assert_eq!(snapshot.body_text(), "hello");
    }

    #[tokio::test]
    async fn test_extract_without_length_skips_body() {
        let parts = parts_for(Request::builder().uri("/").body(()).unwrap());
        let snapshot = RequestSnapshot::extract(&parts, Body::from("ignored"), client(), 1024)
            .await
            .unwrap();
        assert!(snapshot.body().is_empty());
        assert_eq!(snapshot.body_text(), "");
    }

    #[tokio::test]
    async fn test_extract_rejects_oversized_body() {
        let parts = parts_for(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header("Content-Length", "4096")
                .body(())
                .unwrap(),
        );
        let err = RequestSnapshot::extract(&parts, Body::empty(), client(), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::TooLarge { declared: 4096, limit: 1024 }));
    }
}
