//! Library-neutral HTTP request and response values
//!
//! Both instrumented client libraries take an [`HttpRequest`] and hand back an
//! [`HttpResponse`], so the interceptor records the same shape regardless of
//! which library carried the call.

use crate::interceptor::CallArguments;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

/// Largest response body either target will read
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Failures raised by the underlying HTTP libraries
///
/// These are the wrapped call's own errors and pass through interception
/// untouched.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("ureq: {0}")]
    Ureq(Box<ureq::Error>),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Failed to read response body: {0}")]
    Io(#[from] std::io::Error),

    #[error("Response body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        Self::Ureq(Box::new(err))
    }
}

/// An outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl CallArguments for HttpRequest {
    fn positional(&self) -> Vec<Value> {
        vec![json!(self.method), json!(self.url)]
    }

    /// Only options the caller actually set
    fn keywords(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        if !self.headers.is_empty() {
            // Pairs, not an object: a header may be sent more than once
            let headers: Vec<Value> = self
                .headers
                .iter()
                .map(|(name, value)| json!([name, value]))
                .collect();
            kwargs.insert("headers".to_string(), Value::Array(headers));
        }
        if let Some(body) = &self.body {
            kwargs.insert("data".to_string(), json!(String::from_utf8_lossy(body)));
        }
        if let Some(timeout) = self.timeout {
            kwargs.insert("timeout".to_string(), json!(timeout.as_secs_f64()));
        }
        kwargs
    }
}

/// A completed response, whatever its status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(serialize_with = "serialize_lossy")]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Read a whole response body, failing instead of truncating past [`MAX_BODY_BYTES`]
pub fn read_body(reader: impl Read) -> Result<Vec<u8>, TransportError> {
    read_body_limited(reader, MAX_BODY_BYTES)
}

fn read_body_limited(reader: impl Read, limit: u64) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    // One byte past the limit tells a full body from an oversized one
    reader.take(limit.saturating_add(1)).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        return Err(TransportError::BodyTooLarge { limit });
    }
    Ok(body)
}

fn serialize_lossy<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let request = HttpRequest::get("http://x");
        assert_eq!(request.positional(), vec![json!("GET"), json!("http://x")]);
        assert!(request.keywords().is_empty());
    }

    #[test]
    fn test_keywords_only_for_set_options() {
        let request = HttpRequest::new("POST", "http://x/servers")
            .with_header("X-Auth-Token", "abc")
            .with_body("{\"name\":\"vm1\"}")
            .with_timeout(Duration::from_millis(1500));

        let kwargs = request.keywords();
        assert_eq!(kwargs["headers"], json!([["X-Auth-Token", "abc"]]));
        assert_eq!(kwargs["data"], json!("{\"name\":\"vm1\"}"));
        assert_eq!(kwargs["timeout"], json!(1.5));
    }

    #[test]
    fn test_response_serializes_body_as_text() {
        let response = HttpResponse {
            status: 404,
            headers: BTreeMap::from([("content-type".to_string(), "text/plain".to_string())]),
            body: b"not found \xff".to_vec(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], 404);
        assert_eq!(value["headers"]["content-type"], "text/plain");
        assert_eq!(value["body"], "not found \u{fffd}");
        assert!(!response.is_success());
    }

    #[test]
    fn test_repeated_headers_all_recorded() {
        let request = HttpRequest::get("http://x")
            .with_header("Accept", "application/json")
            .with_header("X-Trace", "a")
            .with_header("X-Trace", "b");

        assert_eq!(
            request.keywords()["headers"],
            json!([["Accept", "application/json"], ["X-Trace", "a"], ["X-Trace", "b"]])
        );
    }

    #[test]
    fn test_body_at_limit_is_read_whole() {
        let body = read_body_limited(&b"0123456789"[..], 10).unwrap();
        assert_eq!(body, b"0123456789");
    }

    #[test]
    fn test_body_over_limit_is_an_error() {
        let err = read_body_limited(&b"0123456789!"[..], 10).unwrap_err();
        assert!(matches!(err, TransportError::BodyTooLarge { limit: 10 }));
        assert_eq!(err.to_string(), "Response body exceeds 10 bytes");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::InvalidMethod("GE T".to_string());
        assert_eq!(err.to_string(), "Invalid HTTP method: GE T");
    }
}
