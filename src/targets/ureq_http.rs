//! `ureq` agents
//!
//! [`HttpClass`] owns the `request` slot shared by every [`Http`] client.
//! Error statuses come back as ordinary responses; only transport failures
//! are errors.

use crate::http::{read_body, HttpRequest, HttpResponse, TransportError};
use crate::slot::MethodSlot;
use std::collections::BTreeMap;
use std::sync::Arc;
use ureq::Agent;

pub const HTTP_REQUEST: &str = "ureq::Http.request";

pub type HttpSlot = MethodSlot<Agent, HttpRequest, HttpResponse, TransportError>;

#[derive(Debug, Clone)]
pub struct HttpClass {
    slot: Arc<HttpSlot>,
}

impl Default for HttpClass {
    fn default() -> Self {
        Self {
            slot: Arc::new(MethodSlot::from_fn(HTTP_REQUEST, send_request)),
        }
    }
}

impl HttpClass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self) -> &Arc<HttpSlot> {
        &self.slot
    }

    pub fn client(&self) -> Http {
        self.client_with(Agent::new())
    }

    pub fn client_with(&self, agent: Agent) -> Http {
        Http {
            agent,
            slot: Arc::clone(&self.slot),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Http {
    agent: Agent,
    slot: Arc<HttpSlot>,
}

impl Http {
    pub fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.slot.call(&self.agent, request)
    }

    pub fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.request(&HttpRequest::get(url))
    }
}

/// The unpatched request method
pub fn send_request(agent: &Agent, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    if !is_token(&request.method) {
        return Err(TransportError::InvalidMethod(request.method.clone()));
    }

    let mut call = agent.request(&request.method, &request.url);
    for (name, value) in &request.headers {
        call = call.set(name, value);
    }
    if let Some(timeout) = request.timeout {
        call = call.timeout(timeout);
    }

    let outcome = match &request.body {
        Some(body) => call.send_bytes(body),
        None => call.call(),
    };

    match outcome {
        Ok(response) | Err(ureq::Error::Status(_, response)) => read_response(response),
        Err(err) => Err(err.into()),
    }
}

/// RFC 9110 token characters
fn is_token(method: &str) -> bool {
    !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn read_response(response: ureq::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status();
    let headers: BTreeMap<String, String> = response
        .headers_names()
        .into_iter()
        .filter_map(|name| {
            let value = response.header(&name)?.to_string();
            Some((name, value))
        })
        .collect();

    let body = read_body(response.into_reader())?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_share_the_class_slot() {
        let class = HttpClass::new();
        let client = class.client();

        class.slot().replace(Arc::new(|_: &Agent, request: &HttpRequest| {
            Ok(HttpResponse {
                status: 204,
                headers: BTreeMap::new(),
                body: request.url.clone().into_bytes(),
            })
        }));

        let response = client.get("http://x").unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.text(), "http://x");
    }

    #[test]
    fn test_method_token_validation() {
        assert!(is_token("GET"));
        assert!(is_token("M-SEARCH"));
        assert!(!is_token(""));
        assert!(!is_token("GE T"));
    }

    #[test]
    fn test_slot_name() {
        assert_eq!(HttpClass::new().slot().qualified_name(), HTTP_REQUEST);
    }

    #[test]
    fn test_invalid_method_rejected_before_sending() {
        let client = HttpClass::new().client();
        let err = client
            .request(&HttpRequest::new("GE T", "http://127.0.0.1:9/"))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidMethod(_)));
    }
}
