//! `reqwest` blocking sessions
//!
//! [`SessionClass`] plays the role of the library's session type: it owns the
//! `request` slot, and every [`Session`] it hands out calls through that slot.

use crate::http::{read_body, HttpRequest, HttpResponse, TransportError};
use crate::slot::MethodSlot;
use reqwest::blocking::{Client, Response};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SESSION_REQUEST: &str = "reqwest::blocking::Session.request";

pub type SessionSlot = MethodSlot<Client, HttpRequest, HttpResponse, TransportError>;

/// Shared `request` slot for every [`Session`]
#[derive(Debug, Clone)]
pub struct SessionClass {
    slot: Arc<SessionSlot>,
}

impl Default for SessionClass {
    fn default() -> Self {
        Self {
            slot: Arc::new(MethodSlot::from_fn(SESSION_REQUEST, send_request)),
        }
    }
}

impl SessionClass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self) -> &Arc<SessionSlot> {
        &self.slot
    }

    /// New session with a default client
    pub fn session(&self) -> Result<Session, TransportError> {
        Ok(self.session_with(Client::builder().build()?))
    }

    pub fn session_with(&self, client: Client) -> Session {
        Session {
            client,
            slot: Arc::clone(&self.slot),
        }
    }
}

/// A client instance whose requests go through the class slot
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    slot: Arc<SessionSlot>,
}

impl Session {
    pub fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.slot.call(&self.client, request)
    }

    pub fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.request(&HttpRequest::get(url))
    }
}

/// The unpatched request method
pub fn send_request(client: &Client, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| TransportError::InvalidMethod(request.method.clone()))?;

    let mut builder = client.request(method, request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }
    if let Some(timeout) = request.timeout {
        builder = builder.timeout(timeout);
    }

    read_response(builder.send()?)
}

fn read_response(response: Response) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = read_body(response)?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canned(_: &Client, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: format!("{} {}", request.method, request.url).into_bytes(),
        })
    }

    #[test]
    fn test_sessions_share_the_class_slot() {
        let class = SessionClass::new();
        let first = class.session().unwrap();
        let second = class.session().unwrap();

        class.slot().replace(Arc::new(canned));

        assert_eq!(first.get("http://x").unwrap().text(), "GET http://x");
        assert_eq!(second.get("http://y").unwrap().text(), "GET http://y");
    }

    #[test]
    fn test_slot_name() {
        assert_eq!(SessionClass::new().slot().qualified_name(), SESSION_REQUEST);
    }

    #[test]
    fn test_invalid_method_rejected_before_sending() {
        let session = SessionClass::new().session().unwrap();
        let err = session
            .request(&HttpRequest::new("GE T", "http://127.0.0.1:9/"))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidMethod(method) if method == "GE T"));
    }
}
