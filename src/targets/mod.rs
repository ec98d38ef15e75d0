//! Instrumentable HTTP client libraries
//!
//! Each target owns one shared [`MethodSlot`](crate::slot::MethodSlot) that
//! every client instance of that library dispatches through.

pub mod reqwest_session;
pub mod ureq_http;

use crate::lifecycle::Instrumentable;
use std::sync::Arc;

pub use reqwest_session::{Session, SessionClass, SESSION_REQUEST};
pub use ureq_http::{Http, HttpClass, HTTP_REQUEST};

/// Both request slots, in the order they are patched
pub fn default_targets(sessions: &SessionClass, http: &HttpClass) -> Vec<Arc<dyn Instrumentable>> {
    vec![
        Arc::clone(sessions.slot()) as Arc<dyn Instrumentable>,
        Arc::clone(http.slot()) as Arc<dyn Instrumentable>,
    ]
}
