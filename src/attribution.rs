//! Call-stack attribution
//!
//! Given the frames of the current call stack, keep those that fall under a
//! watched root, render a display signature for each, and decide which
//! watched client module (if any) issued the call.
//!
//! Attribution never fails: any error or panic while capturing or rendering
//! frames degrades to an "unknown" client with the frames gathered so far.

use crate::locator::WatchedRoot;
use crate::stack_unwind::{RawFrame, StackProvider};
use crate::watcher::WatchedModuleSet;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Client name recorded when no watched client issued the call
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Failures while introspecting the call stack
///
/// Recovered inside the attributor; never surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributionError {
    #[error("Stack capture returned no frames")]
    NoFrames,

    #[error("Stack capture failed: {0}")]
    Capture(String),

    #[error("Frame inspection panicked: {0}")]
    Panicked(String),
}

/// A watched frame with its display signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrameRecord {
    pub file: PathBuf,
    pub function: String,
}

/// Outcome of attributing one intercepted call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    /// Watched frames, innermost first
    pub frames: Vec<StackFrameRecord>,
    /// Attributed client root, if any client frame was found
    pub client: Option<WatchedRoot>,
}

impl Attribution {
    /// Attributed client name, or `"unknown"`
    pub fn client_name(&self) -> &str {
        self.client
            .as_ref()
            .map(|client| client.name.as_str())
            .unwrap_or(UNKNOWN_CLIENT)
    }
}

/// Render `Type.function(a=1, b=<?>)` or `function(a=1)`
pub fn format_signature(frame: &RawFrame) -> String {
    let mut signature = String::with_capacity(frame.function.len() + 16);
    if let Some(self_type) = &frame.self_type {
        signature.push_str(self_type);
        signature.push('.');
    }
    signature.push_str(&frame.function);
    signature.push('(');
    for (idx, arg) in frame.args.iter().enumerate() {
        if idx > 0 {
            signature.push_str(", ");
        }
        let _ = write!(signature, "{}={}", arg.name, arg.display_value());
    }
    signature.push(')');
    signature
}

/// Resolves the watched frames and client of the current call stack
pub struct StackAttributor {
    watched: Arc<WatchedModuleSet>,
    trace_stack: bool,
    provider: Arc<dyn StackProvider>,
}

impl StackAttributor {
    pub fn new(
        watched: Arc<WatchedModuleSet>,
        trace_stack: bool,
        provider: Arc<dyn StackProvider>,
    ) -> Self {
        Self {
            watched,
            trace_stack,
            provider,
        }
    }

    pub fn watched(&self) -> &WatchedModuleSet {
        &self.watched
    }

    pub fn trace_stack(&self) -> bool {
        self.trace_stack
    }

    /// Attribute the call currently on the stack
    pub fn attribute(&self) -> Attribution {
        if !self.trace_stack {
            return Attribution::default();
        }

        let mut attribution = Attribution::default();
        let walked = panic::catch_unwind(AssertUnwindSafe(|| self.walk(&mut attribution)));

        match walked {
            Ok(Ok(())) => attribution,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "stack attribution degraded to unknown");
                attribution.client = None;
                attribution
            }
            Err(payload) => {
                let err = AttributionError::Panicked(panic_message(payload.as_ref()));
                tracing::debug!(error = %err, "stack attribution degraded to unknown");
                attribution.client = None;
                attribution
            }
        }
    }

    /// Fills `attribution` frame by frame so a failure keeps what was gathered
    fn walk(&self, attribution: &mut Attribution) -> Result<(), AttributionError> {
        let frames = self.provider.capture()?;
        let mut client_files: Vec<PathBuf> = Vec::new();

        for frame in &frames {
            let Some(file) = &frame.file else {
                continue;
            };
            if !self.watched.verify_path(file) {
                continue;
            }

            if self.watched.verify_clients_path(file) {
                client_files.push(file.clone());
            }
            attribution.frames.push(StackFrameRecord {
                file: file.clone(),
                function: format_signature(frame),
            });
        }

        attribution.client = self.watched.detect_client_used(&client_files).cloned();
        Ok(())
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
