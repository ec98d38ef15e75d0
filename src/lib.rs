//! httpwatch - In-process HTTP call recording with client attribution
//!
//! This library wraps the request method of HTTP client libraries so every
//! outgoing call is timed, attributed to the watched client module that
//! issued it (by walking the call stack), and recorded for later display.
//!
//! ```
//! use httpwatch::config::WatchConfig;
//! use httpwatch::lifecycle::Instrumentation;
//! use httpwatch::targets::{default_targets, HttpClass, SessionClass};
//!
//! let sessions = SessionClass::new();
//! let http = HttpClass::new();
//! let mut instrumentation = Instrumentation::new(default_targets(&sessions, &http));
//!
//! let recorder = instrumentation.enable(&WatchConfig::default()).unwrap();
//! // ... requests issued through `sessions` / `http` clients are recorded ...
//! instrumentation.disable();
//! assert_eq!(recorder.snapshot().nav_subtitle(), "0 requests");
//! ```

pub mod attribution;
pub mod cli;
pub mod config;
pub mod http;
pub mod interceptor;
pub mod json_output;
pub mod lifecycle;
pub mod locator;
pub mod recorder;
pub mod slot;
pub mod stack_unwind;
pub mod targets;
pub mod watcher;
