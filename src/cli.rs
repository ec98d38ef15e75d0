//! CLI argument parsing for httpwatch

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the recorded calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

/// HTTP library the requests are issued through
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// reqwest blocking session
    Reqwest,
    /// ureq agent
    Ureq,
}

#[derive(Parser, Debug)]
#[command(name = "httpwatch")]
#[command(version)]
#[command(about = "Record and attribute outgoing HTTP calls", long_about = None)]
pub struct Cli {
    /// Settings file with a [DEBUG_TOOLBAR_OPENSTACK_PANEL] table
    #[arg(short = 'C', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start from the built-in OpenStack client lists (ignored with --config)
    #[arg(long = "openstack-defaults")]
    pub openstack_defaults: bool,

    /// Watched client module (repeatable, replaces the configured list)
    #[arg(long = "client", value_name = "MODULE")]
    pub clients: Vec<String>,

    /// Module reported in stacks but never attributed (repeatable, replaces the configured list)
    #[arg(long = "other", value_name = "MODULE")]
    pub others: Vec<String>,

    /// Directory to search for watched modules (repeatable, replaces the configured list)
    #[arg(long = "search-path", value_name = "DIR")]
    pub search_path: Vec<PathBuf>,

    /// Skip stack walking; every call is attributed to "unknown"
    #[arg(long = "no-trace-stack")]
    pub no_trace_stack: bool,

    /// HTTP library to issue requests with
    #[arg(short = 't', long = "target", value_enum, default_value = "reqwest")]
    pub target: Target,

    /// Request method
    #[arg(short = 'X', long = "method", default_value = "GET")]
    pub method: String,

    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long = "data")]
    pub data: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,

    /// URLs to request, in order
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,
}

/// Split `"Name: value"` into its parts
pub fn parse_header(header: &str) -> Option<(String, String)> {
    let (name, value) = header.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
