//! Watch configuration
//!
//! Read-only view over the panel settings: which module groups to watch
//! ("clients" vs "others") and whether stack tracing is enabled.
//!
//! Settings files are TOML. The structured value lives under the
//! `[DEBUG_TOOLBAR_OPENSTACK_PANEL]` table; a file without that table
//! yields the defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the settings table holding the watch configuration
pub const SETTINGS_TABLE: &str = "DEBUG_TOOLBAR_OPENSTACK_PANEL";

/// Errors raised while loading a settings file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which modules to watch and whether to walk the stack
///
/// # Example
/// ```
/// use httpwatch::config::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.trace_stack);
/// assert!(config.clients.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Walk the call stack and attribute each call to a client module
    #[serde(rename = "TRACE_STACK")]
    pub trace_stack: bool,

    /// Modules treated as watched SDK clients (used for attribution)
    #[serde(rename = "OPENSTACK_CLIENTS_LIST")]
    pub clients: Vec<String>,

    /// Modules whose frames are reported but never attributed
    #[serde(rename = "OPENSTACK_OTHERS_LIST")]
    pub others: Vec<String>,

    /// Directories searched when resolving module names to source roots
    #[serde(rename = "MODULE_SEARCH_PATH")]
    pub search_path: Vec<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            trace_stack: true,
            clients: Vec::new(),
            others: Vec::new(),
            search_path: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(rename = "DEBUG_TOOLBAR_OPENSTACK_PANEL")]
    panel: Option<WatchConfig>,
}

impl WatchConfig {
    /// Built-in watch lists for an OpenStack dashboard deployment
    pub fn openstack_defaults() -> Self {
        Self {
            clients: [
                "ceilometerclient",
                "cinderclient",
                "glanceclient",
                "heatclient",
                "keystoneclient",
                "neutronclient",
                "novaclient",
                "swiftclient",
                "troveclient",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            others: ["horizon", "openstack_dashboard"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Parse settings from a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: SettingsFile = toml::from_str(contents)?;
        Ok(settings.panel.unwrap_or_default())
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn with_clients<I, S>(mut self, clients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clients = clients.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_others<I, S>(mut self, others: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.others = others.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_trace_stack(mut self, trace_stack: bool) -> Self {
        self.trace_stack = trace_stack;
        self
    }

    pub fn with_search_path<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_path = roots.into_iter().map(Into::into).collect();
        self
    }
}
