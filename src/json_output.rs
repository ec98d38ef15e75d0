//! JSON output format for recorded HTTP calls (`--format json`)

use crate::recorder::{AggregateStats, CallRecord, Snapshot};
use serde::{Deserialize, Serialize};

/// A request that failed in transport and was therefore not recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFailure {
    pub url: String,
    pub error: String,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    /// Panel subtitle, e.g. `"2 requests"`
    pub summary: String,
    pub total: AggregateStats,
    /// Recorded calls in sequence order
    pub requests: Vec<CallRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JsonFailure>,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self::from_snapshot(&Snapshot::default())
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "httpwatch-json-v1".to_string(),
            summary: snapshot.nav_subtitle(),
            total: snapshot.totals.clone(),
            requests: snapshot.records.values().cloned().collect(),
            failures: Vec::new(),
        }
    }

    pub fn add_failure(&mut self, url: impl Into<String>, error: impl ToString) {
        self.failures.push(JsonFailure {
            url: url.into(),
            error: error.to_string(),
        });
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}
