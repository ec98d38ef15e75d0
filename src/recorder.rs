//! Call record storage
//!
//! Accumulates one [`CallRecord`] per intercepted call, keyed by sequence
//! number, plus a single running [`AggregateStats`] value. The external
//! renderer reads everything through [`Recorder::snapshot`].
//!
//! Records are retained for the lifetime of the recorder (no eviction).

use crate::attribution::StackFrameRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Failures while assembling or storing a call record
///
/// Recovered at the interceptor's recording boundary; the wrapped call's
/// result is still returned and the call goes unrecorded.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Sequence number {0} already recorded")]
    DuplicateSequence(u64),

    #[error("Record carries sequence number {entry} but was filed under {key}")]
    SequenceMismatch { key: u64, entry: u64 },

    #[error("Recorder lock poisoned")]
    Poisoned,

    #[error("Failed to serialize call data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Recording panicked: {0}")]
    Panicked(String),
}

/// One intercepted call
///
/// Serialized with the field names the panel templates use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Sequence number, monotonic per interceptor
    #[serde(rename = "req_number")]
    pub seq: u64,
    /// Elapsed time formatted like `0.012s`
    #[serde(rename = "time_res")]
    pub elapsed: String,
    pub elapsed_us: u64,
    /// Fully-qualified name of the wrapped method
    #[serde(rename = "func")]
    pub function: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    /// Attributed client module, or `"unknown"`
    pub client: String,
    pub response: Value,
    /// Watched frames, innermost first
    pub stack: Vec<StackFrameRecord>,
}

/// Running totals, replaced wholesale on every recorded call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Cumulative elapsed time formatted like `1.2s`
    pub time: String,
    pub total_us: u64,
    /// Cumulative call count
    pub num: u64,
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self {
            time: "0s".to_string(),
            total_us: 0,
            num: 0,
        }
    }
}

/// Read-only copy of the recorder state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: BTreeMap<u64, CallRecord>,
    pub totals: AggregateStats,
}

impl Snapshot {
    pub fn request_count(&self) -> usize {
        self.records.len()
    }

    /// Panel subtitle such as `"1 request"` or `"3 requests"`
    pub fn nav_subtitle(&self) -> String {
        let count = self.request_count();
        format!("{} request{}", count, if count == 1 { "" } else { "s" })
    }

    /// Write a human-readable table of the recorded calls
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.records.is_empty() {
            writeln!(out, "No HTTP requests recorded.")?;
            return Ok(());
        }

        writeln!(out, "{}", self.nav_subtitle())?;
        writeln!(
            out,
            "{:>4} {:>10} {:<20} {:<8} {}",
            "#", "Time", "Client", "Method", "URL"
        )?;
        writeln!(out, "{}", "─".repeat(88))?;

        for record in self.records.values() {
            let method = record.args.first().and_then(Value::as_str).unwrap_or("-");
            let url = record.args.get(1).and_then(Value::as_str).unwrap_or("-");
            writeln!(
                out,
                "{:>4} {:>10} {:<20} {:<8} {}",
                record.seq, record.elapsed, record.client, method, url
            )?;
            for frame in &record.stack {
                writeln!(out, "{:>16} {} ({})", "↳", frame.function, frame.file.display())?;
            }
        }

        writeln!(out, "{}", "─".repeat(88))?;
        writeln!(
            out,
            "Total: {} call(s) in {}",
            self.totals.num, self.totals.time
        )?;
        Ok(())
    }

    /// Print the summary table to stdout
    pub fn print_summary(&self) -> io::Result<()> {
        self.write_summary(&mut io::stdout().lock())
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    records: BTreeMap<u64, CallRecord>,
    totals: AggregateStats,
}

impl RecorderState {
    fn insert(&mut self, seq: u64, entry: CallRecord) -> Result<(), RecordingError> {
        if entry.seq != seq {
            return Err(RecordingError::SequenceMismatch {
                key: seq,
                entry: entry.seq,
            });
        }
        if self.records.contains_key(&seq) {
            return Err(RecordingError::DuplicateSequence(seq));
        }
        self.records.insert(seq, entry);
        Ok(())
    }
}

/// Thread-safe store of call records and totals
#[derive(Debug, Default)]
pub struct Recorder {
    state: Mutex<RecorderState>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under `seq`; sequence numbers are never reused
    pub fn record(&self, seq: u64, entry: CallRecord) -> Result<(), RecordingError> {
        let mut state = self.state.lock().map_err(|_| RecordingError::Poisoned)?;
        state.insert(seq, entry)
    }

    /// Insert a record and replace the totals in one step
    ///
    /// A snapshot never sees the new record without the matching totals.
    pub fn commit(
        &self,
        seq: u64,
        entry: CallRecord,
        stats: AggregateStats,
    ) -> Result<(), RecordingError> {
        let mut state = self.state.lock().map_err(|_| RecordingError::Poisoned)?;
        state.insert(seq, entry)?;
        state.totals = stats;
        Ok(())
    }

    /// Replace the aggregate totals
    pub fn record_totals(&self, stats: AggregateStats) -> Result<(), RecordingError> {
        let mut state = self.state.lock().map_err(|_| RecordingError::Poisoned)?;
        state.totals = stats;
        Ok(())
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Snapshot {
        // Records are only inserted whole, so a poisoned lock still guards consistent data
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            records: state.records.clone(),
            totals: state.totals.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
