//! Call interception
//!
//! [`CallInterceptor::wrap`] turns a request method into one that times the
//! call, attributes it to a watched client and files a [`CallRecord`] with
//! the recorder.
//!
//! The wrapper is transparent: the wrapped method's result, error or panic
//! reaches the caller exactly as the method produced it. Only calls that
//! return `Ok` are recorded. Anything that goes wrong while recording is
//! contained at the recording boundary and costs one missing record, never
//! the call itself.

use crate::attribution::{panic_message, StackAttributor};
use crate::recorder::{AggregateStats, CallRecord, Recorder, RecordingError};
use crate::slot::RequestMethod;
use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Arguments of an intercepted call, as recorded
pub trait CallArguments {
    /// Positional argument values, in call order
    fn positional(&self) -> Vec<Value>;

    /// Keyword argument values
    fn keywords(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// Format a duration like C's `%.2g` followed by `s`
///
/// # Example
/// ```
/// use httpwatch::interceptor::format_elapsed;
/// use std::time::Duration;
///
/// assert_eq!(format_elapsed(Duration::from_millis(12)), "0.012s");
/// assert_eq!(format_elapsed(Duration::from_secs(120)), "1.2e+02s");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{}s", format_significant(elapsed.as_secs_f64(), 2))
}

/// `%.{precision}g` formatting
fn format_significant(value: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    // Rounding to `precision` digits first decides the exponent (0.0999 → 0.1)
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[derive(Debug, Default)]
struct Tally {
    count: u64,
    total: Duration,
}

/// Times, attributes and records calls made through wrapped methods
pub struct CallInterceptor {
    attributor: StackAttributor,
    recorder: Arc<Recorder>,
    tally: Mutex<Tally>,
}

impl CallInterceptor {
    pub fn new(attributor: StackAttributor, recorder: Arc<Recorder>) -> Self {
        Self {
            attributor,
            recorder,
            tally: Mutex::new(Tally::default()),
        }
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub fn attributor(&self) -> &StackAttributor {
        &self.attributor
    }

    /// Number of calls recorded so far
    pub fn call_count(&self) -> u64 {
        self.tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }

    /// Wrap `method` so every successful call through it is recorded
    ///
    /// `qualified_name` is recorded as the function of every call.
    pub fn wrap<C, A, R, E>(
        self: &Arc<Self>,
        qualified_name: impl Into<String>,
        method: RequestMethod<C, A, R, E>,
    ) -> RequestMethod<C, A, R, E>
    where
        C: 'static,
        A: CallArguments + 'static,
        R: Serialize + 'static,
        E: 'static,
    {
        let interceptor = Arc::clone(self);
        let qualified_name: Arc<str> = Arc::from(qualified_name.into());

        Arc::new(move |receiver: &C, args: &A| {
            let start = Instant::now();
            let result = method(receiver, args);
            let elapsed = start.elapsed();

            match &result {
                Ok(response) => interceptor.record_call(&qualified_name, args, response, elapsed),
                Err(_) => {
                    tracing::trace!(function = %qualified_name, "wrapped call failed, not recorded")
                }
            }

            result
        })
    }

    /// Recording boundary: nothing raised in here reaches the caller
    fn record_call<A, R>(&self, function: &str, args: &A, response: &R, elapsed: Duration)
    where
        A: CallArguments,
        R: Serialize,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_record(function, args, response, elapsed)
        }));

        let err = match outcome {
            Ok(Ok(seq)) => {
                tracing::trace!(seq, function, "call recorded");
                return;
            }
            Ok(Err(err)) => err,
            Err(payload) => RecordingError::Panicked(panic_message(payload.as_ref())),
        };
        tracing::debug!(error = %err, function, "call not recorded");
    }

    fn try_record<A, R>(
        &self,
        function: &str,
        args: &A,
        response: &R,
        elapsed: Duration,
    ) -> Result<u64, RecordingError>
    where
        A: CallArguments,
        R: Serialize,
    {
        let attribution = self.attributor.attribute();
        let response = serde_json::to_value(response)?;
        let args_positional = args.positional();
        let kwargs = args.keywords();

        // Sequence assignment, append and totals update happen as one step
        let mut tally = self.tally.lock().map_err(|_| RecordingError::Poisoned)?;
        let seq = tally.count + 1;
        let total = tally.total + elapsed;

        let record = CallRecord {
            seq,
            elapsed: format_elapsed(elapsed),
            elapsed_us: duration_us(elapsed),
            function: function.to_string(),
            args: args_positional,
            kwargs,
            client: attribution.client_name().to_string(),
            response,
            stack: attribution.frames,
        };
        let stats = AggregateStats {
            time: format_elapsed(total),
            total_us: duration_us(total),
            num: seq,
        };
        self.recorder.commit(seq, record, stats)?;

        tally.count = seq;
        tally.total = total;

        Ok(seq)
    }
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
