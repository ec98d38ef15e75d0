//! Interception overhead benchmark
//!
//! Measures the latency the wrapper adds on top of the wrapped call. The
//! wrapped method here does no I/O, so the numbers are the pure cost of
//! timing, attribution and recording on the caller's thread.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench interception_overhead
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use httpwatch::attribution::StackAttributor;
use httpwatch::http::{HttpRequest, HttpResponse};
use httpwatch::interceptor::CallInterceptor;
use httpwatch::locator::WatchedRoot;
use httpwatch::recorder::Recorder;
use httpwatch::slot::{MethodSlot, RequestMethod};
use httpwatch::stack_unwind::{BacktraceProvider, RawFrame, StackProvider, StaticStackProvider};
use httpwatch::watcher::WatchedModuleSet;
use std::collections::BTreeMap;
use std::sync::Arc;

type Slot = MethodSlot<(), HttpRequest, HttpResponse, String>;

fn canned() -> RequestMethod<(), HttpRequest, HttpResponse, String> {
    Arc::new(|_: &(), _: &HttpRequest| {
        Ok(HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: b"[]".to_vec(),
        })
    })
}

fn wrapped_slot(trace_stack: bool, provider: Arc<dyn StackProvider>) -> Slot {
    let watched = Arc::new(WatchedModuleSet::from_roots(
        vec![WatchedRoot::new("novaclient", "/pkg/novaclient")],
        vec![WatchedRoot::new("horizon", "/srv/horizon")],
    ));
    let attributor = StackAttributor::new(watched, trace_stack, provider);
    let interceptor = Arc::new(CallInterceptor::new(attributor, Arc::new(Recorder::new())));
    Slot::new("bench::Session.request", interceptor.wrap("bench::Session.request", canned()))
}

/// Baseline: unwrapped slot dispatch
fn bench_unwrapped(c: &mut Criterion) {
    let slot = Slot::new("bench::Session.request", canned());
    let request = HttpRequest::get("http://x/v2/servers");

    c.bench_function("slot_call_unwrapped", |b| {
        b.iter(|| slot.call(&(), black_box(&request)));
    });
}

/// Wrapped call with attribution disabled, static frames, and a live stack walk
fn bench_wrapped(c: &mut Criterion) {
    let request = HttpRequest::get("http://x/v2/servers");
    let frames = vec![
        RawFrame::new("/usr/lib/http/session.rs", "request"),
        RawFrame::new("/pkg/novaclient/v2/servers.py", "list").with_self_type("ServerManager"),
        RawFrame::new("/srv/horizon/api/nova.py", "server_list"),
        RawFrame::new("/srv/app/main.rs", "main"),
    ];

    let mut group = c.benchmark_group("slot_call_wrapped");
    let variants: [(&str, bool, Arc<dyn StackProvider>); 3] = [
        ("trace_disabled", false, Arc::new(StaticStackProvider::default())),
        ("static_frames", true, Arc::new(StaticStackProvider::new(frames))),
        ("backtrace", true, Arc::new(BacktraceProvider::new())),
    ];

    for (name, trace_stack, provider) in variants {
        let slot = wrapped_slot(trace_stack, provider);
        group.bench_with_input(BenchmarkId::from_parameter(name), &request, |b, request| {
            b.iter(|| slot.call(&(), black_box(request)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_unwrapped, bench_wrapped);
criterion_main!(benches);
