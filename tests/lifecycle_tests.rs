//! Integration tests for enabling and disabling instrumentation

use httpwatch::config::WatchConfig;
use httpwatch::lifecycle::Instrumentation;
use httpwatch::locator::SearchPathLocator;
use httpwatch::stack_unwind::StaticStackProvider;
use httpwatch::targets::{default_targets, HttpClass, SessionClass};
use httpwatch::watcher::WatchError;
use mockito::Server;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn instrumentation(sessions: &SessionClass, http: &HttpClass) -> Instrumentation {
    Instrumentation::new(default_targets(sessions, http))
        .with_stack_provider(Arc::new(StaticStackProvider::default()))
}

#[test]
fn test_disable_restores_original_behaviour() {
    let mut server = Server::new();
    let before = server.mock("GET", "/before").with_body("pong").expect(1).create();
    let after = server.mock("GET", "/after").with_body("pong").expect(1).create();
    let sessions = SessionClass::new();
    let http = HttpClass::new();
    let original_session = sessions.slot().current();
    let original_http = http.slot().current();

    let mut instrumentation = instrumentation(&sessions, &http);
    let recorder = instrumentation.enable(&WatchConfig::default()).unwrap();
    let client = http.client();
    client.get(&format!("{}/before", server.url())).unwrap();
    assert_eq!(recorder.len(), 1);

    instrumentation.disable();
    assert!(Arc::ptr_eq(&sessions.slot().current(), &original_session));
    assert!(Arc::ptr_eq(&http.slot().current(), &original_http));

    // Same client instance, now unwrapped
    let response = client.get(&format!("{}/after", server.url())).unwrap();
    assert_eq!(response.text(), "pong");
    assert_eq!(recorder.len(), 1);

    before.assert();
    after.assert();
}

#[test]
fn test_reenable_starts_a_new_session() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", mockito::Matcher::Regex(r"^/\d$".to_string()))
        .with_body("ok")
        .expect(3)
        .create();
    let url = |path: &str| format!("{}{}", server.url(), path);
    let sessions = SessionClass::new();
    let http = HttpClass::new();
    let mut instrumentation = instrumentation(&sessions, &http);

    let first = instrumentation.enable(&WatchConfig::default()).unwrap();
    http.client().get(&url("/1")).unwrap();
    instrumentation.disable();

    let second = instrumentation.enable(&WatchConfig::default()).unwrap();
    http.client().get(&url("/2")).unwrap();
    http.client().get(&url("/3")).unwrap();

    assert_eq!(first.len(), 1);
    let keys: Vec<u64> = second.snapshot().records.into_keys().collect();
    assert_eq!(keys, vec![1, 2]);
    mock.assert();
}

#[test]
fn test_double_enable_wraps_once() {
    let mut server = Server::new();
    let mock = server.mock("GET", "/").with_body("ok").expect(1).create();
    let sessions = SessionClass::new();
    let http = HttpClass::new();
    let original = sessions.slot().current();
    let mut instrumentation = instrumentation(&sessions, &http);

    instrumentation.enable(&WatchConfig::default()).unwrap();
    let latest = instrumentation
        .enable(&WatchConfig::default().with_trace_stack(false))
        .unwrap();
    sessions.session().unwrap().get(&format!("{}/", server.url())).unwrap();

    assert_eq!(latest.len(), 1);
    assert_eq!(latest.snapshot().records[&1].client, "unknown");

    instrumentation.disable();
    assert!(Arc::ptr_eq(&sessions.slot().current(), &original));
    mock.assert();
}

#[test]
fn test_unresolved_module_aborts_enable() {
    let sessions = SessionClass::new();
    let http = HttpClass::new();
    let original = sessions.slot().current();
    let empty = TempDir::new().unwrap();

    let mut instrumentation = instrumentation(&sessions, &http)
        .with_locator(Arc::new(SearchPathLocator::new(vec![empty.path().to_path_buf()])));
    let err = instrumentation
        .enable(&WatchConfig::default().with_clients(["novaclient"]))
        .unwrap_err();

    assert!(matches!(err, WatchError::UnresolvedModule(_)));
    assert!(err.to_string().contains("novaclient"));
    assert!(!instrumentation.is_enabled());
    assert!(instrumentation.recorder().is_none());
    assert!(Arc::ptr_eq(&sessions.slot().current(), &original));
}

#[test]
fn test_modules_resolved_from_configured_search_path() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("novaclient").join("v2")).unwrap();
    fs::create_dir_all(root.path().join("horizon")).unwrap();

    let sessions = SessionClass::new();
    let http = HttpClass::new();
    let mut instrumentation = instrumentation(&sessions, &http);

    let config = WatchConfig::default()
        .with_clients(["novaclient"])
        .with_others(["horizon"])
        .with_search_path([root.path().to_path_buf()]);
    assert!(instrumentation.enable(&config).is_ok());
    assert!(instrumentation.is_enabled());

    let interceptor = instrumentation.interceptor().unwrap();
    let watched = interceptor.attributor().watched();
    assert_eq!(watched.clients()[0].name, "novaclient");
    assert!(watched.clients()[0].path.ends_with("novaclient"));
    assert_eq!(watched.others()[0].name, "horizon");
}

#[test]
fn test_disable_without_enable_is_noop() {
    let sessions = SessionClass::new();
    let http = HttpClass::new();
    let original = http.slot().current();

    let mut instrumentation = instrumentation(&sessions, &http);
    instrumentation.disable();
    assert!(!instrumentation.is_enabled());
    assert!(Arc::ptr_eq(&http.slot().current(), &original));
}
