//! Property-based tests for the interception core
//!
//! Covers:
//! 1. Sequence numbers stay contiguous whatever mix of calls succeed or fail
//! 2. Wrapping is transparent for return values and errors
//! 3. Elapsed-time formatting
//! 4. Symbol parsing on arbitrary input
//! 5. Component-wise path matching

use httpwatch::attribution::StackAttributor;
use httpwatch::interceptor::{format_elapsed, CallArguments, CallInterceptor};
use httpwatch::locator::{path_in_set, WatchedRoot};
use httpwatch::recorder::Recorder;
use httpwatch::slot::RequestMethod;
use httpwatch::stack_unwind::{parse_symbol, StaticStackProvider};
use httpwatch::watcher::WatchedModuleSet;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

struct Input(i64);

impl CallArguments for Input {
    fn positional(&self) -> Vec<Value> {
        vec![json!(self.0)]
    }
}

fn interceptor() -> Arc<CallInterceptor> {
    let attributor = StackAttributor::new(
        Arc::new(WatchedModuleSet::default()),
        true,
        Arc::new(StaticStackProvider::default()),
    );
    Arc::new(CallInterceptor::new(attributor, Arc::new(Recorder::new())))
}

/// Fails on negative input, otherwise doubles it
fn doubler() -> RequestMethod<(), Input, i64, String> {
    Arc::new(|_: &(), input: &Input| {
        if input.0 < 0 {
            Err(format!("negative input {}", input.0))
        } else {
            Ok(input.0 * 2)
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_wrapping_is_transparent(inputs in prop::collection::vec(-1000i64..1000, 0..40)) {
        let interceptor = interceptor();
        let plain = doubler();
        let wrapped = interceptor.wrap("prop::Doubler.request", doubler());

        for input in &inputs {
            prop_assert_eq!(wrapped(&(), &Input(*input)), plain(&(), &Input(*input)));
        }
    }

    #[test]
    fn prop_sequence_numbers_contiguous(inputs in prop::collection::vec(-1000i64..1000, 0..40)) {
        let interceptor = interceptor();
        let wrapped = interceptor.wrap("prop::Doubler.request", doubler());

        for input in &inputs {
            let _ = wrapped(&(), &Input(*input));
        }

        let successes: Vec<i64> = inputs.iter().copied().filter(|i| *i >= 0).collect();
        let snapshot = interceptor.recorder().snapshot();
        let keys: Vec<u64> = snapshot.records.keys().copied().collect();
        prop_assert_eq!(keys, (1..=successes.len() as u64).collect::<Vec<_>>());
        prop_assert_eq!(snapshot.totals.num, successes.len() as u64);

        // Records appear in call order
        let recorded: Vec<Value> = snapshot.records.values().map(|r| r.args[0].clone()).collect();
        let expected: Vec<Value> = successes.iter().map(|i| json!(i)).collect();
        prop_assert_eq!(recorded, expected);
    }

    #[test]
    fn prop_format_elapsed_is_short(micros in 0u64..10_000_000_000) {
        let formatted = format_elapsed(Duration::from_micros(micros));
        prop_assert!(formatted.ends_with('s'));
        prop_assert!(formatted.len() <= 10, "{}", formatted);
        prop_assert!(!formatted.contains(".0s"));
    }

    #[test]
    fn prop_parse_symbol_never_panics(symbol in ".{0,80}") {
        let (self_type, _function) = parse_symbol(&symbol);
        if let Some(self_type) = self_type {
            prop_assert!(!self_type.is_empty());
        }
    }

    #[test]
    fn prop_path_matching_is_component_wise(
        root in "[a-z]{1,8}",
        suffix in "[a-z]{1,8}",
        file in "[a-z]{1,8}\\.rs",
    ) {
        let roots = vec![WatchedRoot::new(root.clone(), PathBuf::from("/pkg").join(&root))];

        let inside = PathBuf::from("/pkg").join(&root).join(&file);
        prop_assert!(path_in_set(&inside, &roots));

        let sibling = PathBuf::from("/pkg").join(format!("{}{}", root, suffix)).join(&file);
        prop_assert!(!path_in_set(&sibling, &roots));
    }
}
