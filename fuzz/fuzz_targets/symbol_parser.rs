#![no_main]

use httpwatch::stack_unwind::parse_symbol;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let symbol = String::from_utf8_lossy(data);
    let (self_type, _function) = parse_symbol(&symbol);
    if let Some(self_type) = self_type {
        assert!(!self_type.is_empty());
    }
});
