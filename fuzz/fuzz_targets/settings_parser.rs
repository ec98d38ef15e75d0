#![no_main]

use httpwatch::config::WatchConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed settings must come back as an error, never a panic
        let _ = WatchConfig::from_toml_str(input);
    }
});
