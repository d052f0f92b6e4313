//! Fuzz target for dataset documents, including mixed date formats.

#![no_main]

use es_core::Dataset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        let _ = Dataset::from_json(json);
    }
});
