//! Fuzz target for pipeline.json parsing and validation.

#![no_main]

use es_config::PipelineConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        let _ = PipelineConfig::from_json(json);
    }
});
