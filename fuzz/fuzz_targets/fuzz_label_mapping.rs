//! Fuzz target for label rule compilation and matching.
//!
//! Arbitrary patterns must either compile or fail with an error; compiled
//! mappings must match arbitrary values without panicking.

#![no_main]

use arbitrary::Arbitrary;
use es_common::{LabelMapping, LabelRule};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    rules: Vec<(String, String)>,
    values: Vec<String>,
}

fuzz_target!(|input: Input| {
    let rules: Vec<LabelRule> = input
        .rules
        .into_iter()
        .map(|(label, pattern)| LabelRule { label, pattern })
        .collect();
    if let Ok(mapping) = LabelMapping::from_rules(&rules) {
        for value in &input.values {
            let matched = mapping.matching_labels(value).count();
            assert!(matched <= mapping.len());
        }
    }
});
