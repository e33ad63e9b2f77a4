//! Fuzz target for the connection dataset CSV parser.
//!
//! Tests that forward-fill and cell parsing handle arbitrary input without
//! panicking, and that accepted datasets satisfy their value invariants.

#![no_main]

use ct_core::dataset::parse_dataset;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(dataset) = parse_dataset(Cursor::new(data)) {
        assert!(!dataset.is_empty());
        for record in dataset.records() {
            assert!(record.duration_seconds.is_finite());
            assert!(record.duration_seconds >= 0.0);
        }
    }
});
