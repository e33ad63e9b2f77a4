//! Fuzz target for encoder vocabularies.
//!
//! Tests that JSON encoder artifacts and vocabulary construction handle
//! arbitrary input without panicking.

#![no_main]

use ct_core::encode::{CategoricalEncoder, EncoderArtifact};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(artifact) = serde_json::from_slice::<EncoderArtifact>(data) else {
        return;
    };
    let _ = CategoricalEncoder::conn_state(artifact.classes.clone());
    if let Ok(encoder) = CategoricalEncoder::protocol(artifact.classes) {
        for (code, label) in encoder.classes().iter().enumerate() {
            assert_eq!(encoder.encode(label).ok(), Some(code as u32));
        }
    }
});
