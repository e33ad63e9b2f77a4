//! Fuzz target for model artifact parsing.
//!
//! Any artifact that validates must be safe to score: tree indices in range,
//! coefficient counts matching the feature layout.

#![no_main]

use ct_core::features::{FeatureVector, FEATURE_COUNT};
use ct_core::model::{ModelArtifact, ScoringModel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(artifact) = ModelArtifact::parse(text) {
        let model = artifact.into_model();
        let p = model.predict(&FeatureVector([1.0; FEATURE_COUNT]));
        if !p.is_nan() {
            assert!((0.0..=1.0).contains(&p), "{} gave {p}", model.kind());
        }
    }
});
