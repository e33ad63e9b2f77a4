//! Fuzz target for config.toml parsing and validation.

#![no_main]

use ct_core::config::ServiceConfig;
use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = ServiceConfig::from_toml(text, Path::new("fuzz.toml")) {
        let _ = config.validate();
    }
});
