//! Fuzz target for installer.toml parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xp_config::{validate_config, InstallerConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = text.parse::<InstallerConfig>() {
            let _ = validate_config(&config);
        }
    }
});
