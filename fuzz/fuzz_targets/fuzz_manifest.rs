//! Fuzz target for manifest parsing.
//!
//! Anything that parses must render back to text that parses to the same
//! main attributes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use xp_bundle::Manifest;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(manifest) = Manifest::parse(text) else {
        return;
    };
    let _ = manifest.layers();

    let rendered = manifest.to_text();
    let reparsed = Manifest::parse(&rendered).expect("rendered manifest must parse");
    assert_eq!(reparsed.attributes(), manifest.attributes());
});
