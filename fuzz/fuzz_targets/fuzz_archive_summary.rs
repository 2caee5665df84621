//! Fuzz target for installer archive inspection.
//!
//! Archives may be downloaded from anywhere, so inspection must reject
//! arbitrary bytes without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use xp_bundle::ArchiveSummary;

fuzz_target!(|data: &[u8]| {
    let _ = ArchiveSummary::from_reader(Cursor::new(data));
});
