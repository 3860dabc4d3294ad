//! Fuzz target for /sys/block/<dev>/stat parsing.
//!
//! Tests that the 11-field counter parser handles arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::disk::parse_disk_stat_content;

fuzz_target!(|data: &str| {
    let _ = parse_disk_stat_content(data);
});
