//! Fuzz target for /proc/mounts and fstab parsing.
//!
//! Tests that mount table parsing handles arbitrary input without panicking;
//! the parser is infallible and must skip anything it cannot read.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::disk::parse_mounts_content;

fuzz_target!(|data: &str| {
    let _ = parse_mounts_content(data);
});
