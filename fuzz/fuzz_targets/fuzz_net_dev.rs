//! Fuzz target for /proc/net/dev parsing.
//!
//! Tests that interface counter parsing handles arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::net::dev::parse_dev_content;

fuzz_target!(|data: &str| {
    let _ = parse_dev_content(data);
});
