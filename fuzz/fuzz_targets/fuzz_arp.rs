//! Fuzz target for /proc/net/arp parsing.
//!
//! Tests that neighbor table parsing handles arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::net::routes::parse_arp_content;

fuzz_target!(|data: &str| {
    let _ = parse_arp_content(data);
});
