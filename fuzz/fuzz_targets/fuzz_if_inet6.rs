//! Fuzz target for /proc/net/if_inet6 parsing.
//!
//! Tests that interface address parsing handles arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::net::dev::parse_if_inet6_content;

fuzz_target!(|data: &str| {
    let _ = parse_if_inet6_content(data);
});
