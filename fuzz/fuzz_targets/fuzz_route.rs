//! Fuzz target for /proc/net/route parsing.
//!
//! Tests that route table parsing handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::net::routes::parse_route_content;

fuzz_target!(|data: &str| {
    // The parser should never panic, only skip or return an error
    let _ = parse_route_content(data);
});
