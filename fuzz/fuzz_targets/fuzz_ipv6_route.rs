//! Fuzz target for /proc/net/ipv6_route parsing.
//!
//! Tests that the headerless IPv6 route table parser handles arbitrary input
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::net::routes::parse_ipv6_route_content;

fuzz_target!(|data: &str| {
    let _ = parse_ipv6_route_content(data);
});
