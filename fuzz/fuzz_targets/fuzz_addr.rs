//! Fuzz target for the kernel hex address codec.
//!
//! Tests that address and endpoint decoding handle arbitrary tokens without
//! panicking under every family hint.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::net::{decode_addr, decode_endpoint, FamilyHint};

fuzz_target!(|data: &str| {
    // The codec should never panic, only return an error
    let _ = decode_addr(data, FamilyHint::V4);
    let _ = decode_addr(data, FamilyHint::V6);
    let _ = decode_addr(data, FamilyHint::Auto);
    let _ = decode_endpoint(data, FamilyHint::Auto);
});
